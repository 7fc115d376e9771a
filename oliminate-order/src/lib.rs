pub mod models;
pub mod cart;
pub mod checkout;
pub mod ticketing;
pub mod repository;

pub use models::{line_total, Cart, CartItem, CartStatus, Ticket};
pub use cart::{clamp_quantity, ensure_shopper, QuantityChange};
pub use checkout::{lock_order, plan_checkout, CheckoutPlan, Receipt, ReceiptLine, StockDecrement};
pub use ticketing::{plan_ticket_purchase, TicketPurchase};
pub use repository::{CartRepository, TicketRepository};
