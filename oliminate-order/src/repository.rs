use async_trait::async_trait;
use oliminate_core::{Buyer, CoreResult};
use uuid::Uuid;

use crate::checkout::Receipt;
use crate::models::{Cart, CartItem, Ticket};
use crate::ticketing::TicketPurchase;

/// Repository trait for carts and the checkout transaction
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The buyer's open cart, created on first use
    async fn open_cart(&self, buyer: &Buyer) -> CoreResult<Cart>;

    async fn get_cart(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart>;

    async fn add_item(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> CoreResult<CartItem>;

    /// `None` when the line was removed
    async fn update_quantity(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> CoreResult<Option<CartItem>>;

    async fn remove_line(&self, buyer: &Buyer, cart_id: Uuid, line_id: Uuid) -> CoreResult<()>;

    /// Atomically re-validate stock, decrement it and mark the cart paid
    async fn checkout(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Receipt>;

    async fn cancel(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart>;
}

/// Repository trait for the direct ticket purchase path
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn purchase_tickets(
        &self,
        buyer: &Buyer,
        slot_id: Uuid,
        quantity: i32,
    ) -> CoreResult<TicketPurchase>;

    /// Newest first
    async fn list_tickets(&self, buyer: &Buyer) -> CoreResult<Vec<Ticket>>;

    /// Organizer owning the slot only
    async fn scan_ticket(&self, organizer: &Buyer, ticket_id: Uuid) -> CoreResult<Ticket>;
}
