pub mod item;
pub mod listing;
pub mod inventory;
pub mod repository;

pub use item::{Item, ItemKind, ItemUpdate, MerchandiseCategory, NewItem, MAX_PRICE};
pub use listing::{ListingFilter, SortOrder};
pub use inventory::{InventoryError, LockedStock};
pub use repository::CatalogRepository;
