use async_trait::async_trait;
use oliminate_core::{Buyer, CoreResult};
use uuid::Uuid;

use crate::item::{Item, ItemUpdate, NewItem};
use crate::listing::ListingFilter;

/// Repository trait for catalog access
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Organizers only; the caller becomes the owner
    async fn create_item(&self, organizer: &Buyer, item: NewItem) -> CoreResult<Item>;

    async fn get_item(&self, id: Uuid) -> CoreResult<Item>;

    async fn list_items(&self, filter: &ListingFilter) -> CoreResult<Vec<Item>>;

    /// Owner organizer only
    async fn update_item(&self, organizer: &Buyer, id: Uuid, update: ItemUpdate) -> CoreResult<Item>;

    /// Owner organizer only
    async fn delete_item(&self, organizer: &Buyer, id: Uuid) -> CoreResult<()>;
}
