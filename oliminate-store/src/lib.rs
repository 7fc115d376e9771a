pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod cart_repo;
pub mod ticket_repo;
pub mod memory;
mod rows;

use std::sync::Arc;

use oliminate_catalog::CatalogRepository;
use oliminate_order::{CartRepository, TicketRepository};
use sqlx::PgPool;

pub use app_config::{Config, StorageBackend};
pub use cart_repo::PgCartRepository;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use memory::InMemoryStore;
pub use ticket_repo::PgTicketRepository;

/// The repositories one backend provides, ready to share across handlers
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub tickets: Arc<dyn TicketRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            catalog: Arc::new(PgCatalogRepository::new(pool.clone())),
            carts: Arc::new(PgCartRepository::new(pool.clone())),
            tickets: Arc::new(PgTicketRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            catalog: store.clone(),
            carts: store.clone(),
            tickets: store,
        }
    }
}
