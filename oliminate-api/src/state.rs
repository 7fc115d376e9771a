use std::sync::Arc;

use oliminate_catalog::CatalogRepository;
use oliminate_order::{CartRepository, TicketRepository};
use oliminate_store::Repositories;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(repos: Repositories, auth: AuthConfig) -> Self {
        Self {
            catalog: repos.catalog,
            carts: repos.carts,
            tickets: repos.tickets,
            auth,
        }
    }
}
