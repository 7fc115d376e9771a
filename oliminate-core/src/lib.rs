pub mod error;
pub mod identity;

pub use error::{CoreError, CoreResult};
pub use identity::{Buyer, Role};
