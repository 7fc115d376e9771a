use oliminate_core::CoreError;
use uuid::Uuid;

use crate::item::Item;

/// Stock read under a row lock (or the in-memory write guard) at the moment
/// a purchase commits. This, not the stock seen when the item was put in a
/// cart, is what a purchase is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedStock {
    pub item_id: Uuid,
    pub name: String,
    pub stock: i32,
}

impl From<&Item> for LockedStock {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            stock: item.stock,
        }
    }
}

impl LockedStock {
    /// Stock left after taking `quantity`, or the shortfall.
    pub fn take(&self, quantity: i32) -> Result<i32, InventoryError> {
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        if quantity > self.stock {
            return Err(InventoryError::InsufficientStock {
                item: self.name.clone(),
                requested: quantity,
                available: self.stock,
            });
        }
        Ok(self.stock - quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientStock { item, available, .. } => {
                CoreError::InsufficientStock { item, available }
            }
            InventoryError::InvalidQuantity(q) => {
                CoreError::Validation(format!("quantity must be at least 1, got {}", q))
            }
        }
    }
}
