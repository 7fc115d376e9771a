use chrono::Utc;
use oliminate_catalog::{Item, ItemKind};
use oliminate_core::{Buyer, CoreError, CoreResult, Role};
use uuid::Uuid;

use crate::models::{line_total, Cart, CartItem, CartStatus};

/// Quantities below one are treated as one when adding to a cart.
pub fn clamp_quantity(quantity: i32) -> i32 {
    quantity.max(1)
}

/// Carts and tickets belong to regular users, not organizers.
pub fn ensure_shopper(buyer: &Buyer) -> CoreResult<()> {
    buyer.require_role(Role::User)
}

/// Outcome of a requested line quantity, decided against live stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Remove,
    Set(i32),
}

impl QuantityChange {
    pub fn decide(item_name: &str, quantity: i32, live_stock: i32) -> CoreResult<Self> {
        if quantity <= 0 {
            return Ok(QuantityChange::Remove);
        }
        if quantity > live_stock {
            return Err(CoreError::InsufficientStock {
                item: item_name.to_string(),
                available: live_stock,
            });
        }
        Ok(QuantityChange::Set(quantity))
    }
}

impl Cart {
    pub fn ensure_owner(&self, buyer: &Buyer) -> CoreResult<()> {
        if self.buyer_id != buyer.id {
            return Err(CoreError::Unauthorized(format!(
                "cart {} belongs to another buyer",
                self.id
            )));
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.status != CartStatus::Open {
            return Err(CoreError::NotOpen { status: self.status.to_string() });
        }
        Ok(())
    }

    /// Add `quantity` of `item`, merging into an existing line. The price is
    /// snapshotted only when the line is first created. Stock is not checked
    /// here.
    pub fn add_item(&mut self, item: &Item, quantity: i32) -> CoreResult<&CartItem> {
        self.ensure_open()?;
        if item.kind != ItemKind::Merchandise {
            return Err(CoreError::Validation(
                "ticket slots are bought through the ticket purchase path".to_string(),
            ));
        }
        let quantity = clamp_quantity(quantity);

        let idx = match self.items.iter().position(|l| l.item_id == item.id) {
            Some(idx) => {
                let line = &mut self.items[idx];
                let merged = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| CoreError::Validation("quantity is too large".to_string()))?;
                line_total(line.price_snapshot, merged)?;
                line.quantity = merged;
                idx
            }
            None => {
                line_total(item.price, quantity)?;
                self.items.push(CartItem::new(self.id, item, quantity));
                self.items.len() - 1
            }
        };
        self.updated_at = Utc::now();
        Ok(&self.items[idx])
    }

    /// Returns the updated line, or `None` when the line was removed.
    pub fn update_quantity(
        &mut self,
        line_id: Uuid,
        quantity: i32,
        live_stock: i32,
    ) -> CoreResult<Option<CartItem>> {
        self.ensure_open()?;
        let idx = self.line_index(line_id)?;

        let change = QuantityChange::decide(&self.items[idx].item_name, quantity, live_stock)?;
        if let QuantityChange::Set(q) = change {
            line_total(self.items[idx].price_snapshot, q)?;
        }
        self.updated_at = Utc::now();
        match change {
            QuantityChange::Remove => {
                self.items.remove(idx);
                Ok(None)
            }
            QuantityChange::Set(q) => {
                self.items[idx].quantity = q;
                Ok(Some(self.items[idx].clone()))
            }
        }
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> CoreResult<CartItem> {
        self.ensure_open()?;
        let idx = self.line_index(line_id)?;
        self.updated_at = Utc::now();
        Ok(self.items.remove(idx))
    }

    pub fn mark_paid(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.status = CartStatus::Paid;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.status = CartStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn line_index(&self, line_id: Uuid) -> CoreResult<usize> {
        self.items
            .iter()
            .position(|l| l.id == line_id)
            .ok_or_else(|| CoreError::NotFound(format!("cart item {}", line_id)))
    }
}
