//! Commit-time validation of a cart against locked stock.
//!
//! Storage backends open a transaction, lock the cart row, then lock every
//! referenced item in [`lock_order`] and hand the freshly read stock to
//! [`plan_checkout`]. The plan is either applied in full and committed, or
//! the transaction is dropped.

use chrono::{DateTime, Utc};
use oliminate_catalog::LockedStock;
use oliminate_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Cart;

/// Item ids of a cart, ascending and deduplicated. Every checkout locks in
/// this order so overlapping carts cannot deadlock.
pub fn lock_order(cart: &Cart) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = cart.items.iter().map(|l| l.item_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub item_id: Uuid,
    pub quantity: i32,
    pub remaining: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub decrements: Vec<StockDecrement>,
    pub receipt: Receipt,
}

/// Order confirmation returned to the buyer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub total_price: i64,
    pub items: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

/// Validate every line against `locked` and compute the stock decrements.
///
/// Fails with `NotOpen` for finalized carts, `EmptyCart` when there is
/// nothing to buy and `InsufficientStock` for the first line (in cart order)
/// whose quantity exceeds the locked stock.
pub fn plan_checkout(cart: &Cart, locked: &[LockedStock]) -> CoreResult<CheckoutPlan> {
    cart.ensure_open()?;
    if cart.items.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    let mut decrements = Vec::with_capacity(cart.items.len());
    let mut lines = Vec::with_capacity(cart.items.len());

    for line in &cart.items {
        let stock = locked
            .iter()
            .find(|s| s.item_id == line.item_id)
            .ok_or_else(|| CoreError::NotFound(format!("{} is no longer sold", line.item_name)))?;

        let remaining = stock.take(line.quantity)?;
        decrements.push(StockDecrement {
            item_id: line.item_id,
            quantity: line.quantity,
            remaining,
        });
        lines.push(ReceiptLine {
            name: stock.name.clone(),
            quantity: line.quantity,
            unit_price: line.price_snapshot,
            subtotal: line.subtotal()?,
        });
    }

    Ok(CheckoutPlan {
        decrements,
        receipt: Receipt {
            order_id: cart.id,
            created_at: cart.created_at,
            total_price: cart.total_price()?,
            items: lines,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oliminate_catalog::{Item, ItemKind, MerchandiseCategory, NewItem};
    use oliminate_core::Buyer;

    fn merch(name: &str, price: i64, stock: i32) -> Item {
        NewItem {
            kind: ItemKind::Merchandise,
            name: name.to_string(),
            category: Some(MerchandiseCategory::Keychain),
            schedule_id: None,
            price,
            stock,
            description: String::new(),
            image_url: None,
        }
        .into_item(&Buyer::organizer("org-1"))
        .unwrap()
    }

    #[test]
    fn test_plan_decrements_each_line() {
        let hat = merch("Hat", 1_000, 5);
        let fan = merch("Fan", 250, 2);
        let mut cart = Cart::new("u-1");
        cart.add_item(&hat, 3).unwrap();
        cart.add_item(&fan, 2).unwrap();

        let locked = vec![LockedStock::from(&hat), LockedStock::from(&fan)];
        let plan = plan_checkout(&cart, &locked).unwrap();

        assert_eq!(plan.decrements.len(), 2);
        assert_eq!(plan.decrements[0], StockDecrement { item_id: hat.id, quantity: 3, remaining: 2 });
        assert_eq!(plan.decrements[1], StockDecrement { item_id: fan.id, quantity: 2, remaining: 0 });
        assert_eq!(plan.receipt.order_id, cart.id);
        assert_eq!(plan.receipt.total_price, 3_500);
        assert_eq!(plan.receipt.items[0].subtotal, 3_000);
        assert_eq!(plan.receipt.items[1].unit_price, 250);
    }

    #[test]
    fn test_plan_uses_locked_stock_not_cart_time_stock() {
        let mut hat = merch("Hat", 1_000, 5);
        let mut cart = Cart::new("u-1");
        cart.add_item(&hat, 3).unwrap();

        // Another buyer took three in the meantime.
        hat.stock = 2;
        let err = plan_checkout(&cart, &[LockedStock::from(&hat)]).unwrap_err();
        assert_eq!(err, CoreError::InsufficientStock { item: "Hat".to_string(), available: 2 });
    }

    #[test]
    fn test_plan_rejects_empty_and_closed_carts() {
        let mut cart = Cart::new("u-1");
        assert_eq!(plan_checkout(&cart, &[]), Err(CoreError::EmptyCart));

        let hat = merch("Hat", 1_000, 5);
        cart.add_item(&hat, 1).unwrap();
        cart.mark_paid().unwrap();
        assert!(matches!(
            plan_checkout(&cart, &[LockedStock::from(&hat)]),
            Err(CoreError::NotOpen { .. })
        ));
    }

    #[test]
    fn test_plan_rejects_vanished_item() {
        let hat = merch("Hat", 1_000, 5);
        let mut cart = Cart::new("u-1");
        cart.add_item(&hat, 1).unwrap();
        assert!(matches!(plan_checkout(&cart, &[]), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_lock_order_is_sorted() {
        let mut cart = Cart::new("u-1");
        for i in 0..5 {
            cart.add_item(&merch(&format!("Item {}", i), 100, 1), 1).unwrap();
        }
        let ids = lock_order(&cart);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 5);
    }
}
