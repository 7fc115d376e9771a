use chrono::{DateTime, Utc};
use oliminate_catalog::Item;
use oliminate_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Cart status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    Open,
    /// Written by the retired reserve-then-pay flow; never produced now.
    CheckedOut,
    Paid,
    Cancelled,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Open => "open",
            CartStatus::CheckedOut => "checked_out",
            CartStatus::Paid => "paid",
            CartStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CartStatus::Paid | CartStatus::Cancelled)
    }
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CartStatus::Open),
            "checked_out" => Ok(CartStatus::CheckedOut),
            "paid" => Ok(CartStatus::Paid),
            "cancelled" => Ok(CartStatus::Cancelled),
            other => Err(CoreError::Storage(format!("unknown cart status '{}'", other))),
        }
    }
}

/// `unit_price * quantity`, refusing amounts that do not fit an `i64`
pub fn line_total(unit_price: i64, quantity: i32) -> CoreResult<i64> {
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or_else(total_too_large)
}

fn total_too_large() -> CoreError {
    CoreError::Validation("order total is too large".to_string())
}

/// A buyer's collection of prospective purchases
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub buyer_id: String,
    pub status: CartStatus,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(buyer_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            buyer_id: buyer_id.into(),
            status: CartStatus::Open,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_price(&self) -> CoreResult<i64> {
        self.items.iter().try_fold(0i64, |total, line| {
            total.checked_add(line.subtotal()?).ok_or_else(total_too_large)
        })
    }

    pub fn line(&self, line_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|l| l.id == line_id)
    }

    pub fn line_for_item(&self, item_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|l| l.item_id == item_id)
    }
}

/// One (item, quantity, snapshotted price) entry within a cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub quantity: i32,
    pub price_snapshot: i64,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(cart_id: Uuid, item: &Item, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            cart_id,
            item_id: item.id,
            item_name: item.name.clone(),
            quantity,
            price_snapshot: item.price,
            created_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> CoreResult<i64> {
        line_total(self.price_snapshot, self.quantity)
    }
}

/// Admission issued by a ticket purchase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub buyer_id: String,
    pub price: i64,
    pub qr_code: String,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
}

impl Ticket {
    pub fn issue(slot: &Item, buyer_id: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            slot_id: slot.id,
            buyer_id: buyer_id.to_string(),
            price: slot.price,
            qr_code: format!("OLI-{}-{}", slot.id.simple(), id.simple()),
            is_used: false,
            used_at: None,
            purchase_date: Utc::now(),
        }
    }

    /// Mark as used at the gate
    pub fn redeem(&mut self) -> Result<(), CoreError> {
        if self.is_used {
            return Err(CoreError::Conflict(format!("ticket {} was already used", self.id)));
        }
        self.is_used = true;
        self.used_at = Some(Utc::now());
        Ok(())
    }
}
