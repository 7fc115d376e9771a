use chrono::{DateTime, Utc};
use oliminate_core::{Buyer, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What a stock-bearing item sells
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Merchandise,
    TicketSlot,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Merchandise => "merchandise",
            ItemKind::TicketSlot => "ticket_slot",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merchandise" => Ok(ItemKind::Merchandise),
            "ticket_slot" => Ok(ItemKind::TicketSlot),
            other => Err(CoreError::Validation(format!("unknown item kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MerchandiseCategory {
    #[serde(rename = "t-shirt")]
    TShirt,
    #[serde(rename = "sweater")]
    Sweater,
    #[serde(rename = "bandana")]
    Bandana,
    #[serde(rename = "hat")]
    Hat,
    #[serde(rename = "scarf")]
    Scarf,
    #[serde(rename = "totebag")]
    Totebag,
    #[serde(rename = "handfan")]
    Handfan,
    #[serde(rename = "sticker")]
    Sticker,
    #[serde(rename = "keychain")]
    Keychain,
    #[serde(rename = "lanyard")]
    Lanyard,
}

impl MerchandiseCategory {
    pub const ALL: [MerchandiseCategory; 10] = [
        MerchandiseCategory::TShirt,
        MerchandiseCategory::Sweater,
        MerchandiseCategory::Bandana,
        MerchandiseCategory::Hat,
        MerchandiseCategory::Scarf,
        MerchandiseCategory::Totebag,
        MerchandiseCategory::Handfan,
        MerchandiseCategory::Sticker,
        MerchandiseCategory::Keychain,
        MerchandiseCategory::Lanyard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MerchandiseCategory::TShirt => "t-shirt",
            MerchandiseCategory::Sweater => "sweater",
            MerchandiseCategory::Bandana => "bandana",
            MerchandiseCategory::Hat => "hat",
            MerchandiseCategory::Scarf => "scarf",
            MerchandiseCategory::Totebag => "totebag",
            MerchandiseCategory::Handfan => "handfan",
            MerchandiseCategory::Sticker => "sticker",
            MerchandiseCategory::Keychain => "keychain",
            MerchandiseCategory::Lanyard => "lanyard",
        }
    }

    /// Human label shown next to the category code
    pub fn label(&self) -> &'static str {
        match self {
            MerchandiseCategory::TShirt => "T-Shirt",
            MerchandiseCategory::Sweater => "Sweater",
            MerchandiseCategory::Bandana => "Bandana",
            MerchandiseCategory::Hat => "Hat",
            MerchandiseCategory::Scarf => "Scarf",
            MerchandiseCategory::Totebag => "Totebag",
            MerchandiseCategory::Handfan => "Handfan",
            MerchandiseCategory::Sticker => "Sticker",
            MerchandiseCategory::Keychain => "Keychain",
            MerchandiseCategory::Lanyard => "Lanyard",
        }
    }
}

impl FromStr for MerchandiseCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MerchandiseCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("unknown category '{}'", s)))
    }
}

/// A stock-bearing sellable item: a piece of merchandise or the admission
/// slot of a scheduled match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub organizer_id: Option<String>,
    pub name: String,
    pub category: Option<MerchandiseCategory>,
    pub schedule_id: Option<Uuid>,
    pub price: i64,
    pub stock: i32,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn is_owned_by(&self, buyer: &Buyer) -> bool {
        self.organizer_id.as_deref() == Some(buyer.id.as_str())
    }

    pub fn ensure_owner(&self, buyer: &Buyer) -> CoreResult<()> {
        if !self.is_owned_by(buyer) {
            return Err(CoreError::Unauthorized(format!(
                "item {} belongs to another organizer",
                self.id
            )));
        }
        Ok(())
    }

    /// An item can be deleted only while nothing has been sold from it.
    /// `sold_tickets` counts issued tickets for a slot and `closed_lines`
    /// counts its lines in carts that are no longer open.
    pub fn ensure_deletable(&self, sold_tickets: i64, closed_lines: i64) -> CoreResult<()> {
        if sold_tickets > 0 {
            return Err(CoreError::Conflict(format!(
                "{} has {} issued tickets; set its stock to 0 instead",
                self.name, sold_tickets
            )));
        }
        if closed_lines > 0 {
            return Err(CoreError::Conflict(format!(
                "{} appears in {} past orders; set its stock to 0 instead",
                self.name, closed_lines
            )));
        }
        Ok(())
    }

    /// Apply an organizer edit, re-validating the result before committing it.
    pub fn apply_update(&mut self, update: ItemUpdate) -> CoreResult<()> {
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            next.category = Some(category);
        }
        if let Some(schedule_id) = update.schedule_id {
            next.schedule_id = Some(schedule_id);
        }
        if let Some(price) = update.price {
            next.price = price;
        }
        if let Some(stock) = update.stock {
            next.stock = stock;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(image_url) = update.image_url {
            next.image_url = Some(image_url).filter(|u| !u.is_empty());
        }
        validate_fields(next.kind, &next.name, next.category, next.schedule_id, next.price, next.stock)?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

/// Organizer input for a new item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub category: Option<MerchandiseCategory>,
    #[serde(default)]
    pub schedule_id: Option<Uuid>,
    pub price: i64,
    pub stock: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewItem {
    pub fn into_item(self, organizer: &Buyer) -> CoreResult<Item> {
        let name = self.name.trim().to_string();
        validate_fields(self.kind, &name, self.category, self.schedule_id, self.price, self.stock)?;

        let now = Utc::now();
        Ok(Item {
            id: Uuid::new_v4(),
            kind: self.kind,
            organizer_id: Some(organizer.id.clone()),
            name,
            category: self.category,
            schedule_id: self.schedule_id,
            price: self.price,
            stock: self.stock,
            description: self.description,
            image_url: self.image_url.filter(|u| !u.is_empty()),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial organizer edit; absent fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub category: Option<MerchandiseCategory>,
    pub schedule_id: Option<Uuid>,
    pub price: Option<i64>,
    pub stock: Option<i32>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Highest accepted unit price, in minor units
pub const MAX_PRICE: i64 = 100_000_000_000;

fn validate_fields(
    kind: ItemKind,
    name: &str,
    category: Option<MerchandiseCategory>,
    schedule_id: Option<Uuid>,
    price: i64,
    stock: i32,
) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()));
    }
    if price < 0 {
        return Err(CoreError::Validation("price must not be negative".to_string()));
    }
    if price > MAX_PRICE {
        return Err(CoreError::Validation(format!("price must not exceed {}", MAX_PRICE)));
    }
    if stock < 0 {
        return Err(CoreError::Validation("stock must not be negative".to_string()));
    }
    match kind {
        ItemKind::Merchandise if category.is_none() => Err(CoreError::Validation(
            "merchandise needs a category".to_string(),
        )),
        ItemKind::TicketSlot if schedule_id.is_none() => Err(CoreError::Validation(
            "a ticket slot needs a schedule".to_string(),
        )),
        _ => Ok(()),
    }
}
