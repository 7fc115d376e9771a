use chrono::{DateTime, Utc};
use oliminate_catalog::{Item, ItemKind, LockedStock, MerchandiseCategory};
use oliminate_core::{CoreError, CoreResult};
use oliminate_order::{Cart, CartItem, Ticket};
use uuid::Uuid;

pub(crate) const ITEM_COLUMNS: &str = "id, kind, organizer_id, name, category, schedule_id, price, stock, description, image_url, created_at, updated_at";

pub(crate) const TICKET_COLUMNS: &str = "id, slot_id, buyer_id, price, qr_code, is_used, used_at, purchase_date";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    id: Uuid,
    kind: String,
    organizer_id: Option<String>,
    name: String,
    category: Option<String>,
    schedule_id: Option<Uuid>,
    price: i64,
    stock: i32,
    description: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    pub(crate) fn into_item(self) -> CoreResult<Item> {
        let kind = self.kind.parse::<ItemKind>().map_err(|_| corrupt("items.kind", &self.kind))?;
        let category = match self.category {
            Some(c) => Some(c.parse::<MerchandiseCategory>().map_err(|_| corrupt("items.category", &c))?),
            None => None,
        };
        Ok(Item {
            id: self.id,
            kind,
            organizer_id: self.organizer_id,
            name: self.name,
            category,
            schedule_id: self.schedule_id,
            price: self.price,
            stock: self.stock,
            description: self.description,
            image_url: self.image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LockedRow {
    id: Uuid,
    name: String,
    stock: i32,
}

impl From<LockedRow> for LockedStock {
    fn from(row: LockedRow) -> Self {
        LockedStock { item_id: row.id, name: row.name, stock: row.stock }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CartRow {
    pub(crate) id: Uuid,
    buyer_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    pub(crate) fn into_cart(self, lines: Vec<CartItemRow>) -> CoreResult<Cart> {
        Ok(Cart {
            id: self.id,
            buyer_id: self.buyer_id,
            status: self.status.parse::<oliminate_order::CartStatus>()?,
            items: lines.into_iter().map(CartItemRow::into_line).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CartItemRow {
    id: Uuid,
    cart_id: Uuid,
    item_id: Uuid,
    item_name: String,
    quantity: i32,
    price_snapshot: i64,
    created_at: DateTime<Utc>,
}

impl CartItemRow {
    fn into_line(self) -> CartItem {
        CartItem {
            id: self.id,
            cart_id: self.cart_id,
            item_id: self.item_id,
            item_name: self.item_name,
            quantity: self.quantity,
            price_snapshot: self.price_snapshot,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TicketRow {
    id: Uuid,
    slot_id: Uuid,
    buyer_id: String,
    price: i64,
    qr_code: String,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
    purchase_date: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            slot_id: row.slot_id,
            buyer_id: row.buyer_id,
            price: row.price,
            qr_code: row.qr_code,
            is_used: row.is_used,
            used_at: row.used_at,
            purchase_date: row.purchase_date,
        }
    }
}

fn corrupt(column: &str, value: &str) -> CoreError {
    CoreError::storage(format!("unexpected value '{}' in {}", value, column))
}
