use async_trait::async_trait;
use oliminate_catalog::{CatalogRepository, Item, ItemUpdate, ListingFilter, NewItem, SortOrder};
use oliminate_core::{Buyer, CoreError, CoreResult, Role};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::rows::{ItemRow, ITEM_COLUMNS};

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Read an item, optionally holding its row lock until the surrounding
/// transaction ends.
pub(crate) async fn fetch_item(
    conn: &mut PgConnection,
    id: Uuid,
    for_update: bool,
) -> CoreResult<Item> {
    let sql = if for_update {
        format!("SELECT {} FROM items WHERE id = $1 FOR UPDATE", ITEM_COLUMNS)
    } else {
        format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS)
    };

    sqlx::query_as::<_, ItemRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::storage)?
        .ok_or_else(|| CoreError::NotFound(format!("item {}", id)))?
        .into_item()
}

async fn write_item(conn: &mut PgConnection, item: &Item) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = $1, category = $2, schedule_id = $3, price = $4, stock = $5,
            description = $6, image_url = $7, updated_at = $8
        WHERE id = $9
        "#,
    )
    .bind(&item.name)
    .bind(item.category.map(|c| c.as_str()))
    .bind(item.schedule_id)
    .bind(item.price)
    .bind(item.stock)
    .bind(&item.description)
    .bind(item.image_url.as_deref())
    .bind(item.updated_at)
    .bind(item.id)
    .execute(&mut *conn)
    .await
    .map_err(CoreError::storage)?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn create_item(&self, organizer: &Buyer, item: NewItem) -> CoreResult<Item> {
        organizer.require_role(Role::Organizer)?;
        let item = item.into_item(organizer)?;

        sqlx::query(
            r#"
            INSERT INTO items (id, kind, organizer_id, name, category, schedule_id, price, stock, description, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(item.id)
        .bind(item.kind.as_str())
        .bind(item.organizer_id.as_deref())
        .bind(&item.name)
        .bind(item.category.map(|c| c.as_str()))
        .bind(item.schedule_id)
        .bind(item.price)
        .bind(item.stock)
        .bind(&item.description)
        .bind(item.image_url.as_deref())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        info!(item_id = %item.id, organizer = %organizer.id, kind = %item.kind, "Item created");
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> CoreResult<Item> {
        let mut conn = self.pool.acquire().await.map_err(CoreError::storage)?;
        fetch_item(&mut conn, id, false).await
    }

    async fn list_items(&self, filter: &ListingFilter) -> CoreResult<Vec<Item>> {
        let order_by = match filter.sort {
            SortOrder::PriceAsc => "price ASC, name ASC",
            SortOrder::PriceDesc => "price DESC, name ASC",
            SortOrder::Name => "name ASC, price ASC",
        };
        let sql = format!(
            "SELECT {} FROM items WHERE ($1::TEXT IS NULL OR kind = $1) AND ($2::TEXT IS NULL OR category = $2) ORDER BY {}",
            ITEM_COLUMNS, order_by
        );

        let rows = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.category.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(CoreError::storage)?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    async fn update_item(&self, organizer: &Buyer, id: Uuid, update: ItemUpdate) -> CoreResult<Item> {
        organizer.require_role(Role::Organizer)?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let mut item = fetch_item(&mut tx, id, true).await?;
        item.ensure_owner(organizer)?;
        item.apply_update(update)?;
        write_item(&mut tx, &item).await?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(item_id = %item.id, stock = item.stock, price = item.price, "Item updated");
        Ok(item)
    }

    async fn delete_item(&self, organizer: &Buyer, id: Uuid) -> CoreResult<()> {
        organizer.require_role(Role::Organizer)?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let item = fetch_item(&mut tx, id, true).await?;
        item.ensure_owner(organizer)?;

        let sold_tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE slot_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        let closed_lines: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE ci.item_id = $1 AND c.status <> 'open'
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(CoreError::storage)?;
        item.ensure_deletable(sold_tickets, closed_lines)?;

        // Only lines of open carts go with the item.
        sqlx::query("DELETE FROM cart_items WHERE item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(item_id = %id, name = %item.name, "Item deleted");
        Ok(())
    }
}
