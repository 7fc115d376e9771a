use async_trait::async_trait;
use oliminate_catalog::LockedStock;
use oliminate_core::{Buyer, CoreError, CoreResult};
use oliminate_order::{
    ensure_shopper, lock_order, plan_checkout, Cart, CartItem, CartRepository, CartStatus, Receipt,
};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog_repo::fetch_item;
use crate::rows::{CartItemRow, CartRow, LockedRow};

const OPEN_CART_ATTEMPTS: usize = 3;

pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Load a cart with its lines. With `for_update` the cart row stays locked
/// until the transaction ends, serializing every write to the cart.
async fn fetch_cart(conn: &mut PgConnection, cart_id: Uuid, for_update: bool) -> CoreResult<Cart> {
    let sql = if for_update {
        "SELECT id, buyer_id, status, created_at, updated_at FROM carts WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, buyer_id, status, created_at, updated_at FROM carts WHERE id = $1"
    };

    let row = sqlx::query_as::<_, CartRow>(sql)
        .bind(cart_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::storage)?
        .ok_or_else(|| CoreError::NotFound(format!("cart {}", cart_id)))?;

    let lines = sqlx::query_as::<_, CartItemRow>(
        "SELECT id, cart_id, item_id, item_name, quantity, price_snapshot, created_at FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id",
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await
    .map_err(CoreError::storage)?;

    row.into_cart(lines)
}

async fn set_status(conn: &mut PgConnection, cart: &Cart) -> CoreResult<()> {
    sqlx::query("UPDATE carts SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(cart.status.as_str())
        .bind(cart.updated_at)
        .bind(cart.id)
        .execute(&mut *conn)
        .await
        .map_err(CoreError::storage)?;
    Ok(())
}

/// Lock the buyer's cart for a write
async fn owned_cart(conn: &mut PgConnection, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart> {
    ensure_shopper(buyer)?;
    let cart = fetch_cart(conn, cart_id, true).await?;
    cart.ensure_owner(buyer)?;
    Ok(cart)
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn open_cart(&self, buyer: &Buyer) -> CoreResult<Cart> {
        ensure_shopper(buyer)?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        // The partial unique index keeps this to one open cart per buyer. A
        // checkout committing between the insert and the lookup leaves no
        // open cart, so try again.
        for _ in 0..OPEN_CART_ATTEMPTS {
            let fresh = Cart::new(buyer.id.clone());
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO carts (id, buyer_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (buyer_id) WHERE status = 'open' DO NOTHING
                RETURNING id
                "#,
            )
            .bind(fresh.id)
            .bind(&fresh.buyer_id)
            .bind(CartStatus::Open.as_str())
            .bind(fresh.created_at)
            .bind(fresh.updated_at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

            let cart_id = match inserted {
                Some(id) => Some(id),
                None => sqlx::query_scalar::<_, Uuid>(
                    "SELECT id FROM carts WHERE buyer_id = $1 AND status = 'open' FOR UPDATE",
                )
                .bind(&buyer.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(CoreError::storage)?,
            };

            if let Some(cart_id) = cart_id {
                let cart = fetch_cart(&mut tx, cart_id, false).await?;
                tx.commit().await.map_err(CoreError::storage)?;
                return Ok(cart);
            }
        }

        warn!(buyer_id = %buyer.id, "Open cart kept changing during lookup");
        Err(CoreError::Conflict("cart changed concurrently, please retry".to_string()))
    }

    async fn get_cart(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart> {
        ensure_shopper(buyer)?;
        let mut conn = self.pool.acquire().await.map_err(CoreError::storage)?;
        let cart = fetch_cart(&mut conn, cart_id, false).await?;
        cart.ensure_owner(buyer)?;
        Ok(cart)
    }

    async fn add_item(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> CoreResult<CartItem> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut cart = owned_cart(&mut tx, buyer, cart_id).await?;
        let item = fetch_item(&mut tx, item_id, false).await?;

        let existed = cart.line_for_item(item_id).is_some();
        let line = cart.add_item(&item, quantity)?.clone();

        if existed {
            sqlx::query("UPDATE cart_items SET quantity = $1 WHERE id = $2")
                .bind(line.quantity)
                .bind(line.id)
                .execute(&mut *tx)
                .await
                .map_err(CoreError::storage)?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, item_id, item_name, quantity, price_snapshot, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id)
            .bind(line.cart_id)
            .bind(line.item_id)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.price_snapshot)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        }
        sqlx::query("UPDATE carts SET updated_at = $1 WHERE id = $2")
            .bind(cart.updated_at)
            .bind(cart.id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(cart_id = %cart.id, item_id = %item_id, quantity = line.quantity, "Cart line added");
        Ok(line)
    }

    async fn update_quantity(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> CoreResult<Option<CartItem>> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut cart = owned_cart(&mut tx, buyer, cart_id).await?;

        let item_id = cart
            .line(line_id)
            .map(|l| l.item_id)
            .ok_or_else(|| CoreError::NotFound(format!("cart item {}", line_id)))?;
        let live_stock = fetch_item(&mut tx, item_id, false).await?.stock;

        let updated = cart.update_quantity(line_id, quantity, live_stock)?;
        match &updated {
            Some(line) => {
                sqlx::query("UPDATE cart_items SET quantity = $1 WHERE id = $2")
                    .bind(line.quantity)
                    .bind(line.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(CoreError::storage)?;
            }
            None => {
                sqlx::query("DELETE FROM cart_items WHERE id = $1")
                    .bind(line_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(CoreError::storage)?;
            }
        }

        tx.commit().await.map_err(CoreError::storage)?;
        info!(cart_id = %cart_id, line_id = %line_id, quantity, "Cart line quantity changed");
        Ok(updated)
    }

    async fn remove_line(&self, buyer: &Buyer, cart_id: Uuid, line_id: Uuid) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut cart = owned_cart(&mut tx, buyer, cart_id).await?;
        let removed = cart.remove_line(line_id)?;

        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(removed.id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(cart_id = %cart_id, line_id = %line_id, "Cart line removed");
        Ok(())
    }

    async fn checkout(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Receipt> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut cart = owned_cart(&mut tx, buyer, cart_id).await?;

        // Rows come back locked in ascending id order.
        let ids = lock_order(&cart);
        let locked: Vec<LockedStock> = sqlx::query_as::<_, LockedRow>(
            "SELECT id, name, stock FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await
        .map_err(CoreError::storage)?
        .into_iter()
        .map(LockedStock::from)
        .collect();

        let plan = match plan_checkout(&cart, &locked) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(cart_id = %cart_id, buyer_id = %buyer.id, error = %e, "Checkout rejected");
                if let Err(rollback) = tx.rollback().await {
                    warn!(cart_id = %cart_id, error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        };

        cart.mark_paid()?;
        for decrement in &plan.decrements {
            sqlx::query("UPDATE items SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(decrement.quantity)
                .bind(decrement.item_id)
                .execute(&mut *tx)
                .await
                .map_err(CoreError::storage)?;
        }
        set_status(&mut tx, &cart).await?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(
            cart_id = %cart_id,
            buyer_id = %buyer.id,
            total = plan.receipt.total_price,
            lines = plan.receipt.items.len(),
            "Cart checked out"
        );
        Ok(plan.receipt)
    }

    async fn cancel(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut cart = owned_cart(&mut tx, buyer, cart_id).await?;
        cart.cancel()?;
        set_status(&mut tx, &cart).await?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(cart_id = %cart_id, buyer_id = %buyer.id, "Cart cancelled");
        Ok(cart)
    }
}
