use async_trait::async_trait;
use oliminate_core::{Buyer, CoreError, CoreResult, Role};
use oliminate_order::{ensure_shopper, plan_ticket_purchase, Ticket, TicketPurchase, TicketRepository};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog_repo::fetch_item;
use crate::rows::{TicketRow, TICKET_COLUMNS};

pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn purchase_tickets(
        &self,
        buyer: &Buyer,
        slot_id: Uuid,
        quantity: i32,
    ) -> CoreResult<TicketPurchase> {
        ensure_shopper(buyer)?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let slot = fetch_item(&mut tx, slot_id, true).await?;
        let purchase = match plan_ticket_purchase(buyer, &slot, quantity) {
            Ok(purchase) => purchase,
            Err(e) => {
                warn!(slot_id = %slot_id, buyer_id = %buyer.id, error = %e, "Ticket purchase rejected");
                if let Err(rollback) = tx.rollback().await {
                    warn!(slot_id = %slot_id, error = %rollback, "Rollback failed");
                }
                return Err(e);
            }
        };

        sqlx::query("UPDATE items SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
            .bind(quantity)
            .bind(slot_id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        for ticket in &purchase.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, slot_id, buyer_id, price, qr_code, is_used, used_at, purchase_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.slot_id)
            .bind(&ticket.buyer_id)
            .bind(ticket.price)
            .bind(&ticket.qr_code)
            .bind(ticket.is_used)
            .bind(ticket.used_at)
            .bind(ticket.purchase_date)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        }

        tx.commit().await.map_err(CoreError::storage)?;
        info!(
            slot_id = %slot_id,
            buyer_id = %buyer.id,
            quantity,
            remaining = purchase.remaining,
            "Tickets purchased"
        );
        Ok(purchase)
    }

    async fn list_tickets(&self, buyer: &Buyer) -> CoreResult<Vec<Ticket>> {
        ensure_shopper(buyer)?;
        let sql = format!(
            "SELECT {} FROM tickets WHERE buyer_id = $1 ORDER BY purchase_date DESC, id",
            TICKET_COLUMNS
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(&buyer.id)
            .fetch_all(&self.pool)
            .await
            .map_err(CoreError::storage)?;

        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn scan_ticket(&self, organizer: &Buyer, ticket_id: Uuid) -> CoreResult<Ticket> {
        organizer.require_role(Role::Organizer)?;
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let sql = format!("SELECT {} FROM tickets WHERE id = $1 FOR UPDATE", TICKET_COLUMNS);
        let mut ticket: Ticket = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(ticket_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::NotFound(format!("ticket {}", ticket_id)))?
            .into();

        let slot = fetch_item(&mut tx, ticket.slot_id, false).await?;
        slot.ensure_owner(organizer)?;
        ticket.redeem()?;

        sqlx::query("UPDATE tickets SET is_used = TRUE, used_at = $1 WHERE id = $2")
            .bind(ticket.used_at)
            .bind(ticket.id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        info!(ticket_id = %ticket_id, slot_id = %ticket.slot_id, "Ticket scanned");
        Ok(ticket)
    }
}
