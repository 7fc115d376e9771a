use oliminate_catalog::{Item, ItemKind, LockedStock};
use oliminate_core::{Buyer, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::ensure_shopper;
use crate::models::{line_total, Ticket};

/// Result of buying tickets for one slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketPurchase {
    pub slot_id: Uuid,
    pub remaining: i32,
    pub total_price: i64,
    pub tickets: Vec<Ticket>,
}

/// Decide a ticket purchase against a slot read under lock. A zero or
/// negative quantity is rejected rather than clamped.
pub fn plan_ticket_purchase(buyer: &Buyer, slot: &Item, quantity: i32) -> CoreResult<TicketPurchase> {
    ensure_shopper(buyer)?;
    if slot.kind != ItemKind::TicketSlot {
        return Err(CoreError::Validation(format!("{} is not a ticket slot", slot.name)));
    }

    let remaining = LockedStock::from(slot).take(quantity)?;
    let total_price = line_total(slot.price, quantity)?;
    let tickets: Vec<Ticket> = (0..quantity).map(|_| Ticket::issue(slot, &buyer.id)).collect();

    Ok(TicketPurchase {
        slot_id: slot.id,
        remaining,
        total_price,
        tickets,
    })
}
