//! In-process backend with the same observable semantics as PostgreSQL.
//!
//! Every write takes the single state mutex, which stands in for the row
//! locks of the database backend.

use async_trait::async_trait;
use chrono::Utc;
use oliminate_catalog::{CatalogRepository, Item, ItemUpdate, ListingFilter, LockedStock, NewItem};
use oliminate_core::{Buyer, CoreError, CoreResult, Role};
use oliminate_order::{
    ensure_shopper, lock_order, plan_checkout, plan_ticket_purchase, Cart, CartItem, CartRepository,
    CartStatus, Receipt, Ticket, TicketPurchase, TicketRepository,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Default)]
struct State {
    items: HashMap<Uuid, Item>,
    carts: HashMap<Uuid, Cart>,
    tickets: Vec<Ticket>,
}

impl State {
    fn item(&self, id: Uuid) -> CoreResult<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("item {}", id)))
    }

    fn owned_cart(&mut self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<&mut Cart> {
        ensure_shopper(buyer)?;
        let cart = self
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| CoreError::NotFound(format!("cart {}", cart_id)))?;
        cart.ensure_owner(buyer)?;
        Ok(cart)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn create_item(&self, organizer: &Buyer, item: NewItem) -> CoreResult<Item> {
        organizer.require_role(Role::Organizer)?;
        let item = item.into_item(organizer)?;
        self.state.lock().await.items.insert(item.id, item.clone());
        info!(item_id = %item.id, organizer = %organizer.id, kind = %item.kind, "Item created");
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> CoreResult<Item> {
        self.state.lock().await.item(id).cloned()
    }

    async fn list_items(&self, filter: &ListingFilter) -> CoreResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(filter.apply(state.items.values().cloned()))
    }

    async fn update_item(&self, organizer: &Buyer, id: Uuid, update: ItemUpdate) -> CoreResult<Item> {
        organizer.require_role(Role::Organizer)?;
        let mut state = self.state.lock().await;
        let item = state
            .items
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("item {}", id)))?;
        item.ensure_owner(organizer)?;
        item.apply_update(update)?;
        info!(item_id = %item.id, stock = item.stock, price = item.price, "Item updated");
        Ok(item.clone())
    }

    async fn delete_item(&self, organizer: &Buyer, id: Uuid) -> CoreResult<()> {
        organizer.require_role(Role::Organizer)?;
        let mut state = self.state.lock().await;
        let item = state.item(id)?;
        item.ensure_owner(organizer)?;

        let sold_tickets = state.tickets.iter().filter(|t| t.slot_id == id).count() as i64;
        let closed_lines = state
            .carts
            .values()
            .filter(|c| c.status != CartStatus::Open)
            .flat_map(|c| c.items.iter())
            .filter(|l| l.item_id == id)
            .count() as i64;
        item.ensure_deletable(sold_tickets, closed_lines)?;

        // Only lines of open carts go with the item.
        state.items.remove(&id);
        for cart in state.carts.values_mut() {
            cart.items.retain(|l| l.item_id != id);
        }
        info!(item_id = %id, "Item deleted");
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn open_cart(&self, buyer: &Buyer) -> CoreResult<Cart> {
        ensure_shopper(buyer)?;
        let mut state = self.state.lock().await;
        if let Some(cart) = state
            .carts
            .values()
            .find(|c| c.buyer_id == buyer.id && c.status == CartStatus::Open)
        {
            return Ok(cart.clone());
        }

        let cart = Cart::new(buyer.id.clone());
        state.carts.insert(cart.id, cart.clone());
        info!(cart_id = %cart.id, buyer_id = %buyer.id, "Cart opened");
        Ok(cart)
    }

    async fn get_cart(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Cart> {
        let mut state = self.state.lock().await;
        state.owned_cart(buyer, cart_id).map(|c| c.clone())
    }

    async fn add_item(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> CoreResult<CartItem> {
        let mut state = self.state.lock().await;
        let item = state.item(item_id)?.clone();
        let cart = state.owned_cart(buyer, cart_id)?;
        let line = cart.add_item(&item, quantity)?.clone();
        info!(cart_id = %cart_id, item_id = %item_id, quantity = line.quantity, "Cart line added");
        Ok(line)
    }

    async fn update_quantity(
        &self,
        buyer: &Buyer,
        cart_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> CoreResult<Option<CartItem>> {
        let mut state = self.state.lock().await;
        let item_id = state
            .owned_cart(buyer, cart_id)?
            .line(line_id)
            .map(|l| l.item_id)
            .ok_or_else(|| CoreError::NotFound(format!("cart item {}", line_id)))?;
        let live_stock = state.item(item_id)?.stock;

        let updated = state
            .owned_cart(buyer, cart_id)?
            .update_quantity(line_id, quantity, live_stock)?;
        info!(cart_id = %cart_id, line_id = %line_id, quantity, "Cart line quantity changed");
        Ok(updated)
    }

    async fn remove_line(&self, buyer: &Buyer, cart_id: Uuid, line_id: Uuid) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        state.owned_cart(buyer, cart_id)?.remove_line(line_id)?;
        info!(cart_id = %cart_id, line_id = %line_id, "Cart line removed");
        Ok(())
    }

    async fn checkout(&self, buyer: &Buyer, cart_id: Uuid) -> CoreResult<Receipt> {
        let mut guard = self.state.lock().await;
        let State { items, carts, .. } = &mut *guard;

        ensure_shopper(buyer)?;
        let cart = carts
            .get_mut(&cart_id)
            .ok_or_else(|| CoreError::NotFound(format!("cart {}", cart_id)))?;
        cart.ensure_owner(buyer)?;

        let locked: Vec<LockedStock> = lock_order(cart)
            .into_iter()
            .filter_map(|id| items.get(&id))
            .map(LockedStock::from)
            .collect();

        let plan = plan_checkout(cart, &locked).map_err(|e| {
            warn!(cart_id = %cart_id, buyer_id = %buyer.id, error = %e, "Checkout rejected");
            e
        })?;

        cart.mark_paid()?;
        let now = Utc::now();
        for decrement in &plan.decrements {
            if let Some(item) = items.get_mut(&decrement.item_id) {
                item.stock = decrement.remaining;
                item.updated_at = now;
            }
        }

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
        let mut state = self.state.lock().await;
        let cart = state.owned_cart(buyer, cart_id)?;
        cart.cancel()?;
        info!(cart_id = %cart_id, buyer_id = %buyer.id, "Cart cancelled");
        Ok(cart.clone())
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn purchase_tickets(
        &self,
        buyer: &Buyer,
        slot_id: Uuid,
        quantity: i32,
    ) -> CoreResult<TicketPurchase> {
        ensure_shopper(buyer)?;
        let mut state = self.state.lock().await;

        let slot = state
            .items
            .get_mut(&slot_id)
            .ok_or_else(|| CoreError::NotFound(format!("item {}", slot_id)))?;
        let purchase = plan_ticket_purchase(buyer, slot, quantity).map_err(|e| {
            warn!(slot_id = %slot_id, buyer_id = %buyer.id, error = %e, "Ticket purchase rejected");
            e
        })?;
        slot.stock = purchase.remaining;
        slot.updated_at = Utc::now();

        state.tickets.extend(purchase.tickets.iter().cloned());
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
        let state = self.state.lock().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| t.buyer_id == buyer.id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date).then_with(|| a.id.cmp(&b.id)));
        Ok(tickets)
    }

    async fn scan_ticket(&self, organizer: &Buyer, ticket_id: Uuid) -> CoreResult<Ticket> {
        organizer.require_role(Role::Organizer)?;
        let mut guard = self.state.lock().await;
        let State { items, tickets, .. } = &mut *guard;

        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| CoreError::NotFound(format!("ticket {}", ticket_id)))?;
        items
            .get(&ticket.slot_id)
            .ok_or_else(|| CoreError::NotFound(format!("item {}", ticket.slot_id)))?
            .ensure_owner(organizer)?;
        ticket.redeem()?;

        info!(ticket_id = %ticket_id, slot_id = %ticket.slot_id, "Ticket scanned");
        Ok(ticket.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oliminate_catalog::{ItemKind, MerchandiseCategory};
    use std::sync::Arc;

    fn organizer() -> Buyer {
        Buyer::organizer("org-1")
    }

    fn merch(name: &str, price: i64, stock: i32) -> NewItem {
        NewItem {
            kind: ItemKind::Merchandise,
            name: name.to_string(),
            category: Some(MerchandiseCategory::TShirt),
            schedule_id: None,
            price,
            stock,
            description: String::new(),
            image_url: None,
        }
    }

    fn slot(stock: i32) -> NewItem {
        NewItem {
            kind: ItemKind::TicketSlot,
            name: "Final".to_string(),
            category: None,
            schedule_id: Some(Uuid::new_v4()),
            price: 50_000,
            stock,
            description: String::new(),
            image_url: None,
        }
    }

    async fn cart_with(store: &InMemoryStore, buyer: &Buyer, item: &Item, quantity: i32) -> Cart {
        let cart = store.open_cart(buyer).await.unwrap();
        store.add_item(buyer, cart.id, item.id, quantity).await.unwrap();
        store.get_cart(buyer, cart.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_cart_is_reused_until_paid() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 5)).await.unwrap();

        let first = store.open_cart(&buyer).await.unwrap();
        assert_eq!(store.open_cart(&buyer).await.unwrap().id, first.id);

        store.add_item(&buyer, first.id, jersey.id, 1).await.unwrap();
        store.checkout(&buyer, first.id).await.unwrap();

        let next = store.open_cart(&buyer).await.unwrap();
        assert_ne!(next.id, first.id);
        assert!(next.items.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_decrements_stock_and_pays_once() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 5)).await.unwrap();
        let scarf = store.create_item(&organizer(), merch("Scarf", 400, 3)).await.unwrap();

        let cart = cart_with(&store, &buyer, &jersey, 3).await;
        store.add_item(&buyer, cart.id, scarf.id, 3).await.unwrap();

        let receipt = store.checkout(&buyer, cart.id).await.unwrap();
        assert_eq!(receipt.order_id, cart.id);
        assert_eq!(receipt.total_price, 4_200);
        assert_eq!(receipt.items.len(), 2);

        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 2);
        assert_eq!(store.get_item(scarf.id).await.unwrap().stock, 0);
        assert_eq!(store.get_cart(&buyer, cart.id).await.unwrap().status, CartStatus::Paid);

        let again = store.checkout(&buyer, cart.id).await.unwrap_err();
        assert!(matches!(again, CoreError::NotOpen { .. }));
        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 2);
    }

    #[tokio::test]
    async fn test_failed_checkout_changes_nothing() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 5)).await.unwrap();
        let scarf = store.create_item(&organizer(), merch("Scarf", 400, 1)).await.unwrap();

        let cart = cart_with(&store, &buyer, &jersey, 2).await;
        store.add_item(&buyer, cart.id, scarf.id, 2).await.unwrap();

        let err = store.checkout(&buyer, cart.id).await.unwrap_err();
        assert_eq!(err, CoreError::InsufficientStock { item: "Scarf".to_string(), available: 1 });

        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 5);
        assert_eq!(store.get_item(scarf.id).await.unwrap().stock, 1);
        assert_eq!(store.get_cart(&buyer, cart.id).await.unwrap().status, CartStatus::Open);
    }

    #[tokio::test]
    async fn test_empty_cart_checkout() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let cart = store.open_cart(&buyer).await.unwrap();
        assert_eq!(store.checkout(&buyer, cart.id).await.unwrap_err(), CoreError::EmptyCart);
    }

    #[tokio::test]
    async fn test_second_buyer_drains_stock_first() {
        let store = InMemoryStore::new();
        let alice = Buyer::user("alice");
        let bob = Buyer::user("bob");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 5)).await.unwrap();

        let alice_cart = cart_with(&store, &alice, &jersey, 3).await;
        assert_eq!(alice_cart.items[0].subtotal(), Ok(3_000));
        let bob_cart = cart_with(&store, &bob, &jersey, 3).await;

        store.checkout(&bob, bob_cart.id).await.unwrap();
        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 2);

        let err = store.checkout(&alice, alice_cart.id).await.unwrap_err();
        assert_eq!(err, CoreError::InsufficientStock { item: "Jersey".to_string(), available: 2 });
        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_for_last_unit() {
        let store = Arc::new(InMemoryStore::new());
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 1)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let buyer = Buyer::user(format!("buyer-{}", i));
            let cart = cart_with(&store, &buyer, &jersey, 1).await;
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.checkout(&buyer, cart.id).await }));
        }

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(CoreError::InsufficientStock { available, .. }) => {
                    assert_eq!(available, 0);
                    lost += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(won, 1);
        assert_eq!(lost, 7);
        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_update_quantity_against_live_stock() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 4)).await.unwrap();
        let scarf = store.create_item(&organizer(), merch("Scarf", 400, 4)).await.unwrap();
        let cart = cart_with(&store, &buyer, &jersey, 1).await;
        store.add_item(&buyer, cart.id, scarf.id, 2).await.unwrap();
        let line_id = cart.items[0].id;

        let err = store.update_quantity(&buyer, cart.id, line_id, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 4, .. }));

        let line = store.update_quantity(&buyer, cart.id, line_id, 4).await.unwrap().unwrap();
        assert_eq!(line.quantity, 4);

        assert!(store.update_quantity(&buyer, cart.id, line_id, 0).await.unwrap().is_none());
        let cart = store.get_cart(&buyer, cart.id).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total_price(), Ok(800));
    }

    #[tokio::test]
    async fn test_foreign_cart_is_unauthorized() {
        let store = InMemoryStore::new();
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 4)).await.unwrap();
        let cart = cart_with(&store, &Buyer::user("alice"), &jersey, 1).await;
        let mallory = Buyer::user("mallory");

        assert!(matches!(store.get_cart(&mallory, cart.id).await, Err(CoreError::Unauthorized(_))));
        assert!(matches!(store.checkout(&mallory, cart.id).await, Err(CoreError::Unauthorized(_))));
        assert!(matches!(
            store.get_cart(&mallory, Uuid::new_v4()).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_cart_is_final() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 4)).await.unwrap();
        let cart = cart_with(&store, &buyer, &jersey, 1).await;

        assert_eq!(store.cancel(&buyer, cart.id).await.unwrap().status, CartStatus::Cancelled);
        assert!(matches!(store.checkout(&buyer, cart.id).await, Err(CoreError::NotOpen { .. })));
        assert_eq!(store.get_item(jersey.id).await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_organizer_edits_own_items_only() {
        let store = InMemoryStore::new();
        let jersey = store.create_item(&organizer(), merch("Jersey", 1_000, 4)).await.unwrap();

        let edit = ItemUpdate { stock: Some(10), ..Default::default() };
        assert!(matches!(
            store.update_item(&Buyer::organizer("org-2"), jersey.id, edit.clone()).await,
            Err(CoreError::Unauthorized(_))
        ));
        assert_eq!(store.update_item(&organizer(), jersey.id, edit).await.unwrap().stock, 10);

        assert!(store.create_item(&Buyer::user("u-1"), merch("Cap", 1, 1)).await.is_err());

        store.delete_item(&organizer(), jersey.id).await.unwrap();
        assert!(matches!(store.get_item(jersey.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sold_items_survive_delete() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let final_slot = store.create_item(&organizer(), slot(5)).await.unwrap();
        let scarf = store.create_item(&organizer(), merch("Scarf", 1_500, 5)).await.unwrap();

        store.purchase_tickets(&buyer, final_slot.id, 2).await.unwrap();
        let cart = cart_with(&store, &buyer, &scarf, 2).await;
        store.checkout(&buyer, cart.id).await.unwrap();

        assert!(matches!(
            store.delete_item(&organizer(), final_slot.id).await,
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            store.delete_item(&organizer(), scarf.id).await,
            Err(CoreError::Conflict(_))
        ));

        assert_eq!(store.list_tickets(&buyer).await.unwrap().len(), 2);
        let paid = store.get_cart(&buyer, cart.id).await.unwrap();
        assert_eq!(paid.items.len(), 1);
        assert_eq!(paid.total_price(), Ok(3_000));
    }

    #[tokio::test]
    async fn test_delete_drops_open_cart_lines() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let cap = store.create_item(&organizer(), merch("Cap", 800, 5)).await.unwrap();
        let cart = cart_with(&store, &buyer, &cap, 1).await;

        store.delete_item(&organizer(), cap.id).await.unwrap();
        assert!(store.get_cart(&buyer, cart.id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_price_never_reaches_checkout() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");

        let err = store
            .create_item(&organizer(), merch("Golden Jersey", i64::MAX / 2, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let top = store
            .create_item(&organizer(), merch("Golden Jersey", oliminate_catalog::MAX_PRICE, 10))
            .await
            .unwrap();
        let cart = cart_with(&store, &buyer, &top, 3).await;
        assert!(matches!(
            store.add_item(&buyer, cart.id, top.id, i32::MAX - 3).await,
            Err(CoreError::Validation(_))
        ));

        let receipt = store.checkout(&buyer, cart.id).await.unwrap();
        assert_eq!(receipt.total_price, 3 * oliminate_catalog::MAX_PRICE);
    }

    #[tokio::test]
    async fn test_ticket_purchase_and_scan() {
        let store = InMemoryStore::new();
        let buyer = Buyer::user("u-1");
        let final_slot = store.create_item(&organizer(), slot(3)).await.unwrap();

        let purchase = store.purchase_tickets(&buyer, final_slot.id, 2).await.unwrap();
        assert_eq!(purchase.remaining, 1);
        assert_eq!(store.get_item(final_slot.id).await.unwrap().stock, 1);

        let err = store.purchase_tickets(&buyer, final_slot.id, 2).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available: 1, .. }));
        assert_eq!(store.list_tickets(&buyer).await.unwrap().len(), 2);

        let ticket_id = purchase.tickets[0].id;
        assert!(matches!(
            store.scan_ticket(&Buyer::organizer("org-2"), ticket_id).await,
            Err(CoreError::Unauthorized(_))
        ));
        let scanned = store.scan_ticket(&organizer(), ticket_id).await.unwrap();
        assert!(scanned.is_used);
        assert!(matches!(
            store.scan_ticket(&organizer(), ticket_id).await,
            Err(CoreError::Conflict(_))
        ));
    }
}
