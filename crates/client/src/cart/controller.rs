//! The cart reconciliation controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use shopfront_core::ProductId;
use tracing::{debug, info, instrument, warn};

use super::debounce::{Debouncer, FlushState};
use super::mailbox::{Batch, Mailbox};
use super::model::{CartSnapshot, CartState, QuantityRejection};
use crate::api::{CartService, RemoveLine};
use crate::notice::{Notice, Notifier, SyncChannel};
use crate::sync::lock;

/// Default quiet period before pending writes are sent.
pub const DEFAULT_SYNC_DEBOUNCE: Duration = Duration::from_millis(500);

/// Optimistic cart with debounced server sync.
///
/// Mutations apply to local state immediately and return; the matching
/// server writes go out after a quiet period. Quantity changes and removals
/// are independent channels with their own timers.
///
/// Construct one per cart screen and call [`shutdown`](Self::shutdown) when
/// the screen goes away so pending writes are not lost.
#[derive(Clone)]
pub struct CartController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    service: Arc<dyn CartService>,
    notifier: Notifier,
    state: Mutex<CartState>,
    pending_quantity: Mailbox<ProductId, u32>,
    pending_removals: Batch<RemoveLine>,
    /// Held for a whole quantity flush so updates reach the server in order.
    quantity_send: tokio::sync::Mutex<()>,
    quantity_sync: Arc<Debouncer>,
    removal_sync: Arc<Debouncer>,
}

impl CartController {
    /// Create a controller with an empty cart. Call [`load`](Self::load) to
    /// fetch the real contents.
    #[must_use]
    pub fn new(service: Arc<dyn CartService>, notifier: Notifier, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                service,
                notifier,
                state: Mutex::new(CartState::default()),
                pending_quantity: Mailbox::new(),
                pending_removals: Batch::new(),
                quantity_send: tokio::sync::Mutex::new(()),
                quantity_sync: Debouncer::new("quantity", debounce),
                removal_sync: Debouncer::new("removal", debounce),
            }),
        }
    }

    /// Replace local state with the server's cart, selecting every item.
    ///
    /// Any failure leaves an empty cart and publishes a notice; there is no
    /// retry.
    #[instrument(skip(self))]
    pub async fn load(&self) -> CartSnapshot {
        let state = match self.inner.service.fetch_cart().await {
            Ok(payload) => {
                let state = CartState::from_payload(&payload);
                info!(items = state.items().len(), "Cart loaded");
                state
            }
            Err(e) => {
                warn!(error = %e, "Failed to load cart");
                self.inner.notifier.publish(Notice::load_failed(&e));
                CartState::default()
            }
        };

        let mut current = lock(&self.inner.state);
        *current = state;
        current.snapshot()
    }

    /// Adjust a product's quantity by `delta` and schedule the server write.
    ///
    /// # Errors
    ///
    /// Returns the rejection (and publishes it as a notice) when the result
    /// would be below one, above the stock limit on an increase, or the
    /// product is not in the cart. Nothing changes and nothing is sent.
    pub fn change_quantity(
        &self,
        product_id: &ProductId,
        delta: i32,
    ) -> Result<u32, QuantityRejection> {
        let result = lock(&self.inner.state).apply_quantity_delta(product_id, delta);
        let quantity = match result {
            Ok(quantity) => quantity,
            Err(reason) => {
                self.inner.notifier.publish(Notice::QuantityRejected {
                    product_id: product_id.clone(),
                    reason,
                });
                return Err(reason);
            }
        };

        if delta == 0 {
            return Ok(quantity);
        }

        self.inner.pending_quantity.put(product_id.clone(), quantity);

        let inner = Arc::clone(&self.inner);
        self.inner
            .quantity_sync
            .arm(move || async move { inner.flush_quantity().await });

        debug!(product_id = %product_id, quantity, "Quantity changed locally");
        Ok(quantity)
    }

    /// Flip a product's checkout selection. Products not in the cart are
    /// ignored. Returns whether the product is now selected.
    pub fn toggle_selection(&self, product_id: &ProductId) -> bool {
        lock(&self.inner.state).toggle_selection(product_id)
    }

    /// Select every item for checkout.
    pub fn select_all(&self) {
        lock(&self.inner.state).select_all();
    }

    /// Deselect every item.
    pub fn clear_selection(&self) {
        lock(&self.inner.state).clear_selection();
    }

    /// Remove a product locally and schedule the batched server removal.
    ///
    /// Returns `false` if the product was not in the cart. A failed removal
    /// is reported with a notice; the item is not put back.
    pub fn delete_item(&self, product_id: &ProductId) -> bool {
        let Some(removed) = lock(&self.inner.state).remove(product_id) else {
            return false;
        };

        // A quantity write for a removed line would race the removal.
        if self.inner.pending_quantity.take(product_id).is_some() {
            debug!(product_id = %product_id, "Dropped pending quantity change for removed item");
        }

        self.inner.pending_removals.push(RemoveLine {
            product_id: removed.product_id,
            quantity: removed.quantity,
        });

        let inner = Arc::clone(&self.inner);
        self.inner
            .removal_sync
            .arm(move || async move { inner.flush_removals().await });

        debug!(product_id = %product_id, pending = self.inner.pending_removals.len(), "Item removed locally");
        true
    }

    /// Σ unit price × quantity over the selected items.
    #[must_use]
    pub fn selected_total(&self) -> Decimal {
        lock(&self.inner.state).selected_total()
    }

    /// Copy of the current cart for rendering.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        lock(&self.inner.state).snapshot()
    }

    /// State of the quantity and removal channels.
    #[must_use]
    pub fn sync_state(&self) -> (FlushState, FlushState) {
        (
            self.inner.quantity_sync.state(),
            self.inner.removal_sync.state(),
        )
    }

    /// Wait until both channels are idle, letting armed timers run out.
    pub async fn settle(&self) {
        tokio::join!(
            self.inner.quantity_sync.wait_idle(),
            self.inner.removal_sync.wait_idle()
        );
    }

    /// Send pending writes now instead of waiting for their timers, then
    /// wait for every in-flight write to finish.
    pub async fn flush_pending(&self) {
        let inner = &self.inner;
        let quantity = async {
            if inner.quantity_sync.cancel() {
                inner.quantity_sync.run_now(inner.flush_quantity()).await;
            }
        };
        let removals = async {
            if inner.removal_sync.cancel() {
                inner.removal_sync.run_now(inner.flush_removals()).await;
            }
        };
        tokio::join!(quantity, removals);
        self.settle().await;
    }

    /// Tear down: flush pending writes and wait for them.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.flush_pending().await;
        info!("Cart controller shut down");
    }
}

impl ControllerInner {
    /// Send every pending quantity, one product at a time.
    ///
    /// A flush that starts while another is still sending waits for it, so
    /// a newer quantity never lands before an older one for the same product.
    async fn flush_quantity(&self) {
        let _sending = self.quantity_send.lock().await;
        for (product_id, quantity) in self.pending_quantity.drain() {
            self.send_quantity(&product_id, quantity).await;
        }
    }

    async fn send_quantity(&self, product_id: &ProductId, quantity: u32) {
        match self.service.update_item(product_id, quantity).await {
            Ok(()) => debug!(product_id = %product_id, quantity, "Quantity synced"),
            Err(e) => {
                warn!(product_id = %product_id, error = %e, "Quantity sync failed");
                self.notifier
                    .publish(Notice::sync_failed(SyncChannel::Quantity, &e));
            }
        }
    }

    async fn flush_removals(&self) {
        let lines = self.pending_removals.drain();
        if lines.is_empty() {
            return;
        }

        match self.service.remove_items(&lines).await {
            Ok(()) => debug!(count = lines.len(), "Removals synced"),
            Err(e) => {
                warn!(count = lines.len(), error = %e, "Removal sync failed");
                self.notifier
                    .publish(Notice::sync_failed(SyncChannel::Deletion, &e));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::api::{ApiError, CartLinePayload, CartPayload, ProductSnapshot};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Fetch,
        Update(ProductId, u32),
        Remove(Vec<ProductId>),
    }

    /// In-memory cart service that records every call.
    #[derive(Default)]
    struct FakeCartService {
        lines: Mutex<Vec<CartLinePayload>>,
        calls: Mutex<Vec<Call>>,
        fail_fetch: bool,
        fail_writes: bool,
        /// Delay the update for this product and quantity.
        slow_update: Option<(ProductId, u32, Duration)>,
        updates_in_flight: AtomicUsize,
        max_updates_in_flight: AtomicUsize,
    }

    impl FakeCartService {
        fn with_lines(lines: Vec<CartLinePayload>) -> Self {
            Self {
                lines: Mutex::new(lines),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn writes(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| *c != Call::Fetch)
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn write_result(&self) -> Result<(), ApiError> {
            if self.fail_writes {
                Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CartService for FakeCartService {
        async fn fetch_cart(&self) -> Result<CartPayload, ApiError> {
            self.record(Call::Fetch);
            if self.fail_fetch {
                return Err(ApiError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(CartPayload {
                items: self.lines.lock().unwrap().clone(),
            })
        }

        async fn add_item(&self, _product_id: &ProductId, _quantity: u32) -> Result<(), ApiError> {
            Ok(())
        }

        async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
            let active = self.updates_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_updates_in_flight.fetch_max(active, Ordering::SeqCst);
            if let Some((slow_id, slow_quantity, delay)) = &self.slow_update
                && slow_id == product_id
                && *slow_quantity == quantity
            {
                tokio::time::sleep(*delay).await;
            }
            // Recorded when the server applies it, not when it was sent.
            self.record(Call::Update(product_id.clone(), quantity));
            self.updates_in_flight.fetch_sub(1, Ordering::SeqCst);
            self.write_result()
        }

        async fn remove_items(&self, items: &[RemoveLine]) -> Result<(), ApiError> {
            self.record(Call::Remove(
                items.iter().map(|l| l.product_id.clone()).collect(),
            ));
            self.write_result()
        }

        async fn clear_cart(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn line(id: &str, quantity: u32, stock: u32, price: i64) -> CartLinePayload {
        CartLinePayload {
            product: ProductSnapshot {
                id: ProductId::new(id),
                name: id.to_uppercase(),
                image: None,
                price: Decimal::from(price),
                count_in_stock: stock,
            },
            quantity,
            price: None,
        }
    }

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    async fn loaded(
        service: FakeCartService,
    ) -> (CartController, Arc<FakeCartService>, UnboundedReceiver<Notice>) {
        let service = Arc::new(service);
        let (notifier, notices) = Notifier::channel();
        let cart = CartController::new(service.clone(), notifier, DEFAULT_SYNC_DEBOUNCE);
        cart.load().await;
        (cart, service, notices)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_selects_all_items() {
        let (cart, _, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 2, 5, 10),
            line("b", 1, 5, 3),
        ]))
        .await;

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.is_selected(&id("a")));
        assert!(snapshot.is_selected(&id("b")));
        assert_eq!(cart.selected_total(), Decimal::from(23));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_falls_back_to_empty_cart() {
        let service = FakeCartService {
            fail_fetch: true,
            ..FakeCartService::with_lines(vec![line("a", 1, 5, 10)])
        };
        let (cart, service, mut notices) = loaded(service).await;

        assert!(cart.snapshot().items.is_empty());
        assert_eq!(cart.selected_total(), Decimal::ZERO);
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::LoadFailed { .. }
        ));
        // No retry.
        assert_eq!(service.calls(), vec![Call::Fetch]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_to_stock_limit_sends_one_update() {
        let (cart, service, mut notices) =
            loaded(FakeCartService::with_lines(vec![line("a", 2, 5, 10)])).await;

        assert_eq!(cart.change_quantity(&id("a"), 1), Ok(3));
        assert_eq!(cart.selected_total(), Decimal::from(30));

        assert_eq!(cart.change_quantity(&id("a"), 1), Ok(4));
        assert_eq!(cart.change_quantity(&id("a"), 1), Ok(5));
        assert_eq!(cart.snapshot().items[0].quantity, 5);
        assert!(service.writes().is_empty());

        cart.settle().await;
        assert_eq!(service.writes(), vec![Call::Update(id("a"), 5)]);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_past_stock_is_rejected_locally() {
        let (cart, service, mut notices) =
            loaded(FakeCartService::with_lines(vec![line("a", 5, 5, 10)])).await;

        assert_eq!(
            cart.change_quantity(&id("a"), 1),
            Err(QuantityRejection::ExceedsStock { stock: 5 })
        );
        assert_eq!(cart.snapshot().items[0].quantity, 5);
        assert_eq!(
            notices.try_recv().unwrap(),
            Notice::QuantityRejected {
                product_id: id("a"),
                reason: QuantityRejection::ExceedsStock { stock: 5 },
            }
        );

        cart.settle().await;
        assert!(service.writes().is_empty());
        assert_eq!(cart.sync_state(), (FlushState::Idle, FlushState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decrement_at_one_is_a_noop() {
        let (cart, service, mut notices) =
            loaded(FakeCartService::with_lines(vec![line("a", 1, 5, 10)])).await;

        assert_eq!(
            cart.change_quantity(&id("a"), -1),
            Err(QuantityRejection::BelowMinimum)
        );
        assert_eq!(cart.snapshot().items[0].quantity, 1);
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::QuantityRejected { .. }
        ));

        cart.settle().await;
        assert!(service.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_separated_by_quiet_period_flush_separately() {
        let (cart, service, _) =
            loaded(FakeCartService::with_lines(vec![line("a", 2, 5, 10)])).await;

        cart.change_quantity(&id("a"), 1).unwrap();
        cart.settle().await;
        cart.change_quantity(&id("a"), -1).unwrap();
        cart.settle().await;

        assert_eq!(
            service.writes(),
            vec![Call::Update(id("a"), 3), Call::Update(id("a"), 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternating_products_share_one_flush() {
        let (cart, service, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 1, 5, 10),
            line("b", 1, 5, 10),
        ]))
        .await;

        cart.change_quantity(&id("a"), 1).unwrap();
        cart.change_quantity(&id("b"), 1).unwrap();
        cart.change_quantity(&id("a"), 1).unwrap();
        cart.change_quantity(&id("b"), 1).unwrap();
        cart.settle().await;

        assert_eq!(
            service.writes(),
            vec![Call::Update(id("a"), 3), Call::Update(id("b"), 3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_update_is_not_overtaken_by_newer_quantity() {
        let service = FakeCartService {
            slow_update: Some((id("a"), 2, Duration::from_secs(2))),
            ..FakeCartService::with_lines(vec![line("a", 1, 5, 10), line("b", 1, 5, 10)])
        };
        let (cart, service, _) = loaded(service).await;

        cart.change_quantity(&id("a"), 1).unwrap();
        // Let the first flush start; its update for a=2 is still on the wire.
        tokio::time::sleep(DEFAULT_SYNC_DEBOUNCE + Duration::from_millis(10)).await;
        assert_eq!(cart.sync_state().0, FlushState::Flushing);

        cart.change_quantity(&id("b"), 1).unwrap();
        cart.change_quantity(&id("a"), 1).unwrap();
        cart.change_quantity(&id("b"), 1).unwrap();
        cart.settle().await;

        assert_eq!(
            service.writes(),
            vec![
                Call::Update(id("a"), 2),
                Call::Update(id("a"), 3),
                Call::Update(id("b"), 3),
            ]
        );
        assert_eq!(service.max_updates_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(cart.snapshot().items[0].quantity, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletes_within_window_are_batched() {
        let (cart, service, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 1, 5, 10),
            line("b", 2, 5, 4),
        ]))
        .await;

        assert!(cart.delete_item(&id("a")));
        assert!(cart.delete_item(&id("b")));
        assert!(cart.snapshot().items.is_empty());
        assert_eq!(cart.selected_total(), Decimal::ZERO);

        cart.settle().await;
        assert_eq!(service.writes(), vec![Call::Remove(vec![id("a"), id("b")])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_then_toggle_does_not_resurrect() {
        let (cart, _, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 1, 5, 10),
            line("b", 1, 5, 10),
        ]))
        .await;

        cart.delete_item(&id("a"));
        assert!(!cart.toggle_selection(&id("a")));

        let snapshot = cart.snapshot();
        assert!(!snapshot.is_selected(&id("a")));
        assert_eq!(snapshot.selected.len(), 1);
        assert!(!cart.delete_item(&id("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_drops_pending_quantity_for_same_item() {
        let (cart, service, _) =
            loaded(FakeCartService::with_lines(vec![line("a", 1, 5, 10)])).await;

        cart.change_quantity(&id("a"), 1).unwrap();
        cart.delete_item(&id("a"));
        cart.settle().await;

        assert_eq!(service.writes(), vec![Call::Remove(vec![id("a")])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_drives_total() {
        let (cart, service, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 2, 5, 10),
            line("b", 1, 5, 7),
        ]))
        .await;

        assert!(!cart.toggle_selection(&id("a")));
        assert_eq!(cart.selected_total(), Decimal::from(7));

        cart.clear_selection();
        assert_eq!(cart.selected_total(), Decimal::ZERO);

        cart.select_all();
        assert_eq!(cart.selected_total(), Decimal::from(27));
        assert_eq!(cart.selected_total(), Decimal::from(27));

        cart.settle().await;
        assert!(service.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_keeps_local_state_and_notifies() {
        let service = FakeCartService {
            fail_writes: true,
            ..FakeCartService::with_lines(vec![line("a", 2, 5, 10), line("b", 1, 5, 10)])
        };
        let (cart, service, mut notices) = loaded(service).await;

        cart.change_quantity(&id("a"), 1).unwrap();
        cart.delete_item(&id("b"));
        cart.settle().await;

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 3);

        let mut channels = vec![];
        while let Ok(notice) = notices.try_recv() {
            if let Notice::SyncFailed { channel, .. } = notice {
                channels.push(channel);
            }
        }
        channels.sort_by_key(|c| matches!(c, SyncChannel::Deletion));
        assert_eq!(channels, vec![SyncChannel::Quantity, SyncChannel::Deletion]);

        // No retry after the failure.
        assert_eq!(service.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pending_sends_without_waiting() {
        let (cart, service, _) = loaded(FakeCartService::with_lines(vec![
            line("a", 1, 5, 10),
            line("b", 1, 5, 10),
        ]))
        .await;
        let start = tokio::time::Instant::now();

        cart.change_quantity(&id("a"), 1).unwrap();
        cart.delete_item(&id("b"));
        cart.shutdown().await;

        assert!(start.elapsed() < DEFAULT_SYNC_DEBOUNCE);
        let writes = service.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.contains(&Call::Update(id("a"), 2)));
        assert!(writes.contains(&Call::Remove(vec![id("b")])));
        assert_eq!(cart.sync_state(), (FlushState::Idle, FlushState::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_product_rejected() {
        let (cart, service, mut notices) =
            loaded(FakeCartService::with_lines(vec![line("a", 1, 5, 10)])).await;

        assert_eq!(
            cart.change_quantity(&id("nope"), 1),
            Err(QuantityRejection::UnknownItem)
        );
        assert!(notices.try_recv().is_ok());
        cart.settle().await;
        assert!(service.writes().is_empty());
    }
}
