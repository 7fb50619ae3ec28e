//! Debounced cart sync observed on the wire.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use shopfront_client::{CartController, FlushState, Notice, Notifier, SyncChannel};
use shopfront_core::ProductId;
use shopfront_integration_tests::{TEST_DEBOUNCE, TestBackend, cart_body, cart_line};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_cart(backend: &TestBackend, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&backend.server)
        .await;
}

fn controller(backend: &TestBackend) -> (CartController, UnboundedReceiver<Notice>) {
    let (notifier, notices) = Notifier::channel();
    let cart = CartController::new(backend.client(), notifier, TEST_DEBOUNCE);
    (cart, notices)
}

#[tokio::test]
async fn test_rapid_increments_send_one_update() {
    let backend = TestBackend::start().await;
    mount_cart(&backend, cart_body([cart_line("a", 2, 5, 10.0)])).await;
    Mock::given(method("PUT"))
        .and(path("/api/cart/items/a"))
        .and(body_json(json!({"quantity": 5})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;

    let (cart, mut notices) = controller(&backend);
    cart.load().await;

    assert_eq!(cart.change_quantity(&ProductId::new("a"), 1), Ok(3));
    assert_eq!(cart.selected_total(), Decimal::from(30));
    cart.change_quantity(&ProductId::new("a"), 1).unwrap();
    cart.change_quantity(&ProductId::new("a"), 1).unwrap();
    assert_eq!(cart.sync_state().0, FlushState::Armed);

    cart.settle().await;
    assert!(notices.try_recv().is_err());

    let puts = backend
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .count();
    assert_eq!(puts, 1);
}

#[tokio::test]
async fn test_deletes_in_window_send_one_batch() {
    let backend = TestBackend::start().await;
    mount_cart(
        &backend,
        cart_body([cart_line("a", 1, 5, 10.0), cart_line("b", 2, 5, 4.0)]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/cart/remove"))
        .and(body_json(json!({"items": [
            {"productId": "a", "quantity": 1},
            {"productId": "b", "quantity": 2},
        ]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;

    let (cart, _notices) = controller(&backend);
    cart.load().await;

    assert!(cart.delete_item(&ProductId::new("a")));
    assert!(cart.delete_item(&ProductId::new("b")));
    assert!(cart.snapshot().items.is_empty());

    cart.settle().await;
}

#[tokio::test]
async fn test_failed_sync_keeps_local_quantity() {
    let backend = TestBackend::start().await;
    mount_cart(&backend, cart_body([cart_line("a", 1, 5, 10.0)])).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let (cart, mut notices) = controller(&backend);
    cart.load().await;
    cart.change_quantity(&ProductId::new("a"), 1).unwrap();
    cart.settle().await;

    assert_eq!(cart.snapshot().items[0].quantity, 2);
    match notices.try_recv().unwrap() {
        Notice::SyncFailed { channel, message } => {
            assert_eq!(channel, SyncChannel::Quantity);
            assert!(message.contains("db down"));
        }
        other => panic!("unexpected notice: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_token_on_load_asks_for_login() {
    let backend = TestBackend::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .expect(1)
        .mount(&backend.server)
        .await;

    let (cart, mut notices) = controller(&backend);
    let snapshot = cart.load().await;

    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.selected_total, Decimal::ZERO);
    assert!(matches!(
        notices.try_recv().unwrap(),
        Notice::AuthRequired { .. }
    ));
}

#[tokio::test]
async fn test_shutdown_flushes_pending_writes() {
    let backend = TestBackend::start().await;
    mount_cart(
        &backend,
        cart_body([cart_line("a", 1, 5, 10.0), cart_line("b", 1, 5, 10.0)]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/cart/items/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart/remove"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&backend.server)
        .await;

    let (notifier, _notices) = Notifier::channel();
    // Long enough that only shutdown can trigger the writes.
    let cart = CartController::new(backend.client(), notifier, TEST_DEBOUNCE * 100);
    cart.load().await;
    cart.change_quantity(&ProductId::new("a"), 1).unwrap();
    cart.delete_item(&ProductId::new("b"));

    tokio::time::timeout(TEST_DEBOUNCE * 20, cart.shutdown())
        .await
        .unwrap();
    assert_eq!(cart.sync_state(), (FlushState::Idle, FlushState::Idle));
}
