//! Settlement semantics: at-most-once effects, the success-page fallback,
//! and ledger fan-out.

use axum::{body::Body, http::Request};
use tower::ServiceExt;

mod common;
use common::*;

use tillbook::settlement::settle_order;

fn success_event(order_no: &str) -> PaymentEvent {
    PaymentEvent {
        event_type: "checkout.completed".to_string(),
        correlation_token: Some(order_no.to_string()),
        payer_email: Some("buyer@example.com".to_string()),
        amount: Some(2999),
        raw: serde_json::json!({ "eventType": "checkout.completed" }),
    }
}

#[tokio::test]
async fn test_settle_is_idempotent() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "buyer@example.com", 2999)
    };
    let event = success_event(&order.order_no);

    let first = settle_order(&state, &order, &event).await.unwrap();
    assert!(first.transitioned);
    assert!(first.credits_granted);

    let second = settle_order(&state, &order, &event).await.unwrap();
    assert!(!second.transitioned);
    assert!(!second.credits_granted);

    let conn = state.db.get().unwrap();
    assert_eq!(
        queries::count_credit_grants(&conn, &order.order_no).unwrap(),
        1
    );
}

/// Webhook and success page racing on the same order: exactly one wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_settlement_at_most_once() {
    let (state, db_path) = create_file_backed_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "buyer@example.com", 2999)
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let event = success_event(&order.order_no);
            settle_order(&state, &order, &event).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().transitioned {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let conn = state.db.get().unwrap();
    assert_eq!(
        queries::count_credit_grants(&conn, &order.order_no).unwrap(),
        1
    );
    let settled = queries::get_order_by_no(&conn, &order.order_no)
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, OrderStatus::Paid);

    drop(conn);
    drop(state);
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn test_success_page_settles_and_redirects() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "buyer@example.com", 2999)
    };

    let request = Request::builder()
        .method("GET")
        .uri(format!("/pay/success/en/{}", order.order_no))
        .body(Body::empty())
        .unwrap();
    let response = public_app(state.clone()).oneshot(request).await.unwrap();

    assert_eq!(
        response.status(),
        axum::http::StatusCode::TEMPORARY_REDIRECT
    );
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://shop.example.com/en/pay/success"));
    assert!(location.contains(&order.order_no));

    let conn = state.db.get().unwrap();
    let settled = queries::get_order_by_no(&conn, &order.order_no)
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, OrderStatus::Paid);
    assert_eq!(
        queries::count_credit_grants(&conn, &order.order_no).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_success_page_after_webhook_is_noop() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "buyer@example.com", 2999)
    };
    settle_order(&state, &order, &success_event(&order.order_no))
        .await
        .unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(format!("/pay/success/en/{}", order.order_no))
        .body(Body::empty())
        .unwrap();
    let response = public_app(state.clone()).oneshot(request).await.unwrap();

    // Buyer still lands on the success page
    assert_eq!(
        response.status(),
        axum::http::StatusCode::TEMPORARY_REDIRECT
    );

    let conn = state.db.get().unwrap();
    assert_eq!(
        queries::count_credit_grants(&conn, &order.order_no).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_success_page_unknown_order_redirects_to_failure() {
    let state = create_test_app_state();

    let request = Request::builder()
        .method("GET")
        .uri("/pay/success/de/tb_ord_doesnotexist")
        .body(Body::empty())
        .unwrap();
    let response = public_app(state).oneshot(request).await.unwrap();

    assert_eq!(
        response.status(),
        axum::http::StatusCode::TEMPORARY_REDIRECT
    );
    let location = response.headers().get("location").unwrap().to_str().unwrap();
    assert_eq!(location, "https://shop.example.com/de/pay/failure");
}

#[tokio::test]
async fn test_commission_credited_for_referred_order() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order_with_referrer(&conn, "buyer@example.com", 2999, Some("aff_42"))
    };

    let outcome = settle_order(&state, &order, &success_event(&order.order_no))
        .await
        .unwrap();
    assert!(outcome.commission_credited);

    let conn = state.db.get().unwrap();
    let commission = queries::get_commission(&conn, &order.order_no)
        .unwrap()
        .unwrap();
    assert_eq!(commission.referrer_id, "aff_42");
    // 2000 bps of 2999, floored
    assert_eq!(commission.amount, 599);
}

#[tokio::test]
async fn test_no_commission_without_referrer() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "buyer@example.com", 2999)
    };

    let outcome = settle_order(&state, &order, &success_event(&order.order_no))
        .await
        .unwrap();
    assert!(!outcome.commission_credited);

    let conn = state.db.get().unwrap();
    assert_eq!(
        queries::count_commissions(&conn, &order.order_no).unwrap(),
        0
    );
}

#[tokio::test]
async fn test_paid_email_recorded_from_event() {
    let state = create_test_app_state();
    let order = {
        let conn = state.db.get().unwrap();
        create_test_order(&conn, "account@example.com", 2999)
    };

    let mut event = success_event(&order.order_no);
    event.payer_email = Some("card-holder@example.com".to_string());
    settle_order(&state, &order, &event).await.unwrap();

    let conn = state.db.get().unwrap();
    let settled = queries::get_order_by_no(&conn, &order.order_no)
        .unwrap()
        .unwrap();
    // The account email is untouched; the payer email is recorded alongside
    assert_eq!(settled.user_email, "account@example.com");
    assert_eq!(
        settled.paid_email.as_deref(),
        Some("card-holder@example.com")
    );
}
