//! SQLite adapter tests.
//!
//! Exercise the CAS completion transitions, the session-id idempotency
//! anchor, and the outbox bookkeeping against an in-memory database.

use rust_decimal_macros::dec;

use settlements_types::{
    Currency, Money, PaymentRepository, PaymentStatus, RepoError, ServicePayment,
    SubscriptionPayment,
    domain::events::{EVENT_PAYMENT_PROCESSED, EVENT_SERVICE_PAYMENT_COMPLETED},
};

use crate::sqlite::SqliteRepo;

async fn repo() -> SqliteRepo {
    SqliteRepo::new("sqlite::memory:").await.unwrap()
}

fn subscription_candidate(session_id: &str) -> SubscriptionPayment {
    SubscriptionPayment::new(
        7,
        2,
        Money::new(dec!(35.13), Currency::USD).unwrap(),
        session_id,
        Some("owner@example.com".to_string()),
        "Subscription to Standard (Snow Bear)",
    )
}

fn service_payment() -> ServicePayment {
    ServicePayment::new(
        41,
        12,
        3,
        9,
        dec!(100.00),
        dec!(15.0),
        Currency::USD,
        "Service payment for Work Order #WO-0041",
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan catalog
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_plan_catalog_is_seeded() {
    let repo = repo().await;

    let plans = repo.list_plans().await.unwrap();
    assert_eq!(plans.len(), 6);

    let standard = repo.find_plan(2).await.unwrap().unwrap();
    assert_eq!(standard.name, "Standard (Snow Bear)");
    assert_eq!(standard.price.amount(), dec!(35.13));
    assert_eq!(standard.max_units, Some(12));
    assert!(standard.max_clients.is_none());
    assert!(!standard.features.is_empty());

    assert!(repo.find_plan(99).await.unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription payment CAS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscription_completion_inserts_and_completes() {
    let repo = repo().await;

    let (payment, won) = repo
        .complete_subscription_payment(subscription_candidate("cs_1"), Some("pi_1"))
        .await
        .unwrap();

    assert!(won);
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.gateway_txn_ref.as_deref(), Some("pi_1"));
    assert!(payment.completed_at.is_some());

    let fetched = repo
        .find_subscription_payment_by_session("cs_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.id, payment.id);
}

#[tokio::test]
async fn test_subscription_completion_replay_has_one_winner() {
    let repo = repo().await;

    let (first, won_first) = repo
        .complete_subscription_payment(subscription_candidate("cs_2"), Some("pi_2"))
        .await
        .unwrap();
    // A replay arrives with its own freshly built candidate; the session id
    // must converge on the existing row.
    let (second, won_second) = repo
        .complete_subscription_payment(subscription_candidate("cs_2"), Some("pi_2b"))
        .await
        .unwrap();

    assert!(won_first);
    assert!(!won_second);
    assert_eq!(first.id, second.id);
    assert_eq!(second.gateway_txn_ref.as_deref(), Some("pi_2"));

    // Only the winner recorded an event.
    let events = repo.fetch_publishable_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EVENT_PAYMENT_PROCESSED);
}

#[tokio::test]
async fn test_concurrent_subscription_completions_single_winner() {
    let repo = std::sync::Arc::new(repo().await);

    let mut handles = Vec::new();
    for i in 0..4 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.complete_subscription_payment(
                subscription_candidate("cs_race"),
                Some(&format!("pi_{}", i)),
            )
            .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        let (_, won) = handle.await.unwrap().unwrap();
        if won {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one completion attempt may win");

    let events = repo.fetch_publishable_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Service payment CAS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_service_payment_round_trip() {
    let repo = repo().await;
    let payment = service_payment();

    repo.insert_service_payment(&payment).await.unwrap();

    let by_id = repo.find_service_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(by_id.total_amount, dec!(100.00));
    assert_eq!(by_id.platform_fee, dec!(15.00));
    assert_eq!(by_id.provider_amount, dec!(85.00));
    assert_eq!(by_id.status, PaymentStatus::Pending);

    let by_work_order = repo
        .find_service_payment_by_work_order(41)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_work_order.id, payment.id);
}

#[tokio::test]
async fn test_service_completion_is_single_shot() {
    let repo = repo().await;
    let payment = service_payment();
    repo.insert_service_payment(&payment).await.unwrap();

    let (first, won_first) = repo
        .complete_service_payment(payment.id, "pi_svc", "cs_svc")
        .await
        .unwrap();
    let (second, won_second) = repo
        .complete_service_payment(payment.id, "pi_other", "cs_other")
        .await
        .unwrap();

    assert!(won_first);
    assert!(!won_second);
    assert_eq!(first.status, PaymentStatus::Completed);
    assert_eq!(second.gateway_charge_ref.as_deref(), Some("pi_svc"));

    // The winner recorded both events atomically with the transition.
    let events = repo.fetch_publishable_events(10).await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![EVENT_PAYMENT_PROCESSED, EVENT_SERVICE_PAYMENT_COMPLETED]
    );
}

#[tokio::test]
async fn test_service_completion_unknown_id_is_not_found() {
    let repo = repo().await;
    let phantom = service_payment();

    let result = repo
        .complete_service_payment(phantom.id, "pi_x", "cs_x")
        .await;

    assert!(matches!(result, Err(RepoError::NotFound)));
    assert!(repo.fetch_publishable_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refund_transitions() {
    let repo = repo().await;
    let payment = service_payment();
    repo.insert_service_payment(&payment).await.unwrap();

    // Pending payments cannot be refunded.
    assert!(matches!(
        repo.mark_service_payment_refunded(payment.id).await,
        Err(RepoError::Conflict(_))
    ));

    repo.complete_service_payment(payment.id, "pi_svc", "cs_svc")
        .await
        .unwrap();

    let refunded = repo.mark_service_payment_refunded(payment.id).await.unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    // Refunded is terminal.
    assert!(matches!(
        repo.mark_service_payment_refunded(payment.id).await,
        Err(RepoError::Conflict(_))
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbox bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_published_events_are_not_refetched() {
    let repo = repo().await;
    repo.complete_subscription_payment(subscription_candidate("cs_3"), None)
        .await
        .unwrap();

    let events = repo.fetch_publishable_events(10).await.unwrap();
    assert_eq!(events.len(), 1);

    repo.mark_event_published(events[0].id).await.unwrap();

    assert!(repo.fetch_publishable_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_backs_off_and_parks_after_limit() {
    let repo = repo().await;
    repo.complete_subscription_payment(subscription_candidate("cs_4"), None)
        .await
        .unwrap();

    let event = repo.fetch_publishable_events(10).await.unwrap().remove(0);

    // First failure: the event backs off, so it is not immediately due.
    repo.record_publish_failure(event.id, "bus unreachable")
        .await
        .unwrap();
    assert!(repo.fetch_publishable_events(10).await.unwrap().is_empty());

    // Exhaust the attempt budget; the event parks as failed.
    repo.record_publish_failure(event.id, "bus unreachable")
        .await
        .unwrap();
    repo.record_publish_failure(event.id, "bus unreachable")
        .await
        .unwrap();
    assert!(repo.fetch_publishable_events(10).await.unwrap().is_empty());
}
