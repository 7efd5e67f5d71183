use crate::{Database, UsageStore};
use commentquick_core::{CoreError, QuotaError};
use std::env;

async fn setup_store(ceiling: i64) -> UsageStore {
    let db_path = env::temp_dir().join(format!("test_commentquick_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    UsageStore::new(&db, ceiling)
}

#[tokio::test]
async fn test_first_reservation_creates_counter() {
    let store = setup_store(100).await;

    let usage = store.usage("user-a").await.unwrap();
    assert_eq!(usage.used, 0);
    assert_eq!(usage.remaining(), 100);

    store.reserve("user-a", 5).await.unwrap();
    let usage = store.usage("user-a").await.unwrap();
    assert_eq!(usage.used, 5);
    assert_eq!(usage.remaining(), 95);
}

#[tokio::test]
async fn test_rejection_at_ceiling_leaves_counter_untouched() {
    let store = setup_store(100).await;
    store.reserve("user-a", 98).await.unwrap();

    let result = store.reserve("user-a", 3).await;
    assert!(matches!(
        result,
        Err(CoreError::Quota(QuotaError::LimitExceeded {
            used: 98,
            requested: 3,
            limit: 100,
        }))
    ));
    assert_eq!(store.usage("user-a").await.unwrap().used, 98);

    // A smaller request that still fits lands exactly on the ceiling
    store.reserve("user-a", 2).await.unwrap();
    assert_eq!(store.usage("user-a").await.unwrap().used, 100);

    let result = store.reserve("user-a", 1).await;
    assert!(matches!(result, Err(CoreError::Quota(_))));
}

#[tokio::test]
async fn test_commit_returns_undelivered_remainder() {
    let store = setup_store(100).await;
    store.reserve("user-a", 3).await.unwrap();
    store.commit("user-a", 3, 1).await.unwrap();
    assert_eq!(store.usage("user-a").await.unwrap().used, 1);

    store.reserve("user-a", 3).await.unwrap();
    store.commit("user-a", 3, 3).await.unwrap();
    assert_eq!(store.usage("user-a").await.unwrap().used, 4);
}

#[tokio::test]
async fn test_release_rolls_back_a_failed_generation() {
    let store = setup_store(100).await;
    store.reserve("user-a", 5).await.unwrap();
    store.reserve("user-a", 4).await.unwrap();
    store.release("user-a", 4).await.unwrap();
    assert_eq!(store.usage("user-a").await.unwrap().used, 5);
}

#[tokio::test]
async fn test_counter_tracks_sum_of_delivered_replies() {
    let store = setup_store(100).await;
    let deliveries = [5, 3, 2, 1];
    for delivered in deliveries {
        store.reserve("user-a", delivered).await.unwrap();
        store
            .commit("user-a", delivered, delivered)
            .await
            .unwrap();
    }
    let expected: i64 = deliveries.iter().sum();
    assert_eq!(store.usage("user-a").await.unwrap().used, expected);
}

#[tokio::test]
async fn test_identities_do_not_share_counters() {
    let store = setup_store(100).await;
    store.reserve("user-a", 10).await.unwrap();
    assert_eq!(store.usage("user-b").await.unwrap().used, 0);
}

#[tokio::test]
async fn test_concurrent_reservations_cannot_jointly_pass_ceiling() {
    let store = setup_store(10).await;

    let first = store.reserve("user-a", 6);
    let second = store.reserve("user-a", 6);
    let (first, second) = tokio::join!(first, second);

    // Exactly one of the two racing requests fits under the ceiling
    assert!(first.is_ok() ^ second.is_ok());
    assert_eq!(store.usage("user-a").await.unwrap().used, 6);
}

#[tokio::test]
async fn test_zero_reservation_is_invalid() {
    let store = setup_store(100).await;
    assert!(matches!(
        store.reserve("user-a", 0).await,
        Err(CoreError::InvalidInput { .. })
    ));
}
