mod common;

use chrono::{Duration, Utc};
use common::{schedule_count, setup, start_2030, test_event};
use eventcast_orchestrator::{schedule_id, ScheduleRegistry};
use eventcast_store::NewSubscription;

#[tokio::test]
async fn creates_one_schedule_per_future_offset() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());
    let start = start_2030();

    let created = registry
        .create_subscription_schedules("ev1", start, "s7", &[86_400, 3_600])
        .await
        .unwrap();
    assert_eq!(created, 2);

    let mut scope = app.store.scope().await.unwrap();
    assert!(scope
        .schedule_exists(&schedule_id("ev1", "s7", 86_400))
        .await
        .unwrap());
    let rows = scope.schedules_with_prefix("event-ev1-").await.unwrap();
    scope.commit().await.unwrap();

    let hour = rows
        .iter()
        .find(|r| r.offset_seconds == 3_600)
        .expect("hour reminder");
    assert_eq!(hour.fire_at, start - Duration::seconds(3_600));
    assert_eq!(hour.id, "event-ev1-sub-s7-reminder-3600s");
}

#[tokio::test]
async fn recreating_schedules_is_idempotent() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());
    let start = start_2030();

    registry
        .create_subscription_schedules("ev1", start, "s7", &[3_600])
        .await
        .unwrap();
    let second = registry
        .create_subscription_schedules("ev1", start, "s7", &[3_600])
        .await
        .unwrap();
    assert_eq!(second, 0, "existing id is a success, not a duplicate");
    assert_eq!(schedule_count(&app.store, "event-ev1-sub-s7-").await, 1);
}

#[tokio::test]
async fn past_offsets_are_silently_skipped() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());
    // Event starts in one minute: the day-before reminder is long past.
    let start = Utc::now() + Duration::seconds(60);

    let created = registry
        .create_subscription_schedules("ev1", start, "s7", &[86_400, 30])
        .await
        .unwrap();
    assert_eq!(created, 1);
    assert_eq!(schedule_count(&app.store, "event-ev1-").await, 1);
}

#[tokio::test]
async fn zero_offset_fires_at_start() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());
    let start = start_2030();

    let created = registry
        .create_subscription_schedules("ev1", start, "s7", &[0])
        .await
        .unwrap();
    assert_eq!(created, 1);

    let mut scope = app.store.scope().await.unwrap();
    let rows = scope
        .schedules_with_prefix("event-ev1-sub-s7-reminder-0s")
        .await
        .unwrap();
    scope.commit().await.unwrap();
    assert_eq!(rows[0].fire_at, start);
}

#[tokio::test]
async fn empty_offsets_create_nothing() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());

    let created = registry
        .create_subscription_schedules("ev1", start_2030(), "s7", &[])
        .await
        .unwrap();
    assert_eq!(created, 0);
    assert_eq!(schedule_count(&app.store, "event-ev1-").await, 0);
}

#[tokio::test]
async fn event_schedules_cover_every_subscription() {
    let app = setup().await;
    let registry = ScheduleRegistry::new(app.store.clone());
    let start = start_2030();

    let mut scope = app.store.scope().await.unwrap();
    scope.insert_event(&test_event("ev1", start)).await.unwrap();
    let ada = scope.insert_subscriber("ada@example.com", true).await.unwrap();
    let bob = scope.insert_subscriber("bob@example.com", true).await.unwrap();
    let ada_sub = scope
        .create_subscription(
            "ev1",
            &ada.id,
            NewSubscription {
                reminder_offsets: vec![3_600, 86_400],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    scope
        .create_subscription(
            "ev1",
            &bob.id,
            NewSubscription {
                reminder_offsets: vec![60],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let created = registry.create_event_schedules("ev1", start).await.unwrap();
    assert_eq!(created, 3);
    assert_eq!(
        schedule_count(&app.store, &format!("event-ev1-sub-{ada_sub}-")).await,
        2
    );

    // Per-subscription delete leaves the other subscription's schedules.
    registry
        .delete_subscription_schedules("ev1", &ada_sub)
        .await
        .unwrap();
    assert_eq!(schedule_count(&app.store, "event-ev1-").await, 1);

    // Event-level delete clears the rest; doing it twice is still fine.
    registry.delete_event_schedules("ev1").await.unwrap();
    registry.delete_event_schedules("ev1").await.unwrap();
    assert_eq!(schedule_count(&app.store, "event-ev1-").await, 0);
}
