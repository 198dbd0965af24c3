mod common;

use std::sync::Arc;

use common::{eventually, setup, start_2030};
use eventcast_delivery::{Severity, SmtpAccount, SmtpFallback};
use eventcast_orchestrator::{
    add_participant, broadcast, create_event, unsubscribe_with_token, AppContext, BroadcastInput,
    EventDraft, OrchestratorError, Runtime,
};
use eventcast_store::{NewSelector, NewSubscription, StoreGateway};

async fn has_n_schedules(store: &StoreGateway, prefix: &str, n: usize) -> bool {
    common::schedule_count(store, prefix).await == n
}

fn draft(org: Option<String>, tags: &[&str]) -> EventDraft {
    EventDraft {
        name: "Incident drill".to_string(),
        start_date: start_2030(),
        public: org.is_none(),
        organization_id: org,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn autosub_tags_enroll_only_within_the_event_scope() {
    let app = setup().await;

    let mut scope = app.store.scope().await.unwrap();
    let org_a = scope.insert_organization("org-a").await.unwrap();
    let org_b = scope.insert_organization("org-b").await.unwrap();
    let user_a = scope.insert_subscriber("a@example.com", true).await.unwrap();
    let user_b = scope.insert_subscriber("b@example.com", true).await.unwrap();
    scope.add_organization_member(&org_a, &user_a.id).await.unwrap();
    scope.add_organization_member(&org_b, &user_b.id).await.unwrap();
    let chan_a = scope
        .insert_channel(
            app.store.cipher(),
            Some(&user_a.id),
            None,
            "A pager",
            "ntfy://ntfy.sh/a-pager",
            Some("autosub:critical"),
            true,
        )
        .await
        .unwrap();
    scope
        .insert_channel(
            app.store.cipher(),
            Some(&user_b.id),
            None,
            "B pager",
            "ntfy://ntfy.sh/b-pager",
            Some("autosub:critical"),
            true,
        )
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let event = create_event(&app.runtime, draft(Some(org_a), &["critical"]))
        .await
        .unwrap();

    let bundles = app.store.subscribers_for_event(&event.id).await.unwrap();
    assert_eq!(bundles.len(), 1, "only org A's member is enrolled");
    let bundle = &bundles[0];
    assert_eq!(bundle.subscriber.id, user_a.id);
    assert!(bundle.subscription.auto_subscribed);
    assert_eq!(bundle.selectors.len(), 1);
    assert_eq!(bundle.selectors[0].channel_id.as_deref(), Some(chan_a.id.as_str()));
    // Default reminder preferences: one day and one hour before.
    assert_eq!(bundle.reminder_offsets, vec![3_600, 86_400]);

    // The orchestrator's initial pass schedules the enrolled reminders.
    let store = &app.store;
    let prefix = format!("event-{}-", event.id);
    eventually("autosub schedules", || has_n_schedules(store, &prefix, 2)).await;
}

#[tokio::test]
async fn org_owned_autosub_channels_enroll_every_member() {
    let app = setup().await;

    let mut scope = app.store.scope().await.unwrap();
    let org = scope.insert_organization("ops").await.unwrap();
    let alice = scope.insert_subscriber("alice@example.com", true).await.unwrap();
    let bob = scope.insert_subscriber("bob@example.com", true).await.unwrap();
    scope.add_organization_member(&org, &alice.id).await.unwrap();
    scope.add_organization_member(&org, &bob.id).await.unwrap();
    let feed = scope
        .insert_channel(
            app.store.cipher(),
            None,
            Some(&org),
            "Ops feed",
            "gotify://push.example.com/token",
            Some("autosub:oncall"),
            true,
        )
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let event = create_event(&app.runtime, draft(Some(org), &["oncall"]))
        .await
        .unwrap();

    let bundles = app.store.subscribers_for_event(&event.id).await.unwrap();
    assert_eq!(bundles.len(), 2);
    assert!(bundles.iter().all(|b| b.subscription.auto_subscribed));
    assert!(bundles
        .iter()
        .all(|b| b.selectors[0].channel_id.as_deref() == Some(feed.id.as_str())));
}

#[tokio::test]
async fn no_tags_means_no_auto_subscription() {
    let app = setup().await;

    let mut scope = app.store.scope().await.unwrap();
    let user = scope.insert_subscriber("a@example.com", true).await.unwrap();
    scope
        .insert_channel(
            app.store.cipher(),
            Some(&user.id),
            None,
            "Pager",
            "ntfy://ntfy.sh/pager",
            Some("autosub:critical"),
            true,
        )
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let event = create_event(&app.runtime, draft(None, &[])).await.unwrap();
    assert!(app.store.subscribers_for_event(&event.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_token_is_single_use_and_cleans_up() {
    let app = setup().await;
    let store = &app.store;

    let event = create_event(&app.runtime, draft(None, &[])).await.unwrap();
    let mut scope = app.store.scope().await.unwrap();
    let user = scope.insert_subscriber("ada@example.com", true).await.unwrap();
    let channel = scope
        .insert_channel(
            app.store.cipher(),
            Some(&user.id),
            None,
            "Phone",
            "ntfy://ntfy.sh/ada",
            None,
            true,
        )
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let added = add_participant(
        &app.runtime,
        &event.id,
        &user.id,
        vec![NewSelector::Channel(channel.id)],
        vec![3_600],
    )
    .await
    .unwrap();
    let prefix = format!("event-{}-sub-{}-", event.id, added.subscription_id);
    eventually("schedule created", || has_n_schedules(store, &prefix, 1)).await;

    let removed = unsubscribe_with_token(&app.runtime, &added.unsubscribe_token)
        .await
        .unwrap();
    assert_eq!(removed, added.subscription_id);

    assert!(app
        .store
        .subscription_by_id(&added.subscription_id)
        .await
        .unwrap()
        .is_none());
    eventually("schedules removed", || has_n_schedules(store, &prefix, 0)).await;

    // The token died with the subscription row.
    let again = unsubscribe_with_token(&app.runtime, &added.unsubscribe_token).await;
    assert!(matches!(again, Err(OrchestratorError::TokenInvalid)));

    let bogus = unsubscribe_with_token(&app.runtime, "not-a-token").await;
    assert!(matches!(bogus, Err(OrchestratorError::TokenInvalid)));
}

#[tokio::test]
async fn smtp_fallback_reaches_channel_less_subscribers() {
    let app = setup().await;

    // Rebuild the context with the service SMTP fallback configured.
    let ctx = Arc::new(
        AppContext::new(app.store.clone(), app.deliver.clone()).with_smtp_fallback(Some(
            SmtpFallback {
                host: "smtp.gmail.com".to_string(),
                port: 587,
                unverified: SmtpAccount {
                    user: "unverified@svc.example.com".to_string(),
                    app_password: "unverified-pass".to_string(),
                },
                verified: SmtpAccount {
                    user: "verified@svc.example.com".to_string(),
                    app_password: "verified-pass".to_string(),
                },
            },
        )),
    );
    let runtime = Runtime::new(ctx.clone());

    let event = create_event(&runtime, draft(None, &[])).await.unwrap();
    let mut scope = ctx.store.scope().await.unwrap();
    let user = scope.insert_subscriber("v@example.com", false).await.unwrap();
    scope
        .create_subscription(&event.id, &user.id, NewSubscription::default())
        .await
        .unwrap();
    scope.commit().await.unwrap();

    let outcome = broadcast(
        &ctx,
        &BroadcastInput {
            event_id: event.id.clone(),
            title: "Hello".to_string(),
            body: "World".to_string(),
            severity: Severity::Info,
            subscription_ids: None,
            selector_tag_filter: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.pending, 0);

    let calls = app.deliver.recorded();
    assert_eq!(calls.len(), 1);
    // A synthesized service-mail endpoint, not a stored channel.
    assert_eq!(calls[0].endpoints, vec![(None, "mailtos".to_string())]);
}
