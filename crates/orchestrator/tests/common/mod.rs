//! Shared helpers for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chrono::{DateTime, TimeZone, Utc};
use eventcast_delivery::{Deliver, DispatchReport, Endpoint, EndpointResult, Severity};
use eventcast_orchestrator::{AppContext, Runtime};
use eventcast_store::{Event, StoreGateway, UrlCipher};
use sqlx::sqlite::SqlitePoolOptions;

/// A recorded `dispatch` call: message plus the channel ids and schemes of
/// its endpoints (delivery URLs themselves stay sealed).
#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub endpoints: Vec<(Option<String>, String)>,
}

/// Test double for the delivery seam. Succeeds unless `fail_all` is set.
#[derive(Default)]
pub struct RecordingDeliver {
    pub calls: Mutex<Vec<RecordedDispatch>>,
    pub fail_all: std::sync::atomic::AtomicBool,
}

impl RecordingDeliver {
    pub fn recorded(&self) -> Vec<RecordedDispatch> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl Deliver for RecordingDeliver {
    async fn dispatch(
        &self,
        endpoints: &[Endpoint],
        title: &str,
        body: &str,
        severity: Severity,
    ) -> DispatchReport {
        self.calls.lock().unwrap().push(RecordedDispatch {
            title: title.to_string(),
            body: body.to_string(),
            severity,
            endpoints: endpoints
                .iter()
                .map(|e| (e.channel_id.clone(), e.url.scheme().to_string()))
                .collect(),
        });

        let fail = self.fail_all.load(std::sync::atomic::Ordering::SeqCst);
        DispatchReport {
            total: endpoints.len(),
            success: if fail { 0 } else { endpoints.len() },
            failed: if fail { endpoints.len() } else { 0 },
            per_endpoint: endpoints
                .iter()
                .map(|e| EndpointResult {
                    scheme: e.url.scheme().to_string(),
                    ok: !fail,
                    error: fail.then(|| "refused".to_string()),
                })
                .collect(),
        }
    }
}

pub struct TestApp {
    pub runtime: Runtime,
    pub ctx: Arc<AppContext>,
    pub store: StoreGateway,
    pub deliver: Arc<RecordingDeliver>,
}

pub async fn setup() -> TestApp {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let cipher = UrlCipher::from_base64_key(&B64.encode([3u8; 32])).unwrap();
    let store = StoreGateway::new(pool, cipher);
    store.migrate().await.unwrap();

    let deliver = Arc::new(RecordingDeliver::default());
    let ctx = Arc::new(AppContext::new(store.clone(), deliver.clone()));
    let runtime = Runtime::new(ctx.clone());

    TestApp {
        runtime,
        ctx,
        store,
        deliver,
    }
}

pub fn start_2030() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap()
}

pub fn test_event(id: &str, start: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        name: "Launch party".to_string(),
        start_date: start,
        end_date: None,
        description: None,
        location: None,
        public: true,
        organizer_id: None,
        organization_id: None,
        workflow_id: format!("event-orchestrator-{id}"),
    }
}

/// Poll until `check` passes; orchestrators handle signals asynchronously.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

pub async fn schedule_count(store: &StoreGateway, prefix: &str) -> usize {
    let mut scope = store.scope().await.unwrap();
    let rows = scope.schedules_with_prefix(prefix).await.unwrap();
    scope.commit().await.unwrap();
    rows.len()
}
