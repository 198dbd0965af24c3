//! The delivery seam between activities and the dispatcher.
//!
//! Activities call through [`Deliver`] so tests can substitute a recording
//! implementation; production uses [`DispatchDriver`], which builds a fresh
//! dispatcher per invocation and never shares state across calls.

use async_trait::async_trait;

use crate::dispatcher::{DispatchReport, Dispatcher, Endpoint};
use crate::severity::Severity;

#[async_trait]
pub trait Deliver: Send + Sync {
    /// Fan one notification out to the given endpoints. Implementations
    /// report per-endpoint outcomes instead of raising; a catastrophic
    /// failure is expressed as a report with every endpoint failed.
    async fn dispatch(
        &self,
        endpoints: &[Endpoint],
        title: &str,
        body: &str,
        severity: Severity,
    ) -> DispatchReport;
}

#[derive(Debug, Default, Clone)]
pub struct DispatchDriver;

#[async_trait]
impl Deliver for DispatchDriver {
    async fn dispatch(
        &self,
        endpoints: &[Endpoint],
        title: &str,
        body: &str,
        severity: Severity,
    ) -> DispatchReport {
        let mut dispatcher = Dispatcher::new();
        for endpoint in endpoints {
            dispatcher.add(&endpoint.url);
        }

        let report = dispatcher.notify(title, body, severity).await;
        tracing::info!(
            total = report.total,
            success = report.success,
            failed = report.failed,
            severity = %severity,
            "dispatched notification"
        );
        report
    }
}
