use futures::future::BoxFuture;
use tracing::error;

use stayflow_core::traits::AlertSink;

/// Alert sink that only logs. Stands in for a paging integration.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn raise(&self, code: &str, detail: &str) -> BoxFuture<'_, ()> {
        let code = code.to_string();
        let detail = detail.to_string();
        Box::pin(async move {
            error!(code = %code, detail = %detail, "Operational alert");
        })
    }
}
