//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup; a second install fails.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::MetricsInstall(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants shared by the dispatch actor and tests.

/// Clients attached to a channel (counter).
pub const SSE_CONNECTIONS_TOTAL: &str = "sse_connections_total";
/// Clients detached from a channel (counter).
pub const SSE_DISCONNECTIONS_TOTAL: &str = "sse_disconnections_total";
/// Clients currently attached (gauge).
pub const SSE_CLIENTS_ACTIVE: &str = "sse_clients_active";
/// Channels currently existing (gauge).
pub const SSE_CHANNELS_ACTIVE: &str = "sse_channels_active";
/// Broadcast requests processed (counter).
pub const SSE_BROADCASTS_TOTAL: &str = "sse_broadcasts_total";
/// Per-client enqueues that succeeded (counter).
pub const SSE_MESSAGES_ENQUEUED_TOTAL: &str = "sse_messages_enqueued_total";
/// Per-client enqueues discarded on a full queue (counter).
pub const SSE_MESSAGES_DROPPED_TOTAL: &str = "sse_messages_dropped_total";
/// Clients disconnected for crossing the drop limit (counter).
pub const SSE_SLOW_CLIENT_EVICTIONS_TOTAL: &str = "sse_slow_client_evictions_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn recorded_counter_is_rendered() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(SSE_BROADCASTS_TOTAL).increment(3);
        });
        assert!(render(&handle).contains("sse_broadcasts_total 3"));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            SSE_CONNECTIONS_TOTAL,
            SSE_DISCONNECTIONS_TOTAL,
            SSE_CLIENTS_ACTIVE,
            SSE_CHANNELS_ACTIVE,
            SSE_BROADCASTS_TOTAL,
            SSE_MESSAGES_ENQUEUED_TOTAL,
            SSE_MESSAGES_DROPPED_TOTAL,
            SSE_SLOW_CLIENT_EVICTIONS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
