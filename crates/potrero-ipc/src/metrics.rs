//! ---
//! ipc_section: "02-messaging-ipc-data-model"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Prometheus counters for messaging activity."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};

/// Prometheus metric handles for IPC activity. Optional at call sites;
/// nodes that do not export metrics simply skip construction.
pub struct IpcMetricsExporter {
    published: IntCounter,
    delivered: IntCounter,
    decode_failures: IntCounter,
    rpc_timeouts: IntCounter,
}

impl IpcMetricsExporter {
    /// Register IPC metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let published = IntCounter::with_opts(Opts::new(
            "ipc_messages_published_total",
            "Messages published to the broker",
        ))?;
        let delivered = IntCounter::with_opts(Opts::new(
            "ipc_messages_delivered_total",
            "Decoded messages handed to subscription handlers",
        ))?;
        let decode_failures = IntCounter::with_opts(Opts::new(
            "ipc_decode_failures_total",
            "Payloads dropped because they failed schema decode",
        ))?;
        let rpc_timeouts = IntCounter::with_opts(Opts::new(
            "ipc_rpc_timeouts_total",
            "RPC calls that expired without a matching reply",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(delivered.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(rpc_timeouts.clone()))?;

        Ok(Self {
            published,
            delivered,
            decode_failures,
            rpc_timeouts,
        })
    }

    /// Record a published message.
    pub fn observe_published(&self) {
        self.published.inc();
    }

    /// Record a delivered message.
    pub fn observe_delivered(&self) {
        self.delivered.inc();
    }

    /// Record a payload dropped at decode.
    pub fn observe_decode_failure(&self) {
        self.decode_failures.inc();
    }

    /// Record an expired RPC call.
    pub fn observe_rpc_timeout(&self) {
        self.rpc_timeouts.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_records_counts() {
        let registry = Registry::new();
        let metrics = IpcMetricsExporter::register(&registry).expect("register metrics");
        metrics.observe_published();
        metrics.observe_delivered();
        metrics.observe_decode_failure();
        metrics.observe_rpc_timeout();

        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "ipc_messages_published_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "ipc_rpc_timeouts_total"));
    }
}
