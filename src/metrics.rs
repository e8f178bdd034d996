use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::prober::ConnectionPolicy;

/// Per-run metrics, rendered in the Prometheus text format on request.
pub struct Metrics {
    registry: Registry,
    ttfb: GaugeVec,
    transfer: GaugeVec,
    failures: IntCounterVec,
    // Only present when latency history is enabled
    history: Option<HistogramVec>,
}

impl Metrics {
    pub fn new(enable_latency_history: bool) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let ttfb = GaugeVec::new(
            Opts::new(
                "ttfb_milliseconds_current",
                "Time to first byte of the last measurement in milliseconds",
            ),
            &["target", "policy"],
        )?;
        registry.register(Box::new(ttfb.clone()))?;

        let transfer = GaugeVec::new(
            Opts::new(
                "ttfb_transfer_milliseconds_current",
                "Total transfer time of the last measurement in milliseconds",
            ),
            &["target", "policy"],
        )?;
        registry.register(Box::new(transfer.clone()))?;

        let failures = IntCounterVec::new(
            Opts::new("ttfb_failures_total", "Total number of failed measurements"),
            &["target", "kind"],
        )?;
        registry.register(Box::new(failures.clone()))?;

        let history = if enable_latency_history {
            let hist = HistogramVec::new(
                HistogramOpts::new("ttfb_milliseconds", "Time to first byte in milliseconds")
                    .buckets(vec![
                        0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
                        2500.0, 5000.0,
                    ]),
                &["target", "policy"],
            )?;
            registry.register(Box::new(hist.clone()))?;
            Some(hist)
        } else {
            None
        };

        Ok(Self {
            registry,
            ttfb,
            transfer,
            failures,
            history,
        })
    }

    pub fn observe(&self, target: &str, policy: ConnectionPolicy, ttfb_ms: f64, total_ms: f64) {
        let labels = [target, policy.as_str()];
        self.ttfb.with_label_values(&labels).set(ttfb_ms);
        self.transfer.with_label_values(&labels).set(total_ms);
        if let Some(hist) = &self.history {
            hist.with_label_values(&labels).observe(ttfb_ms);
        }
    }

    pub fn inc_failure(&self, target: &str, kind: &str) {
        self.failures.with_label_values(&[target, kind]).inc();
    }

    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
