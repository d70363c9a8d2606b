use prometheus::{Encoder, Histogram, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub settlements_total: IntCounterVec,
    pub open_requests: IntGauge,
    pub match_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Lifecycle transitions by stage"),
            &["stage"],
        )
        .expect("valid transitions_total metric");

        let settlements_total = IntCounterVec::new(
            Opts::new("settlements_total", "Wallet settlements by kind"),
            &["kind"],
        )
        .expect("valid settlements_total metric");

        let open_requests = IntGauge::new("open_requests", "Delivery requests awaiting a traveler")
            .expect("valid open_requests metric");

        let match_latency_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "match_latency_seconds",
            "Latency of match queries in seconds",
        ))
        .expect("valid match_latency_seconds metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(settlements_total.clone()))
            .expect("register settlements_total");
        registry
            .register(Box::new(open_requests.clone()))
            .expect("register open_requests");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");

        Self {
            registry,
            transitions_total,
            settlements_total,
            open_requests,
            match_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
