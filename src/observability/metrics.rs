use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub orders_in_queue: IntGaugeVec,
    pub assignment_latency_seconds: HistogramVec,
    pub personnel_utilization: GaugeVec,
    pub packing_updates_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Order status transitions by outcome"),
            &["outcome"],
        )
        .expect("valid transitions_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Personnel assignments by role and outcome"),
            &["role", "outcome"],
        )
        .expect("valid assignments_total metric");

        let orders_in_queue = IntGaugeVec::new(
            Opts::new("orders_in_queue", "Orders awaiting assignment per role"),
            &["role"],
        )
        .expect("valid orders_in_queue metric");

        let assignment_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of assignment attempts in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let personnel_utilization = GaugeVec::new(
            Opts::new("personnel_utilization", "Personnel utilization ratio [0..1]"),
            &["personnel_id"],
        )
        .expect("valid personnel_utilization metric");

        let packing_updates_total = IntCounterVec::new(
            Opts::new("packing_updates_total", "Packing progress updates by outcome"),
            &["outcome"],
        )
        .expect("valid packing_updates_total metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(orders_in_queue.clone()))
            .expect("register orders_in_queue");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(personnel_utilization.clone()))
            .expect("register personnel_utilization");
        registry
            .register(Box::new(packing_updates_total.clone()))
            .expect("register packing_updates_total");

        Self {
            registry,
            transitions_total,
            assignments_total,
            orders_in_queue,
            assignment_latency_seconds,
            personnel_utilization,
            packing_updates_total,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
