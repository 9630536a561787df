use prometheus::{
    Counter, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

// ============================================================================
// Metrics Module - Prometheus metrics for the POS session
// ============================================================================
//
// Tracks:
// - Order lifecycle (confirmed, completed, discarded, revenue)
// - Backend failures by operation
// - Change-feed traffic and refetch latency by table
// - Size of the active order collection
//
// Rendered with encode_text(); serving them over HTTP is up to the host.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Lifecycle Metrics
    pub orders_confirmed: IntCounterVec,
    pub orders_completed: IntCounterVec,
    pub orders_discarded: IntCounter,
    pub revenue_total: Counter,
    pub active_orders: IntGauge,

    // Backend Metrics
    pub backend_errors: IntCounterVec,

    // Change Feed Metrics
    pub change_events: IntCounterVec,
    pub refetch_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Lifecycle Metrics
        let orders_confirmed = IntCounterVec::new(
            Opts::new("pos_orders_confirmed_total", "Orders confirmed and sent to the kitchen"),
            &["order_type"],
        )?;
        registry.register(Box::new(orders_confirmed.clone()))?;

        let orders_completed = IntCounterVec::new(
            Opts::new("pos_orders_completed_total", "Orders paid and archived"),
            &["payment_method"],
        )?;
        registry.register(Box::new(orders_completed.clone()))?;

        let orders_discarded = IntCounter::new(
            "pos_orders_discarded_total",
            "Pending orders discarded before confirmation",
        )?;
        registry.register(Box::new(orders_discarded.clone()))?;

        let revenue_total = Counter::new("pos_revenue_total", "Sum of completed order totals")?;
        registry.register(Box::new(revenue_total.clone()))?;

        let active_orders = IntGauge::new("pos_active_orders", "Orders in the active collection")?;
        registry.register(Box::new(active_orders.clone()))?;

        // Backend Metrics
        let backend_errors = IntCounterVec::new(
            Opts::new("pos_backend_errors_total", "Failed backend calls"),
            &["operation"],
        )?;
        registry.register(Box::new(backend_errors.clone()))?;

        // Change Feed Metrics
        let change_events = IntCounterVec::new(
            Opts::new("pos_change_events_total", "Change notifications received"),
            &["table", "kind"],
        )?;
        registry.register(Box::new(change_events.clone()))?;

        let refetch_duration = HistogramVec::new(
            HistogramOpts::new("pos_refetch_duration_seconds", "Refetch-and-replace duration")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["table"],
        )?;
        registry.register(Box::new(refetch_duration.clone()))?;

        Ok(Self {
            registry,
            orders_confirmed,
            orders_completed,
            orders_discarded,
            revenue_total,
            active_orders,
            backend_errors,
            change_events,
            refetch_duration,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_confirmed(&self, order_type: &str) {
        self.orders_confirmed.with_label_values(&[order_type]).inc();
    }

    pub fn record_completed(&self, payment_method: &str, total: Decimal) {
        self.orders_completed.with_label_values(&[payment_method]).inc();
        if let Some(amount) = total.to_f64().filter(|amount| *amount > 0.0) {
            self.revenue_total.inc_by(amount);
        }
    }

    pub fn record_discarded(&self) {
        self.orders_discarded.inc();
    }

    pub fn set_active_orders(&self, count: usize) {
        self.active_orders.set(count as i64);
    }

    pub fn record_backend_error(&self, operation: &str) {
        self.backend_errors.with_label_values(&[operation]).inc();
    }

    pub fn record_change_event(&self, table: &str, kind: &str) {
        self.change_events.with_label_values(&[table, kind]).inc();
    }

    pub fn record_refetch(&self, table: &str, duration_secs: f64) {
        self.refetch_duration.with_label_values(&[table]).observe(duration_secs);
    }

    /// Prometheus text exposition format
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
