use shared::metrics_defs::{MetricDef, MetricType};

pub const REPORTS_BUFFERED: MetricDef = MetricDef {
    name: "reports.buffered",
    metric_type: MetricType::Gauge,
    description: "Number of transactions waiting to be reported on the next flush",
};

pub const REPORTS_SENT: MetricDef = MetricDef {
    name: "reports.sent",
    metric_type: MetricType::Counter,
    description: "Number of report batches sent to the upstream. Tagged with result.",
};

pub const ALL_METRICS: &[MetricDef] = &[REPORTS_BUFFERED, REPORTS_SENT];
