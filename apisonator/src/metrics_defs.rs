use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Number of authorization requests handled. Tagged with endpoint, status.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Upstream call duration in seconds. Tagged with endpoint.",
};

pub const FLUSHES: MetricDef = MetricDef {
    name: "flushes",
    metric_type: MetricType::Counter,
    description: "Number of periodic flushes of the upstream client. Tagged with result.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, UPSTREAM_DURATION, FLUSHES];
