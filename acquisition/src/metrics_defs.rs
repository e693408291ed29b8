use shared::metrics_defs::{MetricDef, MetricType};

pub const UPDATE_CHECK_CACHE_HIT: MetricDef = MetricDef {
    name: "update_check.cache.hit",
    metric_type: MetricType::Counter,
    description: "Update-check decisions served from the response cache",
};

pub const UPDATE_CHECK_CACHE_MISS: MetricDef = MetricDef {
    name: "update_check.cache.miss",
    metric_type: MetricType::Counter,
    description: "Update-check decisions computed from package history",
};

pub const CACHE_DEGRADED: MetricDef = MetricDef {
    name: "update_check.cache.degraded",
    metric_type: MetricType::Counter,
    description: "Cache reads converted to misses by a timeout or backend error",
};

pub const CACHE_POPULATE_FAILED: MetricDef = MetricDef {
    name: "update_check.cache.populate_failed",
    metric_type: MetricType::Counter,
    description: "Best-effort cache writes that failed after the response was sent",
};

pub const HEALTHCHECK_UNHEALTHY: MetricDef = MetricDef {
    name: "healthcheck.unhealthy",
    metric_type: MetricType::Counter,
    description: "Aggregate health checks that reported unhealthy",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPDATE_CHECK_CACHE_HIT,
    UPDATE_CHECK_CACHE_MISS,
    CACHE_DEGRADED,
    CACHE_POPULATE_FAILED,
    HEALTHCHECK_UNHEALTHY,
];
