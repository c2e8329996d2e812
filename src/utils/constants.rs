/// Dashboard constants and the metric catalogue
///
/// The catalogue fixes which status variables the overview shows, in which
/// order, how each is formatted and when it turns yellow or red.

use serde::{Deserialize, Serialize};

/// Samples kept per host for the delay chart
pub const MAX_POINTS: usize = 1000;

/// Seconds between automatic polls
pub const DEFAULT_POLL_SECS: u32 = 30;

/// Status variable that drives the delay chart
pub const DELAY_METRIC: &str = "wsrep_local_recv_queue";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_BACKEND_NAME: &str = "galera_cluster_backend";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "5s";

/// Accepted HAProxy weight range
pub const MIN_WEIGHT: u32 = 0;
pub const MAX_WEIGHT: u32 = 256;

/// How a metric value is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Grouped number, up to 3 decimals
    Number,
    /// Bytes shown as GB
    Memory,
    /// Size string from provider options, verbatim
    Size,
    /// Verbatim
    Raw,
    /// Free text (state comments)
    Text,
    /// true/false indicator
    Flag,
}

/// Severity thresholds; a tier is reached when value >= threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danger: Option<f64>,
}

impl Thresholds {
    pub const NONE: Thresholds = Thresholds {
        warning: None,
        danger: None,
    };

    pub const fn warning(at: f64) -> Self {
        Thresholds {
            warning: Some(at),
            danger: None,
        }
    }
}

/// One overview row
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: MetricKind,
    pub thresholds: Thresholds,
}

const fn metric(key: &'static str, label: &'static str, kind: MetricKind) -> MetricDef {
    MetricDef {
        key,
        label,
        kind,
        thresholds: Thresholds::NONE,
    }
}

const fn queue(key: &'static str) -> MetricDef {
    MetricDef {
        key,
        label: key,
        kind: MetricKind::Number,
        thresholds: Thresholds::warning(10.0),
    }
}

pub const REPLICATION_GROUP: &[MetricDef] = &[
    queue("wsrep_local_send_queue"),
    queue("wsrep_local_recv_queue"),
    metric("wsrep_cert_deps_distance", "wsrep_cert_deps_distance", MetricKind::Number),
    metric("wsrep_last_committed", "wsrep_last_committed", MetricKind::Number),
    metric("wsrep_thread_count", "wsrep_thread_count", MetricKind::Number),
    metric("wsrep_applier_thread_count", "wsrep_applier_thread_count", MetricKind::Number),
    metric("wsrep_rollbacker_thread_count", "wsrep_rollbacker_thread_count", MetricKind::Number),
];

pub const FLOW_CONTROL_GROUP: &[MetricDef] = &[
    metric("wsrep_flow_control_sent", "wsrep_flow_control_sent", MetricKind::Number),
    metric("wsrep_flow_control_recv", "wsrep_flow_control_recv", MetricKind::Number),
    metric("wsrep_flow_control_paused", "wsrep_flow_control_paused", MetricKind::Raw),
    metric("wsrep_flow_control_active", "wsrep_flow_control_active", MetricKind::Flag),
    metric("gcache.page_size", "gcache.page_size", MetricKind::Size),
    metric("gcache.size", "gcache.size", MetricKind::Size),
    metric("gcs.fc_limit", "gcs.fc_limit", MetricKind::Number),
];

pub const THROUGHPUT_GROUP: &[MetricDef] = &[
    metric("queries_per_second", "Queries/sec", MetricKind::Number),
    metric("writes_per_second", "Writes/sec", MetricKind::Number),
    metric("reads_per_second", "Reads/sec", MetricKind::Number),
    metric("Com_lock_tables", "Lock Tables", MetricKind::Number),
    metric("wsrep_local_state_comment", "wsrep_local_state_comment", MetricKind::Text),
    metric("wsrep_cluster_status", "wsrep_cluster_status", MetricKind::Text),
];

pub const SERVER_GROUP: &[MetricDef] = &[
    metric("Threads_running", "Running Threads", MetricKind::Number),
    metric("Memory_used", "Memory Used", MetricKind::Memory),
    metric("Slave_connections", "Slave Connections", MetricKind::Number),
    metric("Slaves_connected", "Slaves Connected", MetricKind::Number),
];

/// Overview groups, left to right
pub const METRIC_GROUPS: &[&[MetricDef]] = &[
    REPLICATION_GROUP,
    FLOW_CONTROL_GROUP,
    THROUGHPUT_GROUP,
    SERVER_GROUP,
];

/// Look up a catalogue entry by status variable name
pub fn find_metric(key: &str) -> Option<&'static MetricDef> {
    METRIC_GROUPS
        .iter()
        .flat_map(|group| group.iter())
        .find(|def| def.key == key)
}
