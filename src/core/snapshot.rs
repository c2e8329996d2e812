/// Cluster status snapshot as returned by the backend's `/api/status`
///
/// The endpoint answers either with a bare array of host records or with an
/// object wrapping them (`nodes`, `haproxy_weights`, optional `ok`/`error`).
/// Both shapes decode into a `ClusterSnapshot`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::client::FetchError;
use crate::utils::{parse_float_prefix, parse_int_prefix, DELAY_METRIC};

/// A single metric as the backend reports it: usually a string, sometimes a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl MetricValue {
    /// Leading-float reading of the value, `None` when nothing numeric is there
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) if n.is_finite() => Some(*n),
            MetricValue::Text(s) => parse_float_prefix(s),
            _ => None,
        }
    }

    /// Leading-integer reading of the value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            MetricValue::Text(s) => parse_int_prefix(s),
            _ => None,
        }
    }

    /// Text shown for the value, `None` for null
    pub fn display(&self) -> Option<String> {
        match self {
            MetricValue::Null => None,
            MetricValue::Bool(b) => Some(b.to_string()),
            MetricValue::Number(n) => Some(format_plain_number(*n)),
            MetricValue::Text(s) => Some(s.clone()),
            MetricValue::Other(v) => Some(v.to_string()),
        }
    }

    /// Loose truthiness: empty strings, zero, null and false are false
    pub fn is_truthy(&self) -> bool {
        match self {
            MetricValue::Null => false,
            MetricValue::Bool(b) => *b,
            MetricValue::Number(n) => *n != 0.0 && !n.is_nan(),
            MetricValue::Text(s) => !s.is_empty(),
            MetricValue::Other(v) => !v.is_null(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        MetricValue::Number(n)
    }
}

fn format_plain_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One host record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostStatus {
    pub host: String,
    #[serde(default)]
    pub status: Option<BTreeMap<String, MetricValue>>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Configured weight; kept loose so one bad record cannot sink the poll
    #[serde(default)]
    pub weight: Option<MetricValue>,
}

impl HostStatus {
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.status.as_ref().and_then(|s| s.get(name))
    }

    /// Replication-delay reading, 0 when missing or not numeric
    pub fn delay_value(&self) -> f64 {
        coerce_metric(self.metric(DELAY_METRIC))
    }

    /// Node answered with a status map and no error
    pub fn is_up(&self) -> bool {
        self.error.is_none() && self.status.is_some()
    }

    pub fn need_more_slave(&self) -> bool {
        self.metric("need_more_slave")
            .map(MetricValue::is_truthy)
            .unwrap_or(false)
    }
}

/// Tolerant numeric reading: anything unusable is 0
pub fn coerce_metric(value: Option<&MetricValue>) -> f64 {
    value.and_then(MetricValue::as_f64).unwrap_or(0.0)
}

/// Result of one poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSnapshot {
    pub nodes: Vec<HostStatus>,
    /// backend name -> host -> weight, as reported
    pub haproxy_weights: BTreeMap<String, BTreeMap<String, MetricValue>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusBody {
    List(Vec<HostStatus>),
    Wrapped {
        #[serde(default)]
        ok: Option<bool>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        nodes: Option<Vec<HostStatus>>,
        #[serde(default)]
        haproxy_weights: Option<BTreeMap<String, BTreeMap<String, MetricValue>>>,
    },
}

impl ClusterSnapshot {
    /// Decode a `/api/status` body
    pub fn from_body(body: &str) -> Result<Self, FetchError> {
        let parsed: StatusBody =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        match parsed {
            StatusBody::List(nodes) => Ok(Self {
                nodes,
                haproxy_weights: BTreeMap::new(),
            }),
            StatusBody::Wrapped {
                ok,
                error,
                nodes,
                haproxy_weights,
            } => {
                if ok == Some(false) {
                    return Err(FetchError::Backend(
                        error.unwrap_or_else(|| "backend reported failure".to_string()),
                    ));
                }
                let nodes = nodes.ok_or_else(|| {
                    FetchError::Decode("response has no `nodes` field".to_string())
                })?;
                Ok(Self {
                    nodes,
                    haproxy_weights: haproxy_weights.unwrap_or_default(),
                })
            }
        }
    }

    pub fn node(&self, host: &str) -> Option<&HostStatus> {
        self.nodes.iter().find(|n| n.host == host)
    }

    /// Weight shown for a host: live HAProxy table first, then the record, then 1
    ///
    /// Entries that are not a non-negative integer are skipped, so a garbled
    /// live weight falls through to the record.
    pub fn effective_weight(&self, node: &HostStatus) -> u32 {
        let live = self
            .haproxy_weights
            .values()
            .filter_map(|servers| servers.get(&node.host))
            .find_map(|w| w.as_i64().filter(|w| *w >= 0));
        if let Some(w) = live {
            return clamp_weight(w);
        }

        node.weight
            .as_ref()
            .and_then(MetricValue::as_i64)
            .filter(|w| *w > 0)
            .or_else(|| {
                node.metric("haproxy_weight")
                    .and_then(MetricValue::as_i64)
                    .filter(|w| *w > 0)
            })
            .map(clamp_weight)
            .unwrap_or(1)
    }
}

fn clamp_weight(w: i64) -> u32 {
    w.clamp(0, u32::MAX as i64) as u32
}
