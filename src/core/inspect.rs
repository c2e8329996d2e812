/// Read-only node views served by the dashboard backend: slow queries, InnoDB
/// transactions, the process list, server logs and node variables
///
/// Every endpoint answers with a JSON object carrying `ok` and, on failure,
/// `error`. Failures often come with a 404/500 status and a JSON body, so the
/// body is read before the status code is judged.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::core::client::FetchError;
use crate::core::snapshot::MetricValue;
use crate::utils::{parse_float_prefix, Severity};

/// Default row counts, matching the backend's own defaults
pub const DEFAULT_SLOW_QUERY_LIMIT: u32 = 100;
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 50;
pub const DEFAULT_LOG_LINES: u32 = 100;

/// Longest query text shown in a table cell
pub const QUERY_PREVIEW_CHARS: usize = 100;

/// One row of `mysql.slow_log`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlowQuery {
    pub start_time: Option<String>,
    pub user_host: Option<String>,
    /// `H:MM:SS.ffffff` as the server formats it
    pub query_time: Option<MetricValue>,
    pub query_time_seconds: Option<f64>,
    pub lock_time: Option<MetricValue>,
    pub lock_time_seconds: Option<f64>,
    pub rows_sent: Option<MetricValue>,
    pub rows_examined: Option<MetricValue>,
    pub db: Option<String>,
    pub sql_text: Option<String>,
}

impl SlowQuery {
    pub fn query_seconds(&self) -> Option<f64> {
        self.query_time_seconds
            .or_else(|| self.query_time.as_ref().and_then(clock_seconds))
    }

    pub fn lock_seconds(&self) -> Option<f64> {
        self.lock_time_seconds
            .or_else(|| self.lock_time.as_ref().and_then(clock_seconds))
    }

    /// Under a second is fine, under five is worth a look, the rest is slow
    pub fn severity(&self) -> Severity {
        match self.query_seconds() {
            Some(s) if s >= 5.0 => Severity::Danger,
            Some(s) if s >= 1.0 => Severity::Warning,
            _ => Severity::Normal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlowQueryReport {
    pub host: String,
    pub slow_queries: Vec<SlowQuery>,
}

/// One row of `information_schema.innodb_trx`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub trx_id: Option<MetricValue>,
    pub trx_state: Option<String>,
    pub trx_started: Option<String>,
    pub trx_wait_started: Option<String>,
    pub trx_mysql_thread_id: Option<MetricValue>,
    pub trx_query: Option<String>,
    pub trx_operation_state: Option<String>,
    pub trx_rows_locked: Option<MetricValue>,
    pub trx_rows_modified: Option<MetricValue>,
    pub trx_isolation_level: Option<String>,
}

impl Transaction {
    pub fn is_waiting(&self) -> bool {
        self.trx_wait_started.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InnodbLock {
    pub lock_id: Option<MetricValue>,
    pub lock_trx_id: Option<MetricValue>,
    pub lock_mode: Option<String>,
    pub lock_type: Option<String>,
    pub lock_table: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LockWait {
    pub requesting_trx_id: Option<MetricValue>,
    pub blocking_trx_id: Option<MetricValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionReport {
    pub host: String,
    pub transactions: Vec<Transaction>,
    pub locks: Vec<InnodbLock>,
    pub lock_waits: Vec<LockWait>,
    pub innodb_status: Option<String>,
}

/// One row of `information_schema.processlist`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct Process {
    pub id: Option<MetricValue>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub db: Option<String>,
    pub command: Option<String>,
    pub time: Option<MetricValue>,
    pub state: Option<String>,
    pub info: Option<String>,
}

impl Process {
    pub fn elapsed_secs(&self) -> u64 {
        self.time
            .as_ref()
            .and_then(MetricValue::as_i64)
            .map(|t| t.max(0) as u64)
            .unwrap_or(0)
    }

    /// Over a minute is worth a look, over five is long
    pub fn severity(&self) -> Severity {
        match self.elapsed_secs() {
            t if t > 300 => Severity::Danger,
            t if t > 60 => Severity::Warning,
            _ => Severity::Normal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
struct ProcessReport {
    processes: Vec<Process>,
}

/// A log file the backend can tail
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogFile {
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Seconds since the epoch
    pub modified: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
struct LogList {
    logs: Vec<LogFile>,
}

/// Last lines of one log file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogTail {
    pub file: String,
    pub name: String,
    pub size: u64,
    pub modified: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Plain,
}

/// Level of a raw log line, by keyword
pub fn log_level(line: &str) -> LogLevel {
    let lower = line.to_lowercase();
    if lower.contains("error") {
        LogLevel::Error
    } else if lower.contains("warn") {
        LogLevel::Warning
    } else if lower.contains("info") || lower.contains("notice") {
        LogLevel::Info
    } else {
        LogLevel::Plain
    }
}

/// Server variables and status counters of one node
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub config: BTreeMap<String, MetricValue>,
    pub status: BTreeMap<String, MetricValue>,
}

/// One line of the node variable table
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRow {
    pub name: String,
    pub category: &'static str,
    pub value: String,
}

impl NodeConfig {
    /// Variables and status counters merged, status winning on a name clash,
    /// sorted by category then name
    pub fn rows(&self, category: Option<&str>) -> Vec<ConfigRow> {
        let mut merged: BTreeMap<&str, &MetricValue> = BTreeMap::new();
        for (name, value) in self.config.iter().chain(self.status.iter()) {
            merged.insert(name.as_str(), value);
        }

        let mut rows: Vec<ConfigRow> = merged
            .into_iter()
            .map(|(name, value)| ConfigRow {
                name: name.to_string(),
                category: variable_category(name),
                value: value.display().unwrap_or_else(|| "-".to_string()),
            })
            .filter(|row| category.map_or(true, |c| c.eq_ignore_ascii_case(row.category)))
            .collect();

        rows.sort_by(|a, b| a.category.cmp(b.category).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}

/// Group a server variable belongs to in the node variable table
pub fn variable_category(name: &str) -> &'static str {
    match name {
        "wsrep_cluster_size" | "wsrep_cluster_status" | "wsrep_connected" | "wsrep_ready"
        | "wsrep_provider_options" | "wsrep_provider_version" | "wsrep_cluster_name"
        | "wsrep_node_name" | "wsrep_sst_method" | "wsrep_local_recv_queue"
        | "wsrep_local_send_queue" | "wsrep_evs_delayed" | "wsrep_flow_control_paused"
        | "wsrep_flow_control_sent" | "wsrep_flow_control_recv" | "wsrep_cert_deps_distance"
        | "wsrep_apply_window" => "galera",
        "innodb_buffer_pool_size" | "innodb_log_file_size" | "max_connections"
        | "thread_cache_size" | "query_cache_size" | "query_cache_type" | "tmp_table_size"
        | "max_heap_table_size" => "performance",
        "slow_query_log" | "long_query_time" | "log_output" | "general_log"
        | "general_log_file" | "slow_query_log_file" => "logging",
        "binlog_format" | "sync_binlog" | "expire_logs_days" => "replication",
        "innodb_flush_log_at_trx_commit" | "innodb_flush_method" | "innodb_file_per_table"
        | "innodb_io_capacity" => "innodb",
        _ => "other",
    }
}

/// Seconds in a `H:MM:SS[.ffffff]` duration, or a plain number of seconds
fn clock_seconds(value: &MetricValue) -> Option<f64> {
    let text = match value {
        MetricValue::Text(s) => s.trim(),
        other => return other.as_f64(),
    };

    let parts: Vec<&str> = text.split(':').collect();
    match parts.as_slice() {
        [h, m, s] => {
            let h: f64 = h.parse().ok()?;
            let m: f64 = m.parse().ok()?;
            let s: f64 = s.parse().ok()?;
            Some(h * 3600.0 + m * 60.0 + s)
        }
        _ => parse_float_prefix(text),
    }
}

/// Decode an inspection reply; `{ok: false, error}` wins over the HTTP status
fn decode_reply<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, FetchError> {
    let success = (200..300).contains(&status);
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !success => return Err(FetchError::Status(status)),
        Err(e) => return Err(FetchError::Decode(e.to_string())),
    };

    let refused = value.get("ok").and_then(Value::as_bool) == Some(false);
    if refused || !success {
        let error = value.get("error").and_then(Value::as_str);
        return match (error, value.get("help").and_then(Value::as_str)) {
            (Some(error), Some(help)) => Err(FetchError::Backend(format!("{} {}", error, help))),
            (Some(error), None) => Err(FetchError::Backend(error.to_string())),
            (None, _) if !success => Err(FetchError::Status(status)),
            (None, _) => Err(FetchError::Backend("backend reported failure".to_string())),
        };
    }

    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Client for the backend's read-only inspection endpoints
pub struct InspectClient {
    client: Client,
    base_url: String,
}

impl InspectClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "inspection request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        decode_reply(status, &body)
    }

    /// Newest entries of the node's slow query log
    pub async fn slow_queries(&self, host: &str, limit: u32) -> Result<SlowQueryReport, FetchError> {
        self.get(
            "/api/slow_queries",
            &[("host", host.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    /// Open InnoDB transactions with their locks and lock waits
    pub async fn transactions(&self, host: &str, limit: u32) -> Result<TransactionReport, FetchError> {
        self.get(
            "/api/transactions",
            &[("host", host.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn processes(&self, host: &str) -> Result<Vec<Process>, FetchError> {
        let report: ProcessReport = self
            .get("/api/process_list", &[("host", host.to_string())])
            .await?;
        Ok(report.processes)
    }

    /// Log files on the backend host, newest first
    pub async fn available_logs(&self) -> Result<Vec<LogFile>, FetchError> {
        let list: LogList = self.get("/api/available_logs", &[]).await?;
        Ok(list.logs)
    }

    pub async fn server_log(&self, path: &str, lines: u32) -> Result<LogTail, FetchError> {
        self.get(
            "/api/server_logs",
            &[("file", path.to_string()), ("lines", lines.to_string())],
        )
        .await
    }

    pub async fn node_config(&self, host: &str) -> Result<NodeConfig, FetchError> {
        self.get("/api/get_config", &[("host", host.to_string())]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_query_reply() {
        let body = r#"{
            "ok": true,
            "host": "db1",
            "slow_queries": [
                {"start_time": "2025-01-01T10:00:00", "query_time": "0:00:07.250000",
                 "query_time_seconds": 7.25, "lock_time": "0:00:00.000100",
                 "rows_examined": 120000, "db": "shop", "sql_text": "SELECT * FROM orders"},
                {"start_time": "2025-01-01T09:59:00", "query_time": "0:00:02", "db": null}
            ]
        }"#;
        let report: SlowQueryReport = decode_reply(200, body).unwrap();
        assert_eq!(report.host, "db1");
        assert_eq!(report.slow_queries.len(), 2);

        let first = &report.slow_queries[0];
        assert_eq!(first.query_seconds(), Some(7.25));
        assert_eq!(first.lock_seconds(), Some(0.0001));
        assert_eq!(first.severity(), Severity::Danger);

        let second = &report.slow_queries[1];
        assert_eq!(second.query_seconds(), Some(2.0));
        assert_eq!(second.severity(), Severity::Warning);
        assert!(second.db.is_none());
    }

    #[test]
    fn test_missing_slow_log_reports_backend_help() {
        let body = r#"{"ok": false, "error": "Slow query log table not found.",
                       "help": "SET GLOBAL slow_query_log = 1;"}"#;
        match decode_reply::<SlowQueryReport>(404, body) {
            Err(FetchError::Backend(msg)) => {
                assert!(msg.starts_with("Slow query log table not found."));
                assert!(msg.ends_with("SET GLOBAL slow_query_log = 1;"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reply_status_handling() {
        assert_eq!(
            decode_reply::<NodeConfig>(502, "<html>Bad Gateway</html>"),
            Err(FetchError::Status(502))
        );
        assert_eq!(decode_reply::<NodeConfig>(500, "{}"), Err(FetchError::Status(500)));
        assert!(matches!(
            decode_reply::<NodeConfig>(200, "not json"),
            Err(FetchError::Decode(_))
        ));
        assert_eq!(
            decode_reply::<NodeConfig>(200, r#"{"ok": false, "error": "No nodes available"}"#),
            Err(FetchError::Backend("No nodes available".to_string()))
        );
    }

    #[test]
    fn test_transaction_reply() {
        let body = r#"{
            "ok": true, "host": "db2",
            "transactions": [
                {"trx_id": "421", "trx_state": "RUNNING", "trx_started": "2025-01-01T10:00:00",
                 "trx_mysql_thread_id": 17, "trx_query": "UPDATE t SET a = 1"},
                {"trx_id": "422", "trx_state": "LOCK WAIT", "trx_wait_started": "2025-01-01T10:00:05"}
            ],
            "locks": [{"lock_id": "422:5:3", "lock_trx_id": "422", "lock_mode": "X",
                       "lock_type": "RECORD", "lock_table": "`shop`.`t`"}],
            "lock_waits": [{"requesting_trx_id": "422", "blocking_trx_id": "421"}],
            "innodb_status": null
        }"#;
        let report: TransactionReport = decode_reply(200, body).unwrap();
        assert_eq!(report.transactions.len(), 2);
        assert!(!report.transactions[0].is_waiting());
        assert!(report.transactions[1].is_waiting());
        assert_eq!(report.locks[0].lock_mode.as_deref(), Some("X"));
        assert_eq!(
            report.lock_waits[0].blocking_trx_id,
            Some(MetricValue::from("421"))
        );
        assert!(report.innodb_status.is_none());
    }

    #[test]
    fn test_process_list_reply() {
        let body = r#"{"ok": true, "processes": [
            {"ID": 5, "USER": "app", "HOST": "10.0.0.9:5123", "DB": "shop",
             "COMMAND": "Query", "TIME": 400, "STATE": "Sending data", "INFO": "SELECT 1"},
            {"ID": 6, "USER": "system user", "COMMAND": "Daemon", "TIME": "75"},
            {"ID": 7, "COMMAND": "Sleep", "TIME": null}
        ]}"#;
        let report: ProcessReport = decode_reply(200, body).unwrap();
        let p = &report.processes;
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].user.as_deref(), Some("app"));
        assert_eq!(p[0].severity(), Severity::Danger);
        assert_eq!(p[1].elapsed_secs(), 75);
        assert_eq!(p[1].severity(), Severity::Warning);
        assert_eq!(p[2].elapsed_secs(), 0);
        assert_eq!(p[2].severity(), Severity::Normal);
    }

    #[test]
    fn test_log_replies() {
        let list: LogList = decode_reply(
            200,
            r#"{"ok": true, "logs": [{"path": "/var/log/mysql/galera-error.log",
                "name": "galera-error.log", "size": 2048, "modified": 1735725600.5}]}"#,
        )
        .unwrap();
        assert_eq!(list.logs[0].name, "galera-error.log");
        assert_eq!(list.logs[0].size, 2048);

        let tail: LogTail = decode_reply(
            200,
            r#"{"ok": true, "file": "/var/log/mysql/galera-error.log", "name": "galera-error.log",
                "size": 2048, "modified": "Wed Jan  1 10:00:00 2025",
                "lines": ["2025-01-01 [Note] WSREP: Synchronized\n"]}"#,
        )
        .unwrap();
        assert_eq!(tail.lines.len(), 1);

        assert_eq!(
            decode_reply::<LogTail>(404, r#"{"ok": false, "error": "Log file not found"}"#),
            Err(FetchError::Backend("Log file not found".to_string()))
        );
    }

    #[test]
    fn test_log_level_keywords() {
        assert_eq!(log_level("[ERROR] WSREP: failed to open gcomm"), LogLevel::Error);
        assert_eq!(log_level("[Warning] Aborted connection"), LogLevel::Warning);
        assert_eq!(log_level("[Notice] WSREP: Synchronized with group"), LogLevel::Info);
        assert_eq!(log_level("InnoDB: info about buffer pool"), LogLevel::Info);
        assert_eq!(log_level("2025-01-01 10:00:00 0 [Note]"), LogLevel::Plain);
        // Error wins when a line carries several keywords
        assert_eq!(log_level("warning: error while reading"), LogLevel::Error);
    }

    #[test]
    fn test_node_config_rows() {
        let body = r#"{"ok": true, "host": "db1",
            "config": {"max_connections": "500", "version": "10.6.16-MariaDB",
                       "wsrep_cluster_size": "2", "slow_query_log": "OFF"},
            "status": {"wsrep_cluster_size": "3", "uptime": "86400"}}"#;
        let config: NodeConfig = decode_reply(200, body).unwrap();

        let rows = config.rows(None);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            ["wsrep_cluster_size", "slow_query_log", "uptime", "version", "max_connections"]
        );
        // Status counter wins over the variable of the same name
        assert_eq!(rows[0].value, "3");

        let galera = config.rows(Some("Galera"));
        assert_eq!(galera.len(), 1);
        assert_eq!(galera[0].category, "galera");
        assert!(config.rows(Some("replication")).is_empty());
    }

    #[test]
    fn test_clock_seconds() {
        assert_eq!(clock_seconds(&MetricValue::from("1:02:03.5")), Some(3723.5));
        assert_eq!(clock_seconds(&MetricValue::from("4.5")), Some(4.5));
        assert_eq!(clock_seconds(&MetricValue::from(2.0)), Some(2.0));
        assert_eq!(clock_seconds(&MetricValue::from("x:y:z")), None);
        assert_eq!(clock_seconds(&MetricValue::Null), None);
    }
}
