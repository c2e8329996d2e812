mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommands, HaproxyCommands};
use galera_dash::app::App;
use galera_dash::core::haproxy::parse_weight;
use galera_dash::core::inspect::{log_level, LogLevel, QUERY_PREVIEW_CHARS};
use galera_dash::core::{
    ClusterSnapshot, HaproxyControl, HostStatus, HttpStatusSource, InspectClient, MetricValue,
    PollEvent, PollState, Poller, StatusSource,
};
use galera_dash::utils::{
    classify, find_metric, format_duration, format_metric_value, truncate_string, AppConfig,
    MetricKind, Severity, DELAY_METRIC,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        None => {
            // No command - run interactive TUI, logging to a file
            let config = effective_config(AppConfig::load(), &cli.url, cli.interval)?;
            init_file_logging(&config)?;
            let mut app = App::new(config)?;
            app.run().await?;
        }
        Some(command) => {
            // `config` subcommands load the file themselves, so a broken file can be replaced
            let config = if needs_config(&command) {
                effective_config(AppConfig::load(), &cli.url, cli.interval)?
            } else {
                AppConfig::default()
            };
            init_stderr_logging(&config);

            match command {
                Commands::Status { json } => handle_status(&config, json).await?,
                Commands::Watch { count } => handle_watch(&config, count).await?,
                Commands::SlowQueries { host, limit } => handle_slow_queries(&config, &host, limit).await?,
                Commands::Transactions { host, limit } => handle_transactions(&config, &host, limit).await?,
                Commands::Processes { host } => handle_processes(&config, &host).await?,
                Commands::Logs { file, lines, list } => handle_logs(&config, file, lines, list).await?,
                Commands::NodeConfig { host, category } => {
                    handle_node_config(&config, &host, category.as_deref()).await?
                }
                Commands::Haproxy { command } => handle_haproxy(&config, command).await?,
                Commands::Config { command } => handle_config(command, &cli.url, cli.interval)?,
            }
        }
    }

    Ok(())
}

fn needs_config(command: &Commands) -> bool {
    !matches!(command, Commands::Config { .. })
}

/// File, then environment, then command line
fn effective_config(
    loaded: Result<AppConfig>,
    url: &Option<String>,
    interval: Option<u32>,
) -> Result<AppConfig> {
    let mut config = loaded?;
    config.apply_env();
    if let Some(url) = url {
        config.base_url = url.trim().to_string();
    }
    if let Some(interval) = interval {
        config.poll_interval_secs = interval;
    }
    Ok(config)
}

fn env_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("galera_dash={}", config.log_level)))
}

/// The TUI owns the terminal, so log lines go to a file
fn init_file_logging(config: &AppConfig) -> Result<()> {
    let path = config.log_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(io::stderr)
        .init();
}

fn http_source(config: &AppConfig) -> Result<HttpStatusSource> {
    HttpStatusSource::new(&config.base_url, config.request_timeout()?)
}

fn colored_metric(node: &HostStatus, key: &str, config: &AppConfig) -> String {
    let value = node.metric(key);
    let (kind, severity) = match find_metric(key) {
        Some(def) => (def.kind, classify(value, &config.thresholds_for(def))),
        None => (MetricKind::Number, Severity::Normal),
    };
    paint(format_metric_value(value, kind), severity)
}

fn paint(text: String, severity: Severity) -> String {
    match severity {
        Severity::Normal => text,
        Severity::Warning => text.yellow().bold().to_string(),
        Severity::Danger => text.red().bold().to_string(),
    }
}

fn print_status_table(snapshot: &ClusterSnapshot, config: &AppConfig) {
    println!(
        "{:<22} {:<6} {:<10} {:>8} {:>8} {:>7} {:>8}  {}",
        "Host", "State", "Cluster", "Recv Q", "Send Q", "Weight", "Current", "Version"
    );
    println!("{}", "-".repeat(92));

    for node in &snapshot.nodes {
        let state = if node.is_up() { "UP".green() } else { "DOWN".red() };
        let cluster = format_metric_value(node.metric("wsrep_cluster_status"), MetricKind::Text);
        let version = format_metric_value(node.metric("wsrep_provider_version"), MetricKind::Text);
        let current = format_metric_value(node.metric("haproxy_current"), MetricKind::Number);

        // Pad before colouring so escape codes don't break the alignment
        println!(
            "{:<22} {:<6} {:<10} {:>8} {:>8} {:>7} {:>8}  {}",
            node.host,
            state,
            cluster,
            pad_left(&colored_metric(node, "wsrep_local_recv_queue", config), 8),
            pad_left(&colored_metric(node, "wsrep_local_send_queue", config), 8),
            snapshot.effective_weight(node),
            current,
            version
        );

        if let Some(error) = &node.error {
            println!("  {} {}", "✗".red(), error);
        }
        if node.need_more_slave() {
            println!("  {}", "NEED_MORE_SLAVE_T".black().on_yellow());
        }
    }
}

/// Right-align a possibly colored string by its visible width
fn pad_left(s: &str, width: usize) -> String {
    let visible = strip_ansi(s).chars().count();
    format!("{}{}", " ".repeat(width.saturating_sub(visible)), s)
}

/// Left-align a possibly colored string by its visible width
fn pad_right(s: &str, width: usize) -> String {
    let visible = strip_ansi(s).chars().count();
    format!("{}{}", s, " ".repeat(width.saturating_sub(visible)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

async fn handle_status(config: &AppConfig, json: bool) -> Result<()> {
    let source = http_source(config)?;
    let snapshot = source.fetch().await?;

    if json {
        let body = serde_json::json!({
            "nodes": snapshot.nodes,
            "haproxy_weights": snapshot.haproxy_weights,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}\n", format!("Galera Cluster Status ({})", config.base_url).bold());
    print_status_table(&snapshot, config);
    Ok(())
}

async fn handle_watch(config: &AppConfig, count: Option<u64>) -> Result<()> {
    let source: Arc<dyn StatusSource> = Arc::new(http_source(config)?);
    let mut poller = Poller::new(source, config.poll_interval_secs, config.max_points);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    info!(url = %config.base_url, interval = config.poll_interval_secs, "watching cluster");
    println!("Watching {} every {}s (Ctrl+C to stop)\n", config.base_url, config.poll_interval_secs);

    poller.start();
    poller.refresh();

    loop {
        let fetching = poller.state() == PollState::Fetching;
        tokio::select! {
            _ = ticker.tick() => poller.on_second(),
            event = poller.next_completion(), if fetching => {
                if let Some(event) = event {
                    print_watch_event(&poller, &event, config);
                    if count.is_some_and(|n| poller.polls() >= n) {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn print_watch_event(poller: &Poller, event: &PollEvent, config: &AppConfig) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match event {
        PollEvent::Updated { .. } => {
            let Some(snapshot) = poller.snapshot() else {
                return;
            };
            for node in &snapshot.nodes {
                let state = if node.is_up() { "UP".green() } else { "DOWN".red() };
                let history = poller.store().series_for(&node.host).len();
                println!(
                    "{} {:<22} {:<4} {}={} weight={} samples={}",
                    now.to_string().dimmed(),
                    node.host,
                    state,
                    DELAY_METRIC,
                    colored_metric(node, DELAY_METRIC, config),
                    snapshot.effective_weight(node),
                    history
                );
            }
        }
        PollEvent::Failed(e) => {
            println!("{} {} {}", now.to_string().dimmed(), "poll failed:".red(), e);
        }
    }
}

fn inspect_client(config: &AppConfig) -> Result<InspectClient> {
    InspectClient::new(&config.base_url, config.request_timeout()?)
}

/// Cell text for an optional value
fn cell(value: Option<&MetricValue>) -> String {
    value
        .and_then(MetricValue::display)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "-".to_string())
}

/// Query text on one line, cut to a table cell
fn query_preview(sql: Option<&str>) -> String {
    let flat = sql.unwrap_or("-").split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_string(&flat, QUERY_PREVIEW_CHARS)
}

async fn handle_slow_queries(config: &AppConfig, host: &str, limit: u32) -> Result<()> {
    let report = inspect_client(config)?.slow_queries(host, limit).await?;

    println!("{}\n", format!("Slow queries on {}", host).bold());
    if report.slow_queries.is_empty() {
        println!("No slow queries found. Slow query logging may be disabled on this node.");
        return Ok(());
    }

    println!(
        "{:<20} {:>10} {:>10} {:>12} {:<14}  {}",
        "Start", "Query", "Lock", "Examined", "Database", "SQL"
    );
    println!("{}", "-".repeat(100));
    for query in &report.slow_queries {
        let secs = |s: Option<f64>| s.map(|v| format!("{:.3}s", v)).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {} {:>10} {:>12} {:<14}  {}",
            query.start_time.as_deref().unwrap_or("-"),
            pad_left(&paint(secs(query.query_seconds()), query.severity()), 10),
            secs(query.lock_seconds()),
            cell(query.rows_examined.as_ref()),
            query.db.as_deref().unwrap_or("-"),
            query_preview(query.sql_text.as_deref())
        );
    }
    Ok(())
}

async fn handle_transactions(config: &AppConfig, host: &str, limit: u32) -> Result<()> {
    let report = inspect_client(config)?.transactions(host, limit).await?;

    println!("{}\n", format!("InnoDB transactions on {}", host).bold());
    if report.transactions.is_empty() {
        println!("No active transactions");
    } else {
        println!("{:<18} {:<12} {:<20} {:>8}  {}", "Trx", "State", "Started", "Thread", "Query");
        println!("{}", "-".repeat(100));
        for trx in report.transactions.iter().take(limit as usize) {
            let state = trx.trx_state.as_deref().unwrap_or("-");
            let state = if trx.is_waiting() {
                state.yellow().bold().to_string()
            } else {
                state.green().to_string()
            };
            println!(
                "{:<18} {} {:<20} {:>8}  {}",
                cell(trx.trx_id.as_ref()),
                pad_right(&state, 12),
                trx.trx_started.as_deref().unwrap_or("-"),
                cell(trx.trx_mysql_thread_id.as_ref()),
                query_preview(trx.trx_query.as_deref())
            );
        }
    }

    if !report.locks.is_empty() {
        println!("\n{}", "Locks".bold());
        println!("{:<24} {:<18} {:<8} {:<8}  {}", "Lock", "Trx", "Mode", "Type", "Table");
        for lock in &report.locks {
            println!(
                "{:<24} {:<18} {:<8} {:<8}  {}",
                cell(lock.lock_id.as_ref()),
                cell(lock.lock_trx_id.as_ref()),
                lock.lock_mode.as_deref().unwrap_or("-"),
                lock.lock_type.as_deref().unwrap_or("-"),
                lock.lock_table.as_deref().unwrap_or("-")
            );
        }
    }

    for wait in &report.lock_waits {
        println!(
            "{} trx {} is waiting for trx {}",
            "⏳".yellow(),
            cell(wait.requesting_trx_id.as_ref()),
            cell(wait.blocking_trx_id.as_ref())
        );
    }
    Ok(())
}

async fn handle_processes(config: &AppConfig, host: &str) -> Result<()> {
    let processes = inspect_client(config)?.processes(host).await?;

    println!("{}\n", format!("Processes on {}", host).bold());
    if processes.is_empty() {
        println!("No active processes");
        return Ok(());
    }

    println!(
        "{:>8} {:<14} {:<22} {:<12} {:<10} {:>8} {:<18}  {}",
        "Id", "User", "Host", "Db", "Command", "Time", "State", "Info"
    );
    println!("{}", "-".repeat(110));
    for p in &processes {
        println!(
            "{:>8} {:<14} {:<22} {:<12} {:<10} {} {:<18}  {}",
            cell(p.id.as_ref()),
            truncate_string(p.user.as_deref().unwrap_or("-"), 14),
            truncate_string(p.host.as_deref().unwrap_or("-"), 22),
            p.db.as_deref().unwrap_or("-"),
            p.command.as_deref().unwrap_or("-"),
            pad_left(&paint(format_duration(p.elapsed_secs()), p.severity()), 8),
            truncate_string(p.state.as_deref().unwrap_or("-"), 18),
            query_preview(p.info.as_deref())
        );
    }
    Ok(())
}

async fn handle_logs(config: &AppConfig, file: Option<String>, lines: u32, list: bool) -> Result<()> {
    let client = inspect_client(config)?;

    if list {
        let logs = client.available_logs().await?;
        if logs.is_empty() {
            println!("No log files found on the backend host");
        }
        for log in &logs {
            let modified = chrono::DateTime::from_timestamp(log.modified as i64, 0)
                .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<50} {:>12} {}", log.path, format!("{} B", log.size), modified);
        }
        return Ok(());
    }

    let path = match file {
        Some(path) => path,
        None => match client.available_logs().await?.into_iter().next() {
            Some(log) => log.path,
            None => bail!("No log files found on the backend host"),
        },
    };

    let tail = client.server_log(&path, lines).await?;
    println!("{}\n", format!("{} (last {} lines)", tail.file, tail.lines.len()).bold());
    for line in &tail.lines {
        let line = line.trim_end();
        match log_level(line) {
            LogLevel::Error => println!("{}", line.red()),
            LogLevel::Warning => println!("{}", line.yellow()),
            LogLevel::Info => println!("{}", line.cyan()),
            LogLevel::Plain => println!("{}", line),
        }
    }
    Ok(())
}

async fn handle_node_config(config: &AppConfig, host: &str, category: Option<&str>) -> Result<()> {
    let node = inspect_client(config)?.node_config(host).await?;
    let rows = node.rows(category);

    println!("{}\n", format!("Server variables on {}", host).bold());
    if rows.is_empty() {
        println!("No configuration data found");
        return Ok(());
    }

    println!("{:<36} {:<12}  {}", "Variable", "Category", "Value");
    println!("{}", "-".repeat(80));
    for row in &rows {
        println!("{:<36} {:<12}  {}", row.name, row.category.dimmed(), row.value);
    }
    Ok(())
}

async fn handle_haproxy(config: &AppConfig, command: HaproxyCommands) -> Result<()> {
    let control = HaproxyControl::new(&config.base_url, config.request_timeout()?)?;

    let message = match command {
        HaproxyCommands::Enable { host } => control.enable(&host).await?,
        HaproxyCommands::Disable { host } => control.disable(&host).await?,
        HaproxyCommands::Weight { host, weight } => {
            let weight = parse_weight(&weight)?;
            control.set_weight(&host, weight).await?
        }
        HaproxyCommands::Restart { yes } => {
            if !yes && !confirm("Are you sure you want to restart HAProxy?")? {
                println!("Cancelled");
                return Ok(());
            }
            control.restart().await?
        }
    };

    println!("{} {}", "✓".green(), message);
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

fn handle_config(command: ConfigCommands, url: &Option<String>, interval: Option<u32>) -> Result<()> {
    match command {
        ConfigCommands::View => {
            let config = effective_config(AppConfig::load(), url, interval)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Init { force } => {
            let path = AppConfig::config_path()?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = AppConfig::default().save()?;
            println!("{} Wrote default configuration to {}", "✓".green(), path.display());
        }
        ConfigCommands::Path => {
            println!("{}", AppConfig::config_path()?.display());
        }
        ConfigCommands::Validate => {
            let errors = config_problems(effective_config(AppConfig::load(), url, interval));
            if errors.is_empty() {
                println!("{} Configuration is valid", "✓".green());
            } else {
                for error in &errors {
                    println!("{} {}", "✗".red(), error);
                }
                bail!("{} configuration problem(s) found", errors.len());
            }
        }
    }
    Ok(())
}

/// Problems with the effective configuration; an unreadable file counts as one
fn config_problems(config: Result<AppConfig>) -> Vec<String> {
    match config {
        Ok(config) => config.validate(),
        Err(e) => vec![format!("{:#}", e)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_left_ignores_color_codes() {
        colored::control::set_override(true);
        let red = "12".red().to_string();
        let padded = pad_left(&red, 5);
        assert_eq!(strip_ansi(&padded), "   12");
        colored::control::unset_override();
    }

    #[test]
    fn test_query_preview_is_one_line() {
        assert_eq!(query_preview(Some("SELECT *\n  FROM t\tWHERE a = 1")), "SELECT * FROM t WHERE a = 1");
        assert_eq!(query_preview(None), "-");
        let long = "x".repeat(300);
        assert_eq!(query_preview(Some(&long)).chars().count(), QUERY_PREVIEW_CHARS);
    }

    #[test]
    fn test_pad_right_ignores_color_codes() {
        colored::control::set_override(true);
        let padded = pad_right(&"RUNNING".green().to_string(), 10);
        assert_eq!(strip_ansi(&padded), "RUNNING   ");
        colored::control::unset_override();
    }

    #[test]
    fn test_config_commands_skip_loading() {
        assert!(!needs_config(&Commands::Config {
            command: ConfigCommands::Init { force: true }
        }));
        assert!(!needs_config(&Commands::Config {
            command: ConfigCommands::Validate
        }));
        assert!(needs_config(&Commands::Status { json: false }));
    }

    #[test]
    fn test_broken_config_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = [").unwrap();

        let problems = config_problems(effective_config(AppConfig::load_from(&path), &None, None));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("Failed to parse config file"));

        let fine = config_problems(effective_config(
            Ok(AppConfig::default()),
            &Some(" http://db:5000 ".to_string()),
            Some(10),
        ));
        assert!(fine.is_empty());
    }
}
