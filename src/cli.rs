/// CLI argument parsing

use clap::{Parser, Subcommand};
use galera_dash::core::inspect::{DEFAULT_LOG_LINES, DEFAULT_SLOW_QUERY_LIMIT, DEFAULT_TRANSACTION_LIMIT};

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "galera-dash")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Dashboard backend base URL (overrides GALERA_DASH_URL and the config file)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Seconds between status polls (overrides GALERA_DASH_INTERVAL and the config file)
    #[arg(long, global = true)]
    pub interval: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch cluster status once and print it
    Status {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll continuously and print one line per node and poll
    Watch {
        /// Stop after this many polls
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Newest entries of a node's slow query log
    SlowQueries {
        host: String,

        /// Number of entries
        #[arg(short = 'n', long, default_value_t = DEFAULT_SLOW_QUERY_LIMIT)]
        limit: u32,
    },

    /// Open InnoDB transactions, locks and lock waits on a node
    Transactions {
        host: String,

        #[arg(short = 'n', long, default_value_t = DEFAULT_TRANSACTION_LIMIT)]
        limit: u32,
    },

    /// Client threads running on a node
    Processes { host: String },

    /// Tail a MySQL server log on the backend host
    Logs {
        /// Log file to read (defaults to the most recently modified one)
        #[arg(short, long)]
        file: Option<String>,

        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
        lines: u32,

        /// List the available log files instead
        #[arg(long)]
        list: bool,
    },

    /// Server variables and status counters of a node
    NodeConfig {
        host: String,

        /// Only show one category (galera, performance, logging, replication, innodb, other)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// HAProxy control
    Haproxy {
        #[command(subcommand)]
        command: HaproxyCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum HaproxyCommands {
    /// Put a backend server back into rotation
    Enable { host: String },

    /// Take a backend server out of rotation
    Disable { host: String },

    /// Set a backend server's weight (0-256)
    Weight { host: String, weight: String },

    /// Restart HAProxy
    Restart {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// View the effective configuration
    View,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the config file location
    Path,

    /// Validate configuration
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_haproxy_weight() {
        let cli = Cli::try_parse_from(["galera-dash", "--url", "http://db:5000", "haproxy", "weight", "10.0.0.1", "50"]).unwrap();
        assert_eq!(cli.url.as_deref(), Some("http://db:5000"));
        match cli.command {
            Some(Commands::Haproxy {
                command: HaproxyCommands::Weight { host, weight },
            }) => {
                assert_eq!(host, "10.0.0.1");
                assert_eq!(weight, "50");
            }
            _ => panic!("expected haproxy weight"),
        }
    }

    #[test]
    fn test_no_command_means_dashboard() {
        let cli = Cli::try_parse_from(["galera-dash", "--interval", "10"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.interval, Some(10));
    }

    #[test]
    fn test_parse_inspection_commands() {
        let cli = Cli::try_parse_from(["galera-dash", "slow-queries", "db1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::SlowQueries { ref host, limit: 100 }) if host == "db1"
        ));

        let cli = Cli::try_parse_from(["galera-dash", "transactions", "db2", "-n", "10"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Transactions { limit: 10, .. })));

        let cli = Cli::try_parse_from(["galera-dash", "logs", "--list"]).unwrap();
        match cli.command {
            Some(Commands::Logs { file, lines, list }) => {
                assert!(file.is_none());
                assert_eq!(lines, 100);
                assert!(list);
            }
            _ => panic!("expected logs"),
        }

        let cli = Cli::try_parse_from(["galera-dash", "node-config", "db1", "-c", "galera"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::NodeConfig { category: Some(ref c), .. }) if c == "galera"
        ));
    }

    #[test]
    fn test_environment_is_left_to_the_config_layer() {
        // A bad GALERA_DASH_INTERVAL is AppConfig's to ignore, not clap's to reject
        std::env::set_var("GALERA_DASH_INTERVAL", "soon");
        std::env::set_var("GALERA_DASH_URL", "http://from-env:5000");
        let cli = Cli::try_parse_from(["galera-dash", "status"]).unwrap();
        assert!(cli.interval.is_none());
        assert!(cli.url.is_none());
    }
}
