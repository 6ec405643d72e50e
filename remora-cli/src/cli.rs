//! Contains structures and functionality for the binary
use std::path::PathBuf;

use remora::error::Error;
use remora::execution::config::DiscoveryConfig;

/// Cli arguments related to logging
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Increase log verbosity; may be given up to three times
    #[arg(short, long, action = clap::builder::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Show only errors (equivalent to --log error)
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Set the log level explicitly (default is "warn")
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Initialize logging. The verbosity is taken from, in order:
    /// the count of `-v` (info, debug, trace), `-q` (errors only), the
    /// `RMA_LOG` environment variable, and finally the default of warn.
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        builder.filter_level(log::LevelFilter::Warn);
        builder.parse_env("RMA_LOG");

        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            });
        }
        builder.init();
    }
}

/// Cli arguments related to the discovery parameters
#[derive(Debug, clap::Args)]
pub(crate) struct DiscoveryArgs {
    /// Traversal strategy (dfs, bfs, astar)
    #[arg(short, long, default_value = "dfs")]
    pub(crate) strategy: String,
    /// Heuristic steering the astar strategy
    /// (naive, table-size, join-selectivity, hybrid)
    #[arg(long = "heuristic", default_value = "hybrid")]
    pub(crate) heuristic: String,
    /// Maximum number of table occurrences per rule
    #[arg(short = 'N', long = "max-tables", default_value_t = 3)]
    pub(crate) max_tables: usize,
    /// Maximum number of variables per rule
    #[arg(long = "max-vars", default_value_t = 6)]
    pub(crate) max_vars: usize,
    /// Maximum number of occurrences of one table
    #[arg(long = "max-occurrence", default_value_t = 3)]
    pub(crate) max_occurrence: usize,
    /// Minimum value-overlap ratio for attribute compatibility
    #[arg(long = "tau-overlap", default_value_t = 0.5)]
    pub(crate) tau_overlap: f64,
    /// Minimum support for a rule to be emitted
    #[arg(long = "tau-support", default_value_t = 0.1)]
    pub(crate) tau_support: f64,
    /// Minimum confidence for a rule to be emitted
    #[arg(long = "tau-confidence", default_value_t = 0.5)]
    pub(crate) tau_confidence: f64,
}

impl DiscoveryArgs {
    /// Assemble and validate the engine configuration.
    pub(crate) fn discovery_config(
        &self,
        results_dir: Option<PathBuf>,
    ) -> Result<DiscoveryConfig, Error> {
        let config = DiscoveryConfig {
            max_tables: self.max_tables,
            max_vars: self.max_vars,
            max_occurrence: self.max_occurrence,
            strategy: self.strategy.parse()?,
            heuristic: self.heuristic.parse()?,
            tau_overlap: self.tau_overlap,
            tau_support: self.tau_support,
            tau_confidence: self.tau_confidence,
            results_path: results_dir,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Remora CLI
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct CliApp {
    /// Directory holding one <table>.csv file per table, with optional
    /// <table>.fk foreign-key sidecars
    #[arg(value_parser, required = true)]
    pub(crate) data_directory: PathBuf,
    /// Arguments related to the discovery parameters
    #[command(flatten)]
    pub(crate) discovery: DiscoveryArgs,
    /// Directory for the side files; omitted means no side files
    #[arg(short = 'D', long = "results-dir")]
    pub(crate) results_directory: Option<PathBuf>,
    /// Stop discovery after this many seconds
    #[arg(long = "timeout")]
    pub(crate) timeout: Option<u64>,
    /// Stop after emitting this many rules
    #[arg(long = "limit")]
    pub(crate) limit: Option<usize>,
    /// Arguments related to logging
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}
