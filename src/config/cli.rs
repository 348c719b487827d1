use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the rfpl binary.
#[derive(Debug, Parser)]
#[command(
    name = "rfpl",
    version,
    about = "Respond-first, process-later HTTP response cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RFPL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the caching proxy in front of the upstream origin.
    Serve(Box<ServeArgs>),
    /// Show the cache entry a request maps to.
    Key(KeyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache root directory.
    #[arg(long = "cache-directory", value_name = "PATH")]
    pub cache_directory: Option<PathBuf>,

    /// Override the freshness window in seconds.
    #[arg(
        long = "cache-ttl-seconds",
        value_name = "SECONDS",
        allow_negative_numbers = true
    )]
    pub cache_ttl_seconds: Option<i64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Answer non-GET requests with 405 instead of passing them through.
    #[arg(
        long = "cache-reject-non-get",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_reject_non_get: Option<bool>,

    /// Override the upstream origin base URL.
    #[arg(long = "upstream-url", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Request host, exactly as sent in the `Host` header.
    #[arg(value_name = "HOST")]
    pub host: String,

    /// Request path including the query string.
    #[arg(value_name = "PATH_AND_QUERY", default_value = "/")]
    pub path_and_query: String,
}
