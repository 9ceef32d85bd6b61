//! Rewrite filter CLI entry point.
//!
//! Offline driver for the filter: validates rewrite configurations and
//! dry-runs them against request paths, exercising the same instance and
//! session lifecycle the host proxy drives in production.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use path_rewrite_filter::{
    ConfigDecoder, FilterInstance, Host, HostError, JsonDecoder, RequestSession, YamlDecoder,
    PATH_HEADER,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "path-rewrite-filter")]
#[command(
    author,
    version,
    about = "Request-path rewrite filter validation and dry-run tool"
)]
struct Args {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request paths to rewrite, one session per path
    #[arg(value_name = "PATH")]
    paths: Vec<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    validate: bool,
}

fn print_example_config() {
    let example = r#"# Rewrite Filter Configuration Example
#
# `pattern` is matched against the request :path pseudo-header; every
# non-overlapping occurrence is replaced with `replacement`. `$1`, `$2`, ...
# reference capture groups of the occurrence (1-indexed); any other text,
# `$0` included, stays literal.
pattern: "banana/([0-9]*)"
replacement: "status/$1"
"#;
    println!("{}", example);
}

/// In-process host: the configuration payload plus a request-header table.
struct CliHost {
    config: Vec<u8>,
    headers: HashMap<String, String>,
}

impl CliHost {
    fn new(config: Vec<u8>) -> Self {
        Self {
            config,
            headers: HashMap::new(),
        }
    }
}

impl Host for CliHost {
    fn get_plugin_configuration(&self, max_size: usize) -> Result<Vec<u8>, HostError> {
        if self.config.len() > max_size {
            return Err(HostError::Internal(format!(
                "configuration exceeds {max_size} bytes"
            )));
        }
        Ok(self.config.clone())
    }

    fn get_request_header(&self, name: &str) -> Result<String, HostError> {
        self.headers
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::HeaderNotFound(name.to_string()))
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), HostError> {
        self.headers.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    // Print example config if requested
    if args.example_config {
        print_example_config();
        return Ok(());
    }

    // Load configuration
    let Some(config_path) = &args.config else {
        bail!("a configuration file is required (see --example-config)");
    };
    let payload = std::fs::read(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let decoder: Box<dyn ConfigDecoder> = if config_path
        .extension()
        .is_some_and(|e| e == "yaml" || e == "yml")
    {
        Box::new(YamlDecoder)
    } else {
        Box::new(JsonDecoder)
    };

    // Bring the instance up exactly the way the host proxy would
    let config_size = payload.len();
    let mut host = CliHost::new(payload);
    let instance = Arc::new(FilterInstance::with_decoder(0, decoder));
    if !instance.on_start(&host, config_size) {
        bail!(
            "configuration rejected: {} (run with --log-level debug for details)",
            config_path.display()
        );
    }

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    if args.paths.is_empty() {
        bail!("no request paths given (pass paths as arguments, or use --validate)");
    }

    // One session per path, sequentially, as a run-to-completion host would
    for (index, path) in args.paths.iter().enumerate() {
        host.set_request_header(PATH_HEADER, path)?;

        let mut session = RequestSession::new(Arc::clone(&instance), index as u32);
        let action = session.on_request_headers(&mut host, 1, true);
        debug!(session = session.id(), action = ?action, "header pass finished");

        let rewritten = host.get_request_header(PATH_HEADER)?;
        println!("{path} -> {rewritten}");

        session.on_stream_complete(&host);
    }

    let stats = instance.stats();
    info!(
        sessions = stats.sessions_total,
        rewritten = stats.paths_rewritten,
        "dry run complete"
    );
    instance.on_shutdown(&host);

    Ok(())
}
