use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use sethosts::app::{platform, App, RunOutcome};
use sethosts::common::SetHostsError;
use sethosts::config::{load_config, Config};

/// Pick the fastest reachable IPs for a set of domains and pin them in the hosts file.
#[derive(Parser, Debug)]
#[command(name = "sethosts", version)]
struct Cli {
    /// Log level
    #[arg(long, value_parser = ["debug", "info", "warning", "error"])]
    log: Option<String>,

    /// Hosts kept per group when only one address family is reachable
    #[arg(long = "hosts-num", visible_alias = "num")]
    hosts_num: Option<usize>,

    /// Latency ceiling in milliseconds
    #[arg(long = "max-latency", visible_alias = "max")]
    max_latency: Option<u64>,

    /// Hosts file to update
    #[arg(long)]
    hosts_file: Option<PathBuf>,

    /// Resolver cache file
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(level) = self.log {
            config.log.level = level;
        }
        if let Some(n) = self.hosts_num {
            config.hosts_num = n;
        }
        if let Some(ms) = self.max_latency {
            config.max_latency = ms;
        }
        if let Some(path) = self.hosts_file {
            config.hosts_file = path;
        }
        if let Some(path) = self.cache_file {
            config.cache_file = path;
        }
        config.validate()?;
        Ok(config)
    }
}

fn filter_directive(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        other => other.to_string(),
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_directive(level))),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let cli_level = cli.log.clone().unwrap_or_else(|| "info".to_string());

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&cli_level);
            let e = SetHostsError::Config(format!("{:#}", e));
            error!(kind = e.kind().as_str(), "{}", e);
            return ExitCode::from(1);
        }
    };
    init_logging(&config.log.level);

    info!(
        groups = config.groups.len(),
        dns_servers = config.dns_servers.len(),
        max_latency = config.max_latency,
        hosts_num = config.hosts_num,
        "sethosts starting"
    );
    platform::warn_if_unprivileged();

    let result = match App::new(config) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(RunOutcome::Written { entries, path }) => {
            info!(entries = entries, hosts = %path.display(), "hosts file updated");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::NothingToWrite) => ExitCode::from(2),
        Err(e) => {
            error!(kind = SetHostsError::classify(&e).as_str(), "{:#}", e);
            ExitCode::from(1)
        }
    }
}
