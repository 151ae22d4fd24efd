use std::path::PathBuf;

use clap::{Parser, Subcommand};

use edge_gateway::config::load_config;
use edge_gateway::routing::descriptor::{parse_timeout, DEFAULT_ROUTE_TIMEOUT};

#[derive(Parser)]
#[command(name = "gateway-ctl")]
#[command(about = "Operator CLI for the edge gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a config file and list its routes
    Check {
        #[arg(short, long, default_value = "config/gateway.toml")]
        config: PathBuf,
    },
    /// Fetch gateway metrics from a running instance
    Metrics {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,

        /// Print every metric, not only gateway_*
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let config = load_config(&config)?;
            println!(
                "port {}  rate_limit {}  auth {} ({})  discovery {}  tracing {}",
                config.port,
                config.rate_limit.enabled,
                config.auth.enabled,
                config.auth.auth_type,
                config.service_discovery.enabled,
                config.tracing.enabled,
            );
            for route in &config.routes {
                let target = match (&route.service_name, &route.target_url) {
                    (Some(service), _) if !service.is_empty() => format!("service:{service}"),
                    (_, Some(url)) if !url.is_empty() => url.clone(),
                    _ => "<no target>".to_string(),
                };
                let timeout = match parse_timeout(&route.timeout) {
                    Some(timeout) => format!("{timeout:?}"),
                    None => format!("{DEFAULT_ROUTE_TIMEOUT:?} (invalid '{}')", route.timeout),
                };
                println!("{:<30} -> {:<40} timeout {}", route.path, target, timeout);
            }
        }
        Commands::Metrics { url, all } => {
            let res = reqwest::get(format!("{}/metrics", url.trim_end_matches('/'))).await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
                return Ok(());
            }
            let body = res.text().await?;
            for line in body.lines() {
                if all || line.contains("gateway_") {
                    println!("{line}");
                }
            }
        }
    }

    Ok(())
}
