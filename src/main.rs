//! service-router command line.
//!
//! ```text
//! service-router --config router.toml serve [--watch]
//! service-router --config router.toml check
//! service-router --config router.toml resolve /core/users/5 -H x-service-name:spoofed
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use service_router::config::load_config;
use service_router::config::validation::build_router;
use service_router::http::UpstreamTable;
use service_router::lifecycle::startup;
use service_router::routing::RouteRequest;

#[derive(Parser)]
#[command(name = "service-router", version)]
#[command(about = "Prefix-based request router for edge dispatch", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the edge server
    Serve {
        /// Reload the routing table when the config file changes
        #[arg(long)]
        watch: bool,
    },
    /// Validate the configuration and print the rule table
    Check,
    /// Show how a request would be dispatched, without forwarding it
    Resolve {
        /// Request path, e.g. /core/users/5
        uri: String,

        /// Request header as name:value (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected name:value, got {raw:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Serve { watch } => startup::serve(&cli.config, watch)
            .await
            .map_err(Into::into),
        Commands::Check => check(&cli.config),
        Commands::Resolve { uri, headers } => resolve(&cli.config, uri, headers),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let router = build_router(&config.routing)?;
    let upstreams = UpstreamTable::from_config(&config.upstreams)?;
    let address_of = |service: &str| {
        upstreams
            .get(service)
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    println!("configuration OK: {}", path.display());
    println!("listener  {}", config.listener.bind_address);
    println!("header    {}", router.header_name());
    println!(
        "default   {} ({})",
        router.default_service(),
        address_of(router.default_service())
    );
    println!("rules (first match wins):");
    for (i, (prefix, service)) in router.rules().enumerate() {
        println!("  {}. {prefix} -> {service} ({})", i + 1, address_of(service));
    }

    let rules: Vec<_> = router.rules().collect();
    for (earlier, later) in router.shadowed_rules() {
        println!(
            "warning: rule {} ({}) can never match, rule {} ({}) covers it",
            later + 1,
            rules[later].0,
            earlier + 1,
            rules[earlier].0
        );
    }

    Ok(())
}

fn resolve(
    path: &Path,
    uri: String,
    headers: Vec<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let router = build_router(&config.routing)?;

    let mut header_map = HeaderMap::new();
    for (name, value) in headers {
        header_map.append(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(&value)?,
        );
    }

    let routed = router.route(RouteRequest::new(uri, header_map))?;
    let rule = routed
        .rule
        .and_then(|i| router.rules().nth(i))
        .map(|(prefix, _)| prefix);

    let mut out_headers = Map::new();
    for name in routed.request.headers.keys() {
        let values: Vec<&str> = routed
            .request
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        out_headers.insert(name.to_string(), Value::String(values.join(", ")));
    }

    let output = json!({
        "uri": routed.request.uri,
        "service": routed.service,
        "rule": rule,
        "headers": out_headers,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
