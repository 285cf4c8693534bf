//! Dashboard Metric Runner
//!
//! Computes one dashboard metric against the configured broker and prints
//! the metric's JSON object on stdout.
//!
//! ```text
//! databin-query <metric> [key=value ...]
//! databin-query --list
//! ```
//!
//! Parameters: `start_date`, `end_date`, `threshold`, `limit`, `status`.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | DATABIN_CONFIG | - | TOML config file; replaces the variables below |
//! | DATABIN_BROKER_URL | (required) | Broker SQL endpoint |
//! | DATABIN_AUTH_TOKEN | (required) | Bearer token |
//! | DATABIN_DATABASE | (required) | Value of the `database` header |
//! | DATABIN_REQUEST_TIMEOUT_MS | 10000 | Per-call HTTP timeout |
//! | DATABIN_CONNECT_TIMEOUT_MS | 5000 | TCP connect timeout |
//! | DATABIN_OVERALL_TIMEOUT_MS | 30000 | Bound on one metric's fan-out |
//! | DATABIN_POOL_MAX_IDLE | 16 | Idle connections kept per host |
//! | RUST_LOG | info | Log filter |
//! | LOG_FORMAT | text | `text` or `json` |
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Metric printed |
//! | 1 | Broker failure (generic message printed) |
//! | 2 | Bad arguments or parameters |
//! | 3 | Bad configuration |

use std::process::ExitCode;

use databin_query::observability::{init_logging, LogConfig};
use databin_query::{BrokerConfig, ConfigError, Dashboard, MetricKind, MetricParams};
use tracing::error;

fn usage() -> String {
    let mut text = String::from("usage: databin-query <metric> [key=value ...]\n\nmetrics:\n");
    for kind in MetricKind::ALL {
        text.push_str(&format!("  {:<28} {}\n", kind.name(), kind.description()));
    }
    text
}

fn load_config() -> Result<BrokerConfig, ConfigError> {
    match std::env::var("DATABIN_CONFIG") {
        Ok(path) if !path.trim().is_empty() => BrokerConfig::from_file(path.trim()),
        _ => BrokerConfig::from_env(),
    }
}

fn print_error(message: &str) {
    println!("{}", serde_json::json!({ "error": message }));
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let Some(metric) = args.first() else {
        eprint!("{}", usage());
        return ExitCode::from(2);
    };
    if metric == "--list" || metric == "--help" || metric == "-h" {
        print!("{}", usage());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("logging disabled: {}", e);
    }

    let kind: MetricKind = match metric.parse() {
        Ok(kind) => kind,
        Err(e) => {
            print_error(&e.to_string());
            eprint!("{}", usage());
            return ExitCode::from(2);
        }
    };

    let mut pairs = Vec::with_capacity(args.len() - 1);
    for arg in &args[1..] {
        match arg.split_once('=') {
            Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
            None => {
                print_error(&format!("expected key=value, got '{}'", arg));
                return ExitCode::from(2);
            }
        }
    }

    let params = match MetricParams::from_pairs(pairs) {
        Ok(params) => params,
        Err(e) => {
            print_error(&e.public_message(kind));
            return ExitCode::from(2);
        }
    };

    let dashboard = match load_config().and_then(|config| Dashboard::from_config(&config)) {
        Ok(dashboard) => dashboard,
        Err(e) => {
            error!(error = %e, "invalid broker configuration");
            print_error(&format!("configuration error: {}", e));
            return ExitCode::from(3);
        }
    };

    match dashboard.compute(kind, &params).await {
        Ok(response) => {
            println!("{}", response.to_json());
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e.public_message(kind));
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
