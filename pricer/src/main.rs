//! Storefront Pricer
//!
//! Operator CLI over the conversion service: list currencies, inspect rates and
//! convert prices.

use std::fmt::Write as _;
use std::io;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use storefront_common::{CurrencyRegistry, RateSnapshot};
use storefront_fx::{ConversionResult, ConversionService, FxConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Storefront pricing CLI
#[derive(Parser, Debug)]
#[command(name = "pricer")]
#[command(about = "Convert and format storefront prices across supported currencies")]
struct Args {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List supported currencies
    Currencies,

    /// Show exchange rates from a base currency
    Rates {
        /// Base currency (defaults to the registry default)
        base: Option<String>,
    },

    /// Convert an amount between two currencies
    Convert {
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        from: String,
        to: String,
    },

    /// Convert an amount into every supported currency
    All {
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Source currency (defaults to the registry default)
        from: Option<String>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs);

    let config = FxConfig::from_env();
    let service = match ConversionService::from_config(&config) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Invalid configuration");
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    let output = run(&service, args.command, args.json).await?;
    println!("{output}");

    info!(stats = ?service.resolver_stats(), "Pricer done");
    Ok(())
}

async fn run(service: &ConversionService, command: Command, json: bool) -> anyhow::Result<String> {
    let registry = service.registry();

    let output = match command {
        Command::Currencies => {
            if json {
                serde_json::to_string_pretty(&registry.iter().collect::<Vec<_>>())?
            } else {
                render_currencies(registry)
            }
        }
        Command::Rates { base } => {
            let base = service.preferred_currency(base.as_deref())?;
            let snapshot = service.rates_for(base.as_str()).await?;
            if json {
                serde_json::to_string_pretty(snapshot.as_ref())?
            } else {
                render_rates(&snapshot)
            }
        }
        Command::Convert { amount, from, to } => {
            let result = service.convert(amount, &from, &to).await?;
            if json {
                serde_json::to_string_pretty(&result)?
            } else {
                let source = service.format_price(amount, &from)?;
                render_conversion(&source, &result)
            }
        }
        Command::All { amount, from } => {
            let from = service.preferred_currency(from.as_deref())?;
            let results = service.convert_all(amount, from.as_str()).await?;
            if json {
                serde_json::to_string_pretty(&results)?
            } else {
                let source = service.format_price(amount, from.as_str())?;
                results
                    .values()
                    .map(|result| render_conversion(&source, result))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    };

    Ok(output)
}

fn render_currencies(registry: &CurrencyRegistry) -> String {
    registry
        .iter()
        .map(|info| {
            let mut line = format!(
                "{} {}  {} ({})",
                info.flag(),
                info.code(),
                info.name(),
                info.symbol()
            );
            if info.is_default() {
                line.push_str(" [default]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rates(snapshot: &RateSnapshot) -> String {
    let mut out = format!(
        "1 {} ({} rates, fetched {})",
        snapshot.base(),
        snapshot.provenance(),
        snapshot.fetched_at().to_rfc3339()
    );

    for (quote, rate) in snapshot.rates() {
        let _ = write!(out, "\n  {quote}  {rate}");
    }

    out
}

fn render_conversion(source: &str, result: &ConversionResult) -> String {
    let mut line = format!("{} = {}", source, result.formatted);
    if result.is_approximate() {
        line.push_str(" (approximate)");
    }
    line
}
