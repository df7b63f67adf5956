use anyhow::{Context as _, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use vouchd::backend::rest::RestBackend;
use vouchd::config::{CliOverrides, VouchdConfig};
use vouchd::error::ErrorClass;
use vouchd::gate::{self, RenderState};
use vouchd::reconciler::Phase;
use vouchd::BootstrapContext;

#[derive(Parser)]
#[command(
    name = "vouchd",
    about = "Voucher CRM client host — session bootstrap",
    version
)]
struct Args {
    /// Hosted backend base URL
    #[arg(long, env = "VOUCHD_BACKEND_URL")]
    backend_url: Option<String>,

    /// Project API key for the hosted backend
    #[arg(long, env = "VOUCHD_API_KEY")]
    api_key: Option<String>,

    /// Hostname this client is served from (drives timeout budgets)
    #[arg(long, env = "VOUCHD_HOST")]
    host: Option<String>,

    /// Port this client is served from
    #[arg(long, env = "VOUCHD_PORT")]
    port: Option<String>,

    /// Config file path (TOML)
    #[arg(long, env = "VOUCHD_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "VOUCHD_LOG")]
    log: Option<String>,

    /// Log output format: "pretty" (default, human-readable) | "json"
    #[arg(long, env = "VOUCHD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Print the final render decision as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = VouchdConfig::resolve(
        args.config.as_deref(),
        CliOverrides {
            backend_url: args.backend_url,
            api_key: args.api_key,
            host: args.host,
            port: args.port,
            log: args.log,
            log_format: args.log_format,
        },
    );

    setup_logging(&config.log_level, &config.log_format);

    let budgets = config.profile();
    info!(class = %budgets.class, host = %config.host, "bootstrap starting");

    // Configuration failures surface before any network call is made.
    if let Err(err) = config.validate() {
        error!(err = %err, "configuration invalid");
        let class = ErrorClass::of(&err);
        print_render(
            &RenderState::Error {
                message: class.user_message().to_string(),
            },
            args.json,
        )?;
        std::process::exit(1);
    }

    let backend = Arc::new(RestBackend::new(&config.backend_url, &config.api_key)?);
    vouchd::backend::install(backend.clone()).context("backend handle already installed")?;

    let ctx = BootstrapContext::new(config, backend);

    // Subscribe before the first attempt so no transition is missed while
    // a scheduled retry is pending.
    let mut changes = ctx.broadcaster.subscribe();
    ctx.reconciler.reconcile().await;

    let snapshot = loop {
        let snap = ctx.reconciler.snapshot().await;
        if matches!(snap.phase, Phase::Succeeded | Phase::Failed) {
            break snap;
        }
        match changes.recv().await {
            Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                break ctx.reconciler.snapshot().await
            }
        }
    };

    let render = gate::decide(&snapshot);
    print_render(&render, args.json)?;

    if matches!(render, RenderState::Error { .. }) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_render(render: &RenderState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(render)?);
        return Ok(());
    }
    match render {
        RenderState::App { role } => println!("authenticated — {role} shell"),
        RenderState::Login => println!("no active session — sign-in required"),
        RenderState::Error { message } => println!("error: {message}"),
        RenderState::Loading => println!("still loading"),
    }
    Ok(())
}

/// Initialize tracing for the process.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
fn setup_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}
