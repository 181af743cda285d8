//! `frusvcd` – FRU inventory daemon.
//!
//! 1. Loads `~/.frusvc/config.toml` (or `--config <path>`), applying
//!    `FRUSVC_*` environment overrides.
//! 2. Builds the object tree with the configured roots and attaches the
//!    bootstrap discovery documents.
//! 3. Serves `addFRU` / `resetTree` / `removeFRU` / `getObject` calls over
//!    WebSocket until Ctrl-C or `/quit`.
//! 4. Unless `--headless`, runs the operator console on stdin.

mod bootstrap;
mod config;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use colored::Colorize;
use frusvc_description::JsonDescriptionParser;
use frusvc_service::{Dispatcher, FruServer, FruService, init_tracing};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "FRU hierarchical inventory service")]
struct Cli {
    /// Configuration file (default: ~/.frusvc/config.toml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serve calls without the interactive console.
    #[arg(long, default_value_t = false)]
    headless: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    print_banner();

    // Must run before the runtime exists; see telemetry::build_provider.
    let telemetry = init_tracing("frusvcd");
    info!(exporting = telemetry.is_exporting(), "tracing initialised");

    let loaded = match config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    match &loaded.source {
        Some(path) => println!("  Config loaded from {}", path.display().to_string().bold()),
        None => println!("  No config file found, using defaults."),
    }
    let cfg = &loaded.config;

    // ── Object tree ───────────────────────────────────────────────────────
    let service = match FruService::with_roots(&cfg.roots) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "invalid root configuration");
            println!("{}: {}", "Invalid roots".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let parser = Arc::new(JsonDescriptionParser::with_limits(cfg.limits()));
    info!(
        max_depth = parser.limits().max_depth,
        max_nodes = parser.limits().max_nodes,
        "description limits"
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&service), parser));

    let attached = bootstrap::attach_all(&dispatcher, &cfg.bootstrap, &loaded.base_dir());
    if !cfg.bootstrap.is_empty() {
        println!(
            "  Bootstrap: {}/{} document(s) attached",
            attached,
            cfg.bootstrap.len()
        );
    }

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let ctrlc_stop = Arc::clone(&stop_tx);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        ctrlc_stop.send_replace(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with /quit instead");
    }

    // ── Server ────────────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Runtime error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let server = FruServer::new(Arc::clone(&dispatcher))
        .with_bind_address(cfg.bind_address)
        .with_port(cfg.port);
    let bound = match runtime.block_on(server.bind()) {
        Ok(bound) => bound,
        Err(e) => {
            println!("{}: {}", "Server error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = bound.local_addr() {
        println!("  Serving calls on {}", format!("ws://{addr}").bold());
    }

    // ── Operator console ──────────────────────────────────────────────────
    if !cli.headless {
        println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
        let console_dispatcher = Arc::clone(&dispatcher);
        let console_stop = Arc::clone(&stop_tx);
        if let Err(e) = thread::Builder::new()
            .name("console".into())
            .spawn(move || repl::run(console_dispatcher, console_stop))
        {
            warn!(error = %e, "console unavailable");
        }
    }

    let result = runtime.block_on(bound.serve(stop_rx));
    drop(runtime);

    match result {
        Ok(()) => {
            info!(objects = service.node_count().unwrap_or(0), "FRU service stopped");
            println!("{}", "  ✓ Exiting frusvcd.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___               "#.bold().cyan());
    println!("{}", r#"   / __\ __ _   _     "#.bold().cyan());
    println!("{}", r#"  / _\| '__| | | |    "#.bold().cyan());
    println!("{}", r#" / /  | |  | |_| |    "#.bold().cyan());
    println!("{}", r#" \/   |_|   \__,_|    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "frusvcd".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Field-replaceable unit inventory service");
    println!();
}
