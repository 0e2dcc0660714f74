//! XMM trading engine binary.
//!
//! Loads configuration, applies command-line overrides, and runs the engine
//! until SIGINT. Live connectivity requires an external adapter crate; the
//! binary itself runs paper mode.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use xmm_core::config::AppConfig;
use xmm_core::logging::{init_tracing, LogFormat};
use xmm_engine::EngineBuilder;

/// XMM market-making engine.
#[derive(Parser, Debug)]
#[command(name = "xmm-engine", about = "XMM cross-exchange market-making engine")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Symbol override (e.g. BTCUSDT).
    #[arg(short, long)]
    symbol: Option<String>,

    /// Exchange override (e.g. binance).
    #[arg(short, long)]
    exchange: Option<String>,

    /// Use testnet endpoints.
    #[arg(short, long)]
    testnet: bool,

    /// Paper trading (simulated execution).
    #[arg(short, long)]
    paper: bool,

    /// Verbose logging (pretty output, debug level).
    #[arg(short, long)]
    verbose: bool,
}

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signal: libc::c_int) {
    STOP.store(true, Ordering::SeqCst);
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        init_tracing(LogFormat::Pretty, "debug");
    } else {
        init_tracing(LogFormat::Json, "info");
    }

    let mut config = AppConfig::load(args.config)?;
    if args.testnet {
        config.exchange.testnet = true;
    }
    if args.paper {
        config.trading.paper = true;
    }
    if let Some(symbol) = args.symbol {
        config.trading.symbol = symbol;
    }
    if let Some(exchange) = args.exchange {
        config.exchange.name = exchange;
    }

    let engine = EngineBuilder::new().config(config.clone()).build()?;

    tracing::info!(
        symbol = %config.trading.symbol,
        exchange = %config.exchange.name,
        paper = config.trading.paper,
        testnet = config.exchange.testnet,
        "starting xmm-engine"
    );

    let handler = handle_sigint as extern "C" fn(libc::c_int);
    // SAFETY: installs a signal handler that only stores into an atomic.
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }

    engine.start()?;
    while !STOP.load(Ordering::SeqCst) && engine.is_running() {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    tracing::info!("shutdown requested");
    engine.stop();
    Ok(())
}
