//! `regex-match-sandbox` server binary.
//!
//! Loads the guest module once, then serves the `regexp-match` MCP tool over
//! streamable HTTP until interrupted.
//!
//! ```bash
//! regex-match-sandbox --port 12030 --path2engine ./assets/regex_guest.wasm --mem 64 --timeout 100
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use regex_match_sandbox::server::{router, RegexMatchServer, MCP_PATH};
use regex_match_sandbox::{PatternSandbox, SandboxConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Serve regular expression matching over MCP from a WebAssembly sandbox.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "REGEX_MATCH_PORT", default_value_t = 12030)]
    port: u16,

    /// Path to the WASM regex engine.
    #[arg(
        long = "path2engine",
        env = "REGEX_MATCH_ENGINE",
        default_value = "./assets/regex_guest.wasm"
    )]
    engine_path: PathBuf,

    /// WASM memory limit in MiB.
    #[arg(long, env = "REGEX_MATCH_MEM_MIB", default_value_t = 64)]
    mem: u64,

    /// WASM execution timeout in milliseconds.
    #[arg(long, env = "REGEX_MATCH_TIMEOUT_MS", default_value_t = 100)]
    timeout: u64,

    /// Interval between epoch interruption checks, in milliseconds.
    #[arg(long, default_value_t = 5)]
    epoch_tick_ms: u64,
}

impl Args {
    fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::builder()
            .module_path(&self.engine_path)
            .memory_limit_mib(self.mem)
            .timeout(Duration::from_millis(self.timeout))
            .epoch_tick_interval(Duration::from_millis(self.epoch_tick_ms))
            .build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let args = Args::parse();
    let config = args.sandbox_config();
    let timeout = config.timeout;

    let sandbox = match PatternSandbox::new(config) {
        Ok(sandbox) => Arc::new(sandbox),
        Err(e) => {
            tracing::error!(error = %e, "failed to create WASI pattern tester");
            return Err(e).context("failed to load guest module");
        }
    };

    let result = serve(Arc::clone(&sandbox), timeout, args.port).await;
    sandbox.shutdown();
    result
}

async fn serve(sandbox: Arc<PatternSandbox>, timeout: Duration, port: u16) -> Result<()> {
    let app = router(RegexMatchServer::new(sandbox, timeout));

    let address = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to listen on {address}"))?;

    tracing::info!(%address, path = MCP_PATH, "ready to serve MCP over HTTP");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    tracing::info!("server shutdown complete");
    Ok(())
}
