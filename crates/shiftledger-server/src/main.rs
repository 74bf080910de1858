//! shiftledger-server — the service binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the store
//!   2. Seed the system company and default role permissions if fresh
//!   3. Resolve the token-signing secret (flag → env → persisted random)
//!   4. Start the JSON-RPC 2.0 server
//!   5. Wait for ctrl-c, then stop and flush

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use shiftledger_auth::LogEmailSender;
use shiftledger_core::clock::{Clock, SystemClock};
use shiftledger_crypto::TokenCodec;
use shiftledger_rpc::{RpcServer, RpcServerState};
use shiftledger_store::{seed_defaults, Store};

#[derive(Parser, Debug)]
#[command(
    name = "shiftledger-server",
    version,
    about = "Shiftledger — the time-and-pay ledger for hourly teams"
)]
struct Args {
    /// Directory for the persistent store.
    #[arg(long, default_value = "~/.shiftledger/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8787")]
    rpc_addr: SocketAddr,

    /// Token-signing secret (hex). Falls back to $SHIFTLEDGER_JWT_SECRET,
    /// then to a random secret persisted in the store.
    #[arg(long)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shiftledger=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("shiftledger server starting");

    // ── Store ────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(Store::open(&data_dir).context("opening store")?);

    let clock = Arc::new(SystemClock);
    if seed_defaults(&store, clock.now())? {
        info!("fresh store — defaults seeded");
    }

    // ── Signing secret ───────────────────────────────────────────────────────
    let secret = resolve_secret(&args, &store)?;
    let codec = Arc::new(TokenCodec::new(&secret));

    // ── RPC ──────────────────────────────────────────────────────────────────
    let state = Arc::new(RpcServerState::new(
        store.clone(),
        clock,
        codec,
        Arc::new(LogEmailSender),
    ));
    let handle = RpcServer::new(state).start(args.rpc_addr).await?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    let _ = handle.stop();
    handle.stopped().await;
    store.flush()?;
    Ok(())
}

/// Flag wins, then the environment, then a random secret minted once and
/// kept in the store's meta tree so restarts keep sessions valid.
fn resolve_secret(args: &Args, store: &Store) -> anyhow::Result<Vec<u8>> {
    if let Some(hex_secret) = &args.jwt_secret {
        return hex::decode(hex_secret).context("decoding --jwt-secret");
    }
    if let Ok(env_secret) = std::env::var("SHIFTLEDGER_JWT_SECRET") {
        return Ok(env_secret.into_bytes());
    }
    if let Some(stored) = store.get_meta("jwt_secret")? {
        return Ok(stored);
    }
    let mut fresh = vec![0u8; 32];
    OsRng.fill_bytes(&mut fresh);
    store.put_meta("jwt_secret", &fresh)?;
    info!("minted a fresh token-signing secret");
    Ok(fresh)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
