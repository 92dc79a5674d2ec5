//! Minimal demonstration binary: wires the masternode agent to static,
//! in-memory collaborators and runs until Ctrl+C. Chain sync, RPC, and the
//! rest of the node are external collaborators (see `SPEC_FULL.md` §1) and
//! are out of scope for this binary.

use async_trait::async_trait;
use masternode_core::address::Address;
use masternode_core::agent::{AgentDeps, MasternodeAgent};
use masternode_core::clock::SystemClock;
use masternode_core::config::MasternodeConfig;
use masternode_core::interfaces::{GossipBroadcaster, HeightOracle, RegistryOracle};
use masternode_core::liveness::LivenessTracker;
use masternode_core::message::{DismissVote, Heartbeat};
use masternode_core::types::Masternode;
use masternode_core::wallet::FileWalletSigner;
use num_bigint::BigUint;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct StaticHeight(AtomicU64);

#[async_trait]
impl HeightOracle for StaticHeight {
    async fn current_height(&self) -> BigUint {
        BigUint::from(self.0.load(Ordering::Relaxed))
    }
}

struct StaticRegistry(Vec<Masternode>);

#[async_trait]
impl RegistryOracle for StaticRegistry {
    async fn masternodes(&self) -> Vec<Masternode> {
        self.0.clone()
    }

    async fn masternode_by_address(&self, address: &Address) -> Option<Masternode> {
        self.0.iter().find(|mn| &mn.cra_address == address).cloned()
    }
}

struct LoggingGossip;

#[async_trait]
impl GossipBroadcaster for LoggingGossip {
    async fn broadcast_heartbeat(&self, heartbeat: &Heartbeat) {
        tracing::info!(timestamp = heartbeat.timestamp, "broadcast heartbeat");
    }

    async fn broadcast_dismiss_vote(&self, vote: &DismissVote) {
        tracing::info!(target = %vote.target_cra, "broadcast dismiss vote");
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

#[tokio::main]
async fn main() {
    setup_logging();

    let config = MasternodeConfig::load_from_file("masternode.toml").unwrap_or_else(|_| {
        tracing::warn!("no masternode.toml found, running with the agent disabled");
        MasternodeConfig::disabled()
    });

    if !config.enabled {
        tracing::info!("masternode agent disabled in config, exiting");
        return;
    }

    let wallet_signer = match FileWalletSigner::unlock("masternode-wallet.dat", &config.passphrase) {
        Ok(signer) => signer,
        Err(err) => {
            tracing::error!(%err, "failed to unlock masternode wallet");
            std::process::exit(1);
        }
    };

    let self_masternode = Masternode {
        alias: "self".to_string(),
        ipv4: None,
        ipv6: None,
        collateral: masternode_core::reward::min_collateral(),
        cra_address: config.cra_address,
        announcement_height: BigUint::from(0u32),
        activation_height: BigUint::from(0u32),
    };

    let deps = AgentDeps {
        height_oracle: Arc::new(StaticHeight(AtomicU64::new(0))),
        registry_oracle: Arc::new(StaticRegistry(vec![self_masternode])),
        wallet_signer: Arc::new(wallet_signer),
        gossip: Arc::new(LoggingGossip),
        clock: Arc::new(SystemClock),
        tracker: Arc::new(LivenessTracker::new(0)),
        heartbeat_interval_secs: config.heartbeat_interval_secs,
        watchdog_interval_secs: config.watchdog_interval_secs,
    };

    let handle = MasternodeAgent::start(deps);
    tracing::info!("masternode agent started");

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
    }

    tracing::info!("shutting down masternode agent");
    handle.stop().await;
}
