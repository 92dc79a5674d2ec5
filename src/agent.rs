//! L3 owner — the masternode agent: heartbeat emission, peer watchdog,
//! inbound dismissal-vote bookkeeping, and quorum-triggered dismissal.

use crate::address::Address;
use crate::clock::Clock;
use crate::constants::masternode::{
    DEFAULT_EXPIRATION_BLOCKS, MAX_INTERVAL_SECS, MIN_QUORUM, QUORUM_ACTIVE_SET_THRESHOLD,
    QUORUM_DENOMINATOR, QUORUM_NUMERATOR, REASON_NO_HEARTBEATS,
};
use crate::error::MasternodeError;
use crate::interfaces::{GossipBroadcaster, HeightOracle, RegistryOracle, WalletSigner};
use crate::liveness::LivenessTracker;
use crate::message::{DismissVote, Reason};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `quorum(n_active) = MIN_QUORUM if n_active <= threshold else floor(9 * n_active / 10)`.
pub fn quorum(n_active: u64) -> u64 {
    if n_active <= QUORUM_ACTIVE_SET_THRESHOLD {
        MIN_QUORUM
    } else {
        (QUORUM_NUMERATOR * n_active) / QUORUM_DENOMINATOR
    }
}

/// One target's vote bundle plus the idempotency latch that makes a
/// quorum-crossing dismissal event fire exactly once per crossing.
#[derive(Default)]
struct EnemyEntry {
    votes: Vec<DismissVote>,
    dismissed: bool,
}

struct AgentState {
    enemies: HashMap<Address, EnemyEntry>,
}

/// Everything the agent needs from the outside world, gathered so
/// `start()` takes one bundle instead of five positional arguments.
pub struct AgentDeps {
    pub height_oracle: Arc<dyn HeightOracle>,
    pub registry_oracle: Arc<dyn RegistryOracle>,
    pub wallet_signer: Arc<dyn WalletSigner>,
    pub gossip: Arc<dyn GossipBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub tracker: Arc<LivenessTracker>,
    /// Heartbeat emission period; from `MasternodeConfig::heartbeat_interval_secs`.
    pub heartbeat_interval_secs: u64,
    /// Watchdog sweep period; from `MasternodeConfig::watchdog_interval_secs`.
    pub watchdog_interval_secs: u64,
}

/// A running masternode agent. Created by `start`, torn down by `stop`.
pub struct MasternodeAgent {
    deps: AgentDeps,
    state: Mutex<AgentState>,
}

/// Owns the spawned loops and the shutdown signal for one `MasternodeAgent`.
/// Dropping this without calling `stop` leaves the loops running; `stop`
/// is the only supported teardown path.
pub struct AgentHandle {
    agent: Arc<MasternodeAgent>,
    shutdown: watch::Sender<bool>,
    heartbeat_task: JoinHandle<()>,
    watchdog_task: JoinHandle<()>,
}

impl AgentHandle {
    pub fn agent(&self) -> &Arc<MasternodeAgent> {
        &self.agent
    }

    /// Signals shutdown and awaits both loops' termination, so the caller
    /// never observes a torn agent mid-tick.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.heartbeat_task.await;
        let _ = self.watchdog_task.await;
    }
}

impl MasternodeAgent {
    /// `start(deps) -> AgentHandle`; requires `config.enabled` (checked by
    /// the caller — see `crate::config`) and spawns the heartbeat and
    /// watchdog loops.
    pub fn start(deps: AgentDeps) -> AgentHandle {
        let agent = Arc::new(MasternodeAgent {
            deps,
            state: Mutex::new(AgentState {
                enemies: HashMap::new(),
            }),
        });

        let (shutdown_tx, shutdown_rx_hb) = watch::channel(false);
        let shutdown_rx_wd = shutdown_tx.subscribe();
        let heartbeat_period = agent.deps.heartbeat_interval_secs;
        let watchdog_period = agent.deps.watchdog_interval_secs;

        let heartbeat_task = {
            let agent = agent.clone();
            let mut shutdown_rx = shutdown_rx_hb;
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(std::time::Duration::from_secs(heartbeat_period));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            agent.heartbeat_tick().await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() { break; }
                        }
                    }
                }
            })
        };

        let watchdog_task = {
            let agent = agent.clone();
            let mut shutdown_rx = shutdown_rx_wd;
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(std::time::Duration::from_secs(watchdog_period));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            agent.watchdog_tick().await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() { break; }
                        }
                    }
                }
            })
        };

        AgentHandle {
            agent,
            shutdown: shutdown_tx,
            heartbeat_task,
            watchdog_task,
        }
    }

    async fn active_masternodes(&self, height: &BigUint) -> Vec<crate::types::Masternode> {
        self.deps
            .registry_oracle
            .masternodes()
            .await
            .into_iter()
            .filter(|mn| mn.is_active_at(height))
            .collect()
    }

    async fn is_self_active(&self, height: &BigUint) -> bool {
        let me = self.deps.wallet_signer.cra_address();
        self.active_masternodes(height)
            .await
            .iter()
            .any(|mn| mn.cra_address == me)
    }

    async fn heartbeat_tick(&self) {
        let height = self.deps.height_oracle.current_height().await;
        if !self.is_self_active(&height).await {
            debug!("heartbeat tick skipped: self not active");
            return;
        }
        let now = self.deps.clock.now_unix();
        match self.deps.wallet_signer.sign_heartbeat(now).await {
            Ok(hb) => self.deps.gossip.broadcast_heartbeat(&hb).await,
            Err(err) => warn!(%err, "heartbeat signing failed, skipping tick"),
        }
    }

    async fn watchdog_tick(&self) {
        let height = self.deps.height_oracle.current_height().await;
        if !self.is_self_active(&height).await {
            debug!("watchdog tick skipped: self not active");
            return;
        }
        let me = self.deps.wallet_signer.cra_address();
        let now = self.deps.clock.now_unix();
        let active = self.active_masternodes(&height).await;

        for peer in &active {
            if peer.cra_address == me {
                continue;
            }
            let last_seen = self.deps.tracker.last_seen(&peer.cra_address);
            if now > last_seen + MAX_INTERVAL_SECS {
                let expiration_height = (&height + BigUint::from(DEFAULT_EXPIRATION_BLOCKS))
                    .to_u64()
                    .unwrap_or(u64::MAX);
                let reason = Reason {
                    code: REASON_NO_HEARTBEATS,
                    description: String::new(),
                };
                match self
                    .deps
                    .wallet_signer
                    .sign_dismiss_vote(peer.cra_address, expiration_height, reason, now)
                    .await
                {
                    Ok(vote) => {
                        self.deps.gossip.broadcast_dismiss_vote(&vote).await;
                        self.add_my_enemy(vote).await;
                    }
                    Err(err) => warn!(%err, target = %peer.cra_address, "dismiss vote signing failed"),
                }
            } else {
                self.forgive_my_enemy(peer.cra_address, REASON_NO_HEARTBEATS).await;
            }
        }

        self.prune_expired_votes(&height).await;
        let crossed = self.try_execute_dismissals(active.len() as u64).await;
        for target in crossed {
            info!(target = %target, "dismissal quorum reached");
        }
    }

    /// Our own vote against `target`, inserted unconditionally (`my_vote = true`).
    async fn add_my_enemy(&self, vote: DismissVote) {
        let mut state = self.state.lock().await;
        Self::insert_vote_locked(&mut state, vote, true);
    }

    /// Revokes our own vote against `target` with the given reason code, if
    /// one exists; drops the target entirely once no self vote remains.
    async fn forgive_my_enemy(&self, target: Address, reason_code: u32) {
        let me = self.deps.wallet_signer.cra_address();
        let mut state = self.state.lock().await;
        let Some(entry) = state.enemies.get_mut(&target) else {
            return;
        };
        if let Some(pos) = entry.votes.iter().position(|v| {
            v.reason.code == reason_code && v.recover_signer().ok() == Some(me)
        }) {
            entry.votes.remove(pos);
        }
        let any_self_left = entry
            .votes
            .iter()
            .any(|v| v.recover_signer().ok() == Some(me));
        if !any_self_left {
            state.enemies.remove(&target);
        }
    }

    fn insert_vote_locked(state: &mut AgentState, vote: DismissVote, my_vote: bool) -> (bool, bool) {
        let target = vote.target_cra;
        if !state.enemies.contains_key(&target) && !my_vote {
            return (false, false);
        }
        let signer = match vote.recover_signer() {
            Ok(addr) => addr,
            Err(_) => return (false, false),
        };
        let entry = state.enemies.entry(target).or_default();
        if let Some(existing) = entry.votes.iter_mut().find(|v| {
            v.reason.code == vote.reason.code && v.recover_signer().ok() == Some(signer)
        }) {
            *existing = vote;
            return (true, true);
        }
        entry.votes.push(vote);
        (true, false)
    }

    /// Inbound vote handling: `on_dismiss_vote(vote, current_height) -> (relay, err?)`.
    ///
    /// Callers without a running agent never reach this method — they relay
    /// unconditionally, per the original contract's "not running an agent"
    /// branch.
    pub async fn on_dismiss_vote(
        &self,
        vote: DismissVote,
        current_height: &BigUint,
    ) -> Result<bool, MasternodeError> {
        let signer = vote.recover_signer()?;
        let active = self.active_masternodes(current_height).await;
        if !active.iter().any(|mn| mn.cra_address == signer) {
            return Err(MasternodeError::MasternodeNotFound);
        }

        self.prune_expired_votes(current_height).await;
        let inserted = {
            let mut state = self.state.lock().await;
            Self::insert_vote_locked(&mut state, vote, false).0
        };
        self.prune_expired_votes(current_height).await;
        self.try_execute_dismissals(active.len() as u64).await;
        Ok(inserted)
    }

    /// Removes votes whose signer is no longer active, or whose
    /// `expiration_height >= current_height`. The inclusive comparison is
    /// the documented source behavior (see `SPEC_FULL.md` §9/§10).
    async fn prune_expired_votes(&self, current_height: &BigUint) {
        let active = self.active_masternodes(current_height).await;
        let mut state = self.state.lock().await;
        for entry in state.enemies.values_mut() {
            entry.votes.retain(|v| {
                if BigUint::from(v.expiration_height) >= *current_height {
                    return false;
                }
                match v.recover_signer() {
                    Ok(signer) => active.iter().any(|mn| mn.cra_address == signer),
                    Err(_) => false,
                }
            });
        }
    }

    /// Flags every target whose vote count has just crossed `quorum`, and
    /// clears the latch for any target that has fallen back under it.
    /// Returns the targets newly crossing quorum this call.
    async fn try_execute_dismissals(&self, n_active: u64) -> Vec<Address> {
        let threshold = quorum(n_active);
        let mut state = self.state.lock().await;
        let mut newly_dismissed = Vec::new();
        for (target, entry) in state.enemies.iter_mut() {
            let meets = entry.votes.len() as u64 >= threshold;
            if meets && !entry.dismissed {
                entry.dismissed = true;
                newly_dismissed.push(*target);
            } else if !meets && entry.dismissed {
                entry.dismissed = false;
            }
        }
        newly_dismissed
    }

    #[cfg(test)]
    async fn enemy_vote_count(&self, target: &Address) -> usize {
        self.state
            .lock()
            .await
            .enemies
            .get(target)
            .map(|e| e.votes.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    async fn is_dismissed(&self, target: &Address) -> bool {
        self.state
            .lock()
            .await
            .enemies
            .get(target)
            .map(|e| e.dismissed)
            .unwrap_or(false)
    }

    #[cfg(test)]
    async fn has_enemy(&self, target: &Address) -> bool {
        self.state.lock().await.enemies.contains_key(target)
    }
}
