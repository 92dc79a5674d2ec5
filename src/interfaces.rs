//! Capability traits the agent depends on, in place of the original
//! implementation's global singleton accessors. Each capability is a narrow
//! async trait; production wiring and test fakes both implement these, never
//! anything wider.

use crate::address::Address;
use crate::error::MasternodeError;
use crate::message::{DismissVote, Heartbeat};
use crate::types::Masternode;
use async_trait::async_trait;
use num_bigint::BigUint;

/// Read access to the current chain height.
#[async_trait]
pub trait HeightOracle: Send + Sync {
    async fn current_height(&self) -> BigUint;
}

/// Read access to the on-chain masternode registry.
#[async_trait]
pub trait RegistryOracle: Send + Sync {
    /// Snapshot of every registered masternode, active or not; callers filter
    /// by `Masternode::is_active_at`.
    async fn masternodes(&self) -> Vec<Masternode>;

    /// Look up a single masternode by its CRA address.
    async fn masternode_by_address(&self, address: &Address) -> Option<Masternode>;
}

/// Local node identity and signing capability.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// This node's own CRA address, if it is running as a masternode.
    fn cra_address(&self) -> Address;

    async fn sign_heartbeat(&self, timestamp: u64) -> Result<Heartbeat, MasternodeError>;

    async fn sign_dismiss_vote(
        &self,
        target_cra: Address,
        expiration_height: u64,
        reason: crate::message::Reason,
        timestamp: u64,
    ) -> Result<DismissVote, MasternodeError>;
}

/// Outbound gossip: hands a signed message to the network layer for
/// propagation. The core never blocks on delivery confirmation.
#[async_trait]
pub trait GossipBroadcaster: Send + Sync {
    async fn broadcast_heartbeat(&self, heartbeat: &Heartbeat);
    async fn broadcast_dismiss_vote(&self, vote: &DismissVote);
}

pub use crate::clock::Clock;
