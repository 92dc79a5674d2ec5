//! Core data types shared across the reward, message, and agent layers.

use crate::address::Address;
use num_bigint::BigUint;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A registered node in the masternode registry, as announced on-chain.
///
/// Immutable from the core's point of view: the core only ever consumes a
/// snapshot handed to it by the registry oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Masternode {
    pub alias: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub collateral: BigUint,
    pub cra_address: Address,
    pub announcement_height: BigUint,
    pub activation_height: BigUint,
}

impl Masternode {
    pub fn is_active_at(&self, height: &BigUint) -> bool {
        height >= &self.activation_height
    }
}
