//! L3 shared component — tracks the last heartbeat seen from every peer.
//!
//! Lives independently of the agent: any node, masternode or not, can hold a
//! `LivenessTracker` to decide whether to relay a heartbeat.

use crate::address::Address;
use crate::constants::masternode::{MAX_FUTURE_SKEW_SECS, MIN_INTERVAL_SECS};
use crate::error::MasternodeError;
use crate::message::Heartbeat;
use crate::types::Masternode;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::Mutex;

/// Last-seen bookkeeping for one peer.
#[derive(Clone, Debug)]
pub struct MasternodeTrack {
    pub last_observed: u64,
    pub last_heartbeat: Heartbeat,
}

/// `{ tracks, tracking_start, mutex }`. Entries are added/updated on accepted
/// heartbeats and never pruned — a stale entry is harmless since the
/// watchdog compares wall-clock deadlines, not map presence.
pub struct LivenessTracker {
    tracks: Mutex<HashMap<Address, MasternodeTrack>>,
    tracking_start: u64,
}

impl LivenessTracker {
    pub fn new(now: u64) -> Self {
        Self {
            tracks: Mutex::new(HashMap::new()),
            tracking_start: now,
        }
    }

    pub fn tracking_start(&self) -> u64 {
        self.tracking_start
    }

    /// Last-observed instant for `address`, falling back to `tracking_start`
    /// when nothing has ever been recorded (per §4.4's watchdog rule).
    pub fn last_seen(&self, address: &Address) -> u64 {
        self.tracks
            .lock()
            .expect("liveness tracker mutex poisoned")
            .get(address)
            .map(|t| t.last_observed)
            .unwrap_or(self.tracking_start)
    }

    pub fn last_heartbeat(&self, address: &Address) -> Option<Heartbeat> {
        self.tracks
            .lock()
            .expect("liveness tracker mutex poisoned")
            .get(address)
            .map(|t| t.last_heartbeat.clone())
    }

    /// `on_heartbeat(hb, current_height) -> (accept, err?)`.
    ///
    /// `Ok(false)` is the silent too-early rejection (§4.3 step 4); every
    /// other rejection is a tagged error. `active_masternodes` must already
    /// be filtered (or not) by the caller's height — membership is re-checked
    /// here against `current_height`.
    pub fn on_heartbeat(
        &self,
        hb: &Heartbeat,
        current_height: &BigUint,
        active_masternodes: &[Masternode],
        now: u64,
    ) -> Result<bool, MasternodeError> {
        let signer = hb.recover_signer()?;

        let is_active = active_masternodes
            .iter()
            .any(|mn| mn.cra_address == signer && mn.is_active_at(current_height));
        if !is_active {
            return Err(MasternodeError::MasternodeNotFound);
        }

        if now + MAX_FUTURE_SKEW_SECS < hb.timestamp {
            return Err(MasternodeError::TooFarInFuture);
        }

        let mut tracks = self.tracks.lock().expect("liveness tracker mutex poisoned");
        if let Some(prev) = tracks.get(&signer) {
            if prev.last_heartbeat.timestamp + MIN_INTERVAL_SECS > hb.timestamp {
                return Ok(false);
            }
        }

        tracks.insert(
            signer,
            MasternodeTrack {
                last_observed: now,
                last_heartbeat: hb.clone(),
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn signer_pair() -> (SecretKey, Address) {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut OsRng);
        let uncompressed = PublicKey::from_secret_key(&secp, &sk).serialize_uncompressed();
        let _ = pk;
        let mut body = [0u8; 64];
        body.copy_from_slice(&uncompressed[1..]);
        (sk, Address::from_uncompressed_pubkey_body(&body))
    }

    fn active_set(addr: Address) -> Vec<Masternode> {
        vec![Masternode {
            alias: "mn".to_string(),
            ipv4: None,
            ipv6: None,
            collateral: crate::reward::min_collateral(),
            cra_address: addr,
            announcement_height: BigUint::from(0u32),
            activation_height: BigUint::from(0u32),
        }]
    }

    #[test]
    fn rejects_unknown_signer() {
        let (sk, _addr) = signer_pair();
        let tracker = LivenessTracker::new(1_000_000);
        let hb = Heartbeat::sign(1_000_000, &sk);
        let err = tracker
            .on_heartbeat(&hb, &BigUint::from(0u32), &[], 1_000_000)
            .unwrap_err();
        assert!(matches!(err, MasternodeError::MasternodeNotFound));
    }

    // Scenario E: heartbeat admission boundaries.
    #[test]
    fn scenario_e_admission_boundaries() {
        let (sk, addr) = signer_pair();
        let active = active_set(addr);
        let tracker = LivenessTracker::new(900_000);

        let prev = Heartbeat::sign(1_000_000, &sk);
        assert!(tracker
            .on_heartbeat(&prev, &BigUint::from(0u32), &active, 1_000_000)
            .unwrap());

        // Exactly prev + MIN_INTERVAL: accepted.
        let hb_ok = Heartbeat::sign(1_001_800, &sk);
        assert!(tracker
            .on_heartbeat(&hb_ok, &BigUint::from(0u32), &active, 1_001_800)
            .unwrap());

        // One second short: rejected silently.
        let (sk2, addr2) = signer_pair();
        let active2 = active_set(addr2);
        let tracker2 = LivenessTracker::new(900_000);
        let prev2 = Heartbeat::sign(1_000_000, &sk2);
        assert!(tracker2
            .on_heartbeat(&prev2, &BigUint::from(0u32), &active2, 1_000_000)
            .unwrap());
        let hb_early = Heartbeat::sign(1_001_799, &sk2);
        assert!(!tracker2
            .on_heartbeat(&hb_early, &BigUint::from(0u32), &active2, 1_001_800)
            .unwrap());

        // Too far in the future relative to `now`.
        let (sk3, addr3) = signer_pair();
        let active3 = active_set(addr3);
        let tracker3 = LivenessTracker::new(900_000);
        let hb_future = Heartbeat::sign(1_005_401, &sk3);
        let err = tracker3
            .on_heartbeat(&hb_future, &BigUint::from(0u32), &active3, 1_001_800)
            .unwrap_err();
        assert!(matches!(err, MasternodeError::TooFarInFuture));
    }

    #[test]
    fn last_seen_falls_back_to_tracking_start() {
        let (_sk, addr) = signer_pair();
        let tracker = LivenessTracker::new(12345);
        assert_eq!(tracker.last_seen(&addr), 12345);
    }
}
