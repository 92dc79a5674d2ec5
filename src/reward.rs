//! L1 — deterministic, stateless reward election.
//!
//! Ported field-for-field from the original masternode reward algorithm.
//! No I/O, no concurrency; a pure function of `(masternodes, height)`.

use crate::constants::masternode::MIN_COLLATERAL_WHOLE;
use crate::error::MasternodeError;
use crate::types::Masternode;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use sha2::{Digest, Sha256};

/// `10_000 * UNIT`, the minimum collateral / unit of one reward slot.
pub fn min_collateral() -> BigUint {
    BigUint::from(MIN_COLLATERAL_WHOLE) * BigUint::from(crate::constants::masternode::UNIT)
}

/// A half-open interval `[start, start + size)` on the reward line, tagged
/// with the masternode that owns it.
struct RewardSegment<'a> {
    masternode: &'a Masternode,
    start: BigUint,
    size: BigUint,
}

/// The built reward line for one round: contiguous segments plus the step
/// size and round length used to compute the reward point.
struct RewardsRound<'a> {
    line: Vec<RewardSegment<'a>>,
    step: BigUint,
    length: u64,
}

fn filter_active<'a>(masternodes: &'a [Masternode], height: &BigUint) -> Vec<&'a Masternode> {
    masternodes.iter().filter(|mn| mn.is_active_at(height)).collect()
}

fn build_rewards_round<'a>(
    masternodes: &[&'a Masternode],
) -> Result<RewardsRound<'a>, MasternodeError> {
    let whole: BigUint = masternodes.iter().fold(BigUint::zero(), |acc, mn| acc + &mn.collateral);

    let min_collateral = min_collateral();
    let mut round_len = &whole / &min_collateral;
    if &whole % &min_collateral != BigUint::zero() {
        round_len += 1u32;
    }

    let round_len_u64 = round_len.to_u64().ok_or(MasternodeError::RoundTooLarge)?;

    let mut sorted: Vec<&Masternode> = masternodes.to_vec();
    sorted.sort_by(|a, b| {
        a.announcement_height
            .cmp(&b.announcement_height)
            .then_with(|| a.cra_address.cmp(&b.cra_address))
    });

    let mut line = Vec::with_capacity(sorted.len());
    let mut cursor = BigUint::zero();
    for mn in sorted {
        let start = cursor.clone();
        cursor += &mn.collateral;
        line.push(RewardSegment {
            masternode: mn,
            start,
            size: mn.collateral.clone(),
        });
    }

    let step = &whole / &round_len;

    Ok(RewardsRound {
        line,
        step,
        length: round_len_u64,
    })
}

/// Big-endian minimal-byte encoding: zero encodes as the empty byte string.
/// Matches `BigUint::to_bytes_be`, which already drops leading zero bytes and
/// returns `[0]` (not empty) for zero — so zero is special-cased here.
fn minimal_be_bytes(n: &BigUint) -> Vec<u8> {
    if n.is_zero() {
        Vec::new()
    } else {
        n.to_bytes_be()
    }
}

fn calc_reward_point(round: &RewardsRound, height: &BigUint) -> BigUint {
    let length = BigUint::from(round.length);
    let round_index = height % &length;
    let round_id = height - &round_index;

    let hash = Sha256::digest(minimal_be_bytes(&round_id));
    let offset = BigUint::from_bytes_be(&hash) % &round.step;

    round_index * &round.step + offset
}

fn find_point_in_round<'a>(round: &'a RewardsRound, point: &BigUint) -> Option<&'a Masternode> {
    round
        .line
        .iter()
        .find(|seg| &seg.start <= point && point < &(&seg.start + &seg.size))
        .map(|seg| seg.masternode)
}

/// `find_winner(masternodes, height) -> Masternode | NoWinner | RoundTooLarge`.
pub fn find_winner(
    masternodes: &[Masternode],
    height: &BigUint,
) -> Result<Masternode, MasternodeError> {
    let active = filter_active(masternodes, height);
    if active.is_empty() {
        return Err(MasternodeError::NoWinner);
    }

    let round = build_rewards_round(&active)?;
    let point = calc_reward_point(&round, height);

    find_point_in_round(&round, &point)
        .cloned()
        .ok_or(MasternodeError::NoWinner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    fn mn(alias: &str, collateral_units: u64, announce: u64, activate: u64, tag: u8) -> Masternode {
        Masternode {
            alias: alias.to_string(),
            ipv4: None,
            ipv6: None,
            collateral: BigUint::from(collateral_units) * BigUint::from(crate::constants::masternode::UNIT),
            cra_address: Address::new([tag; 20]),
            announcement_height: BigUint::from(announce),
            activation_height: BigUint::from(activate),
        }
    }

    #[test]
    fn empty_active_set_is_no_winner() {
        let mns = vec![mn("a", 10_000, 0, 100, 1)];
        let err = find_winner(&mns, &BigUint::from(0u32)).unwrap_err();
        assert!(matches!(err, MasternodeError::NoWinner));
    }

    #[test]
    fn single_masternode_wins_every_height_past_activation() {
        let mns = vec![mn("a", 10_000, 0, 5, 1)];
        for h in 5u64..50 {
            let winner = find_winner(&mns, &BigUint::from(h)).unwrap();
            assert_eq!(winner.alias, "a");
        }
    }

    // Scenario A: reward point arithmetic with step=10^32, length=20,
    // verified against the exact values from the spec's worked example.
    #[test]
    fn scenario_a_reward_point_arithmetic() {
        let step = BigUint::from(10u32).pow(32);
        let length = 20u64;
        let round = RewardsRound {
            line: vec![],
            step: step.clone(),
            length,
        };

        let cases: &[(u64, &str)] = &[
            (0, "48198034993379397001115665086549"),
            (5, "548198034993379397001115665086549"),
            (19, "1948198034993379397001115665086549"),
            (20, "92190392920402856263689962707065"),
            (25, "592190392920402856263689962707065"),
            (39, "1992190392920402856263689962707065"),
        ];

        for &(height, expected) in cases {
            let point = calc_reward_point(&round, &BigUint::from(height));
            assert_eq!(point.to_str_radix(10), expected, "height={height}");
        }
    }

    // Scenario B: three-masternode normal schedule.
    #[test]
    fn scenario_b_three_masternode_schedule() {
        let mns = vec![
            mn("mn0", 10_001, 0, 4, 0),
            mn("mn1", 20_000, 10, 14, 1),
            mn("mn2", 30_000, 20, 24, 2),
        ];

        for h in 0u64..4 {
            assert!(find_winner(&mns, &BigUint::from(h)).is_err());
        }
        for h in 4u64..14 {
            assert_eq!(find_winner(&mns, &BigUint::from(h)).unwrap().alias, "mn0");
        }
        assert_eq!(find_winner(&mns, &BigUint::from(14u64)).unwrap().alias, "mn1");

        let expected_15_24 = ["mn0", "mn1", "mn1", "mn0", "mn1", "mn1", "mn0", "mn0", "mn1", "mn0"];
        for (i, alias) in expected_15_24.iter().enumerate() {
            let h = 15 + i as u64;
            assert_eq!(&find_winner(&mns, &BigUint::from(h)).unwrap().alias, alias, "height={h}");
        }

        let expected_25_39 = [
            "mn0", "mn1", "mn2", "mn0", "mn1", "mn1", "mn2", "mn0", "mn0", "mn1", "mn2", "mn0",
            "mn1", "mn2", "mn2",
        ];
        for (i, alias) in expected_25_39.iter().enumerate() {
            let h = 25 + i as u64;
            assert_eq!(&find_winner(&mns, &BigUint::from(h)).unwrap().alias, alias, "height={h}");
        }
    }

    // Scenario C: FIFO equal-collateral schedule.
    #[test]
    fn scenario_c_fifo_equal_collateral() {
        for &n in &[2u64, 5, 10, 100, 1000] {
            let mns: Vec<Masternode> = (0..n)
                .map(|i| mn(&format!("mn{i}"), 10_000, i, i + 1, i as u8))
                .collect();

            for h in n..(n + n.min(50)) {
                let winner = find_winner(&mns, &BigUint::from(h)).unwrap();
                let expected = h % n;
                assert_eq!(winner.alias, format!("mn{expected}"), "n={n} height={h}");
            }
        }
    }

    // Scenario D: collateral-weighted distribution within tolerance.
    #[test]
    fn scenario_d_distribution_within_tolerance() {
        let mns: Vec<Masternode> = (1u64..=50)
            .map(|i| mn(&format!("mn{i}"), i * 10_000, 0, 0, i as u8))
            .collect();

        let mut hits = vec![0u64; 51];
        for h in 50u64..10_000 {
            let winner = find_winner(&mns, &BigUint::from(h)).unwrap();
            let idx: usize = winner.alias.trim_start_matches("mn").parse().unwrap();
            hits[idx] += 1;
        }

        for i in 1u64..=50 {
            let ratio = hits[i as usize] / i;
            assert!((6..=10).contains(&ratio), "i={i} ratio={ratio}");
        }
    }

    #[test]
    fn round_too_large_when_length_overflows_u64() {
        let huge = BigUint::from(u64::MAX) * BigUint::from(2u32) * min_collateral();
        let mns = vec![Masternode {
            alias: "huge".to_string(),
            ipv4: None,
            ipv6: None,
            collateral: huge,
            cra_address: Address::new([9u8; 20]),
            announcement_height: BigUint::from(0u32),
            activation_height: BigUint::from(0u32),
        }];
        let err = find_winner(&mns, &BigUint::from(0u32)).unwrap_err();
        assert!(matches!(err, MasternodeError::RoundTooLarge));
    }
}
