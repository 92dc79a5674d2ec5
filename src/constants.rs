//! Global constants for the masternode subsystem.
//!
//! Centralizes every magic number named in the design so call sites never
//! hand-copy a literal.

pub mod masternode {
    /// Base unit of the native currency (`UNIT = 10^18`).
    pub const UNIT: u128 = 1_000_000_000_000_000_000;

    /// Minimum masternode collateral: `10_000 * UNIT`. One reward slot.
    pub const MIN_COLLATERAL_WHOLE: u128 = 10_000;

    /// Heartbeats timestamped further than this many seconds in the future
    /// (relative to the receiver's clock) are rejected outright.
    pub const MAX_FUTURE_SKEW_SECS: u64 = 3600;

    /// Minimum spacing between two accepted heartbeats from the same signer.
    pub const MIN_INTERVAL_SECS: u64 = 1800;

    /// A peer that hasn't heartbeated within this many seconds is considered
    /// dead by the watchdog.
    pub const MAX_INTERVAL_SECS: u64 = 86_400;

    /// Heartbeat emission period: `3 * MIN_INTERVAL_SECS`.
    pub const HEARTBEAT_TIMER_PERIOD_SECS: u64 = 3 * MIN_INTERVAL_SECS;

    /// Watchdog sweep period: `MAX_INTERVAL_SECS / 10`.
    pub const WATCHDOG_TIMER_PERIOD_SECS: u64 = MAX_INTERVAL_SECS / 10;

    /// Default validity window (in blocks) for a freshly cast dismissal vote.
    pub const DEFAULT_EXPIRATION_BLOCKS: u64 = 1000;

    /// Quorum floor used while the active set is small.
    pub const MIN_QUORUM: u64 = 7;

    /// Active-set size at or below which `MIN_QUORUM` applies directly.
    pub const QUORUM_ACTIVE_SET_THRESHOLD: u64 = 8;

    /// Numerator/denominator of the quorum fraction once the active set grows
    /// past `QUORUM_ACTIVE_SET_THRESHOLD`: `floor(9 * n / 10)`.
    pub const QUORUM_NUMERATOR: u64 = 9;
    pub const QUORUM_DENOMINATOR: u64 = 10;

    /// Reason code: the target stopped heartbeating.
    pub const REASON_NO_HEARTBEATS: u32 = 0x0000_0001;
    /// Reason code: any other cause (free-text description carries detail).
    pub const REASON_OTHER: u32 = 0xFFFF_FFFF;
}
