use thiserror::Error;

/// Tagged error variants for the masternode core.
#[derive(Error, Debug)]
pub enum MasternodeError {
    #[error("signature recovery failed or signer not known")]
    WrongSignature,

    #[error("recovered signer is not in the active masternode set at the given height")]
    MasternodeNotFound,

    #[error("heartbeat timestamp is beyond now + MAX_FUTURE_SKEW")]
    TooFarInFuture,

    #[error("heartbeat arrived sooner than MIN_INTERVAL after the previous one")]
    TooEarly,

    #[error("reward round length exceeds 2^64")]
    RoundTooLarge,

    #[error("no masternode to reward was found (active set empty)")]
    NoWinner,

    #[error("wallet unavailable or passphrase wrong: {0}")]
    SigningFailed(String),

    #[error("signature is not exactly 65 bytes")]
    InvalidLength,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
