//! L2 — authenticated message formats (`Heartbeat`, `DismissVote`) and their
//! canonical wire/preimage encodings. Byte layouts here are load-bearing:
//! any implementation in any language must reproduce them exactly, or
//! signatures stop verifying across the network.

use crate::address::Address;
use crate::error::MasternodeError;
use rlp::{Decodable, DecoderError, Encodable, RlpStream};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message as SecpMessage, Secp256k1, SecretKey};
use sha3::{Digest, Keccak256};

const HEARTBEAT_MAGIC: [u8; 8] = [0x90, 0x6C, 0x56, 0x1B, 0x1B, 0x1E, 0x76, 0xED];
const DISMISS_VOTE_MAGIC: [u8; 8] = [0xF8, 0x79, 0x21, 0xF1, 0x9A, 0x83, 0xF3, 0x9D];

pub const REASON_NO_HEARTBEATS: u32 = crate::constants::masternode::REASON_NO_HEARTBEATS;
pub const REASON_OTHER: u32 = crate::constants::masternode::REASON_OTHER;

/// Detached 65-byte secp256k1 recoverable signature `(r[32] || s[32] || v[1])`,
/// with `v` already offset by +27 on the wire (so `v in {27, 28}`).
#[derive(Clone, PartialEq, Eq)]
pub struct Auth {
    pub sig: [u8; 65],
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Auth(0x{})", hex::encode(self.sig))
    }
}

impl Auth {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MasternodeError> {
        if bytes.len() != 65 {
            return Err(MasternodeError::InvalidLength);
        }
        let mut sig = [0u8; 65];
        sig.copy_from_slice(bytes);
        Ok(Self { sig })
    }
}

impl Encodable for Auth {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append(&self.sig.as_slice());
    }
}

impl Decodable for Auth {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, DecoderError> {
        let bytes: Vec<u8> = rlp.as_val()?;
        Auth::from_bytes(&bytes).map_err(|_| DecoderError::Custom("invalid Auth length"))
    }
}

/// Ethereum `personal_sign` convention:
/// `Keccak-256("\x19Ethereum Signed Message:\n" || ASCII(len) || preimage)`.
fn personal_message_hash(preimage: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", preimage.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(preimage);
    hasher.finalize().into()
}

/// Sign `preimage` with a secp256k1 secret key, producing the 65-byte
/// `(r, s, v+27)` detached signature stored in `Auth.sig`.
pub fn sign_preimage(preimage: &[u8], secret_key: &SecretKey) -> Auth {
    let secp = Secp256k1::signing_only();
    let hash = personal_message_hash(preimage);
    let msg = SecpMessage::from_slice(&hash).expect("32-byte hash is a valid message");
    let recoverable = secp.sign_ecdsa_recoverable(&msg, secret_key);
    let (recovery_id, compact) = recoverable.serialize_compact();
    let mut sig = [0u8; 65];
    sig[..64].copy_from_slice(&compact);
    sig[64] = recovery_id.to_i32() as u8 + 27;
    Auth { sig }
}

/// `recover_signer(preimage, auth) -> Address | WrongSignature`.
pub fn recover_signer(preimage: &[u8], auth: &Auth) -> Result<Address, MasternodeError> {
    if auth.sig[64] < 27 || auth.sig[64] > 28 {
        return Err(MasternodeError::WrongSignature);
    }
    let recovery_id =
        RecoveryId::from_i32((auth.sig[64] - 27) as i32).map_err(|_| MasternodeError::WrongSignature)?;
    let recoverable = RecoverableSignature::from_compact(&auth.sig[..64], recovery_id)
        .map_err(|_| MasternodeError::WrongSignature)?;

    let hash = personal_message_hash(preimage);
    let msg = SecpMessage::from_slice(&hash).map_err(|_| MasternodeError::WrongSignature)?;

    let secp = Secp256k1::verification_only();
    let pubkey = secp
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|_| MasternodeError::WrongSignature)?;

    let uncompressed = pubkey.serialize_uncompressed();
    let mut body = [0u8; 64];
    body.copy_from_slice(&uncompressed[1..]);
    Ok(Address::from_uncompressed_pubkey_body(&body))
}

/// `Heartbeat { timestamp, auth }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    pub timestamp: u64,
    pub auth: Auth,
}

impl Heartbeat {
    /// 18-byte signing preimage: magic tag + 8-byte little-endian timestamp.
    pub fn data_to_sign(timestamp: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        buf.extend_from_slice(&HEARTBEAT_MAGIC);
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf
    }

    pub fn sign(timestamp: u64, secret_key: &SecretKey) -> Self {
        let auth = sign_preimage(&Self::data_to_sign(timestamp), secret_key);
        Heartbeat { timestamp, auth }
    }

    pub fn recover_signer(&self) -> Result<Address, MasternodeError> {
        recover_signer(&Self::data_to_sign(self.timestamp), &self.auth)
    }

    /// `hash(msg) = Keccak-256(RLP(msg))`. Identity/dedup only, not an
    /// authentication primitive.
    pub fn hash(&self) -> [u8; 32] {
        Keccak256::digest(rlp::encode(self)).into()
    }
}

impl Encodable for Heartbeat {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.timestamp);
        s.append(&self.auth);
    }
}

impl Decodable for Heartbeat {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, DecoderError> {
        Ok(Heartbeat {
            timestamp: rlp.val_at(0)?,
            auth: rlp.val_at(1)?,
        })
    }
}

/// `Reason { code, description }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reason {
    pub code: u32,
    pub description: String,
}

impl Reason {
    pub fn no_heartbeats() -> Self {
        Reason {
            code: REASON_NO_HEARTBEATS,
            description: String::new(),
        }
    }
}

impl Encodable for Reason {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.code);
        s.append(&self.description.as_bytes());
    }
}

impl Decodable for Reason {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, DecoderError> {
        let code: u32 = rlp.val_at(0)?;
        let desc_bytes: Vec<u8> = rlp.val_at(1)?;
        let description = String::from_utf8(desc_bytes).map_err(|_| DecoderError::Custom("invalid utf8"))?;
        Ok(Reason { code, description })
    }
}

/// `DismissVote { target_cra, expiration_height, reason, timestamp, auth }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DismissVote {
    pub target_cra: Address,
    pub expiration_height: u64,
    pub reason: Reason,
    pub timestamp: u64,
    pub auth: Auth,
}

impl DismissVote {
    /// Signing preimage: magic tag + target (20 bytes) + expiration (8 LE) +
    /// reason code (4 LE) + raw UTF-8 description (no length prefix,
    /// see SPEC_FULL §4.2/§9) + timestamp (8 LE).
    pub fn data_to_sign(
        target_cra: &Address,
        expiration_height: u64,
        reason: &Reason,
        timestamp: u64,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 20 + 8 + 4 + reason.description.len() + 8);
        buf.extend_from_slice(&DISMISS_VOTE_MAGIC);
        buf.extend_from_slice(target_cra.as_bytes());
        buf.extend_from_slice(&expiration_height.to_le_bytes());
        buf.extend_from_slice(&reason.code.to_le_bytes());
        buf.extend_from_slice(reason.description.as_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf
    }

    pub fn sign(
        target_cra: Address,
        expiration_height: u64,
        reason: Reason,
        timestamp: u64,
        secret_key: &SecretKey,
    ) -> Self {
        let preimage = Self::data_to_sign(&target_cra, expiration_height, &reason, timestamp);
        let auth = sign_preimage(&preimage, secret_key);
        DismissVote {
            target_cra,
            expiration_height,
            reason,
            timestamp,
            auth,
        }
    }

    pub fn recover_signer(&self) -> Result<Address, MasternodeError> {
        let preimage =
            Self::data_to_sign(&self.target_cra, self.expiration_height, &self.reason, self.timestamp);
        recover_signer(&preimage, &self.auth)
    }

    pub fn hash(&self) -> [u8; 32] {
        Keccak256::digest(rlp::encode(self)).into()
    }
}

impl Encodable for DismissVote {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.target_cra.as_bytes().as_slice());
        s.append(&self.expiration_height);
        s.append(&self.reason);
        s.append(&self.timestamp);
        s.append(&self.auth);
    }
}

impl Decodable for DismissVote {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, DecoderError> {
        let target_bytes: Vec<u8> = rlp.val_at(0)?;
        let target_cra =
            Address::from_slice(&target_bytes).map_err(|_| DecoderError::Custom("invalid address length"))?;
        Ok(DismissVote {
            target_cra,
            expiration_height: rlp.val_at(1)?,
            reason: rlp.val_at(2)?,
            timestamp: rlp.val_at(3)?,
            auth: rlp.val_at(4)?,
        })
    }
}
