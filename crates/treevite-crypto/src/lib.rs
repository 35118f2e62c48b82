//! Code generation and credential derivation for treevite.
//!
//! A login code has three derived representations, kept deliberately
//! separate: a slow salted Argon2id hash (verification only), a fast
//! deterministic keyed hash (row lookup only, since the salted hash cannot
//! be queried by equality), and a keyed fingerprint tagged with its key id
//! (audit/linkage only, survives rotation of the keying secret). Collapsing
//! any two of these would reintroduce either a timing oracle or an
//! unindexable login path.

use hmac::{Hmac, Mac};
use rand::prelude::IndexedRandom;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid kdf parameters")]
    InvalidParams(argon2::Error),
    #[error("key derivation failed")]
    DerivationFailed(argon2::Error),
    #[error("invalid key material")]
    InvalidKey,
}

const MIB: u32 = 1024;
const MEMORY_COST_KIB: u32 = 64 * MIB;

/// Characters allowed in the random segment of a code.
const CODE_CHARS: &[u8] = b"23456789abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Characters allowed as the leading character: letters only, so a code can
/// never be mistaken for a number, and nothing that resembles 0 or 1.
const CODE_LEAD_CHARS: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of the random segment following the leading character.
pub const INVITE_CODE_RANDOM_LEN: usize = 9;

/// Length of a login code.
pub const LOGIN_CODE_LEN: usize = 12;

/// Length of a verification salt in bytes.
pub const SALT_LEN: usize = 16;

fn random_code(lead: usize, rest: usize) -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(lead + rest);
    for _ in 0..lead {
        code.push(*CODE_LEAD_CHARS.choose(&mut rng).unwrap() as char);
    }
    for _ in 0..rest {
        code.push(*CODE_CHARS.choose(&mut rng).unwrap() as char);
    }
    code
}

/// Generate one invite code: a non-ambiguous leading letter followed by a
/// fixed-length random segment.
///
/// Uniqueness is not guaranteed by construction; the storage layer enforces
/// it and the insert path retries on collision.
pub fn generate_invite_code() -> String {
    random_code(1, INVITE_CODE_RANDOM_LEN)
}

/// Generate a batch of invite codes.
pub fn generate_invite_codes(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_invite_code()).collect()
}

/// Generate a login code. Issued in plaintext exactly once; only derived
/// values are ever stored.
pub fn generate_login_code() -> String {
    random_code(1, LOGIN_CODE_LEN - 1)
}

/// Generate a random salt for login-code verification hashing.
pub fn generate_salt() -> Vec<u8> {
    use rand::RngCore;
    let mut salt = vec![0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Hash a login code using Argon2id with a salt.
/// Returns hex-encoded 32-byte hash.
///
/// Deliberately expensive to resist offline brute-forcing; callers must not
/// assume verification is low-latency.
pub fn hash_login_code(code: &str, salt: &[u8]) -> Result<String, CryptoError> {
    let params = argon2::Params::new(MEMORY_COST_KIB, 3, 1, Some(32))
        .map_err(CryptoError::InvalidParams)?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut hash = Zeroizing::new([0u8; 32]);

    argon2
        .hash_password_into(code.as_bytes(), salt, hash.as_mut())
        .map_err(CryptoError::DerivationFailed)?;

    Ok(hex::encode(hash.as_ref()))
}

/// Verify a submitted login code against a stored verification hash using a
/// constant-time comparison.
pub fn verify_login_code(code: &str, salt: &[u8], stored_hex: &str) -> Result<bool, CryptoError> {
    let computed = hash_login_code(code, salt)?;
    Ok(subtle::ConstantTimeEq::ct_eq(computed.as_bytes(), stored_hex.as_bytes()).into())
}

/// Deterministic keyed lookup hash of a login code.
///
/// Used purely to narrow the candidate row before verification; never for
/// verification itself.
pub fn lookup_hash(code: &str, pepper: &[u8]) -> Result<String, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(pepper).map_err(|_| CryptoError::InvalidKey)?;
    mac.update(b"treevite.lookup");
    mac.update(code.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Keyed audit fingerprint of a login code, rendered `"{key_id}:{hex}"`.
///
/// The key id tag lets the keying secret rotate without invalidating
/// historical records' identifiability. Audit/linkage only.
pub fn fingerprint(code: &str, key: &[u8], key_id: &str) -> Result<String, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
    mac.update(b"treevite.fingerprint");
    mac.update(code.as_bytes());
    Ok(format!("{}:{}", key_id, hex::encode(mac.finalize().into_bytes())))
}
