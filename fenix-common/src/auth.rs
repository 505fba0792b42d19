//! Credential primitives: password hashing and session tokens
//!
//! Pure functions only. Cookie handling and request extraction live in
//! the admin service; this module never touches HTTP types.
//!
//! # Passwords
//!
//! Stored as bcrypt hashes (cost 10), so accounts created by earlier
//! deployments (`$2a$`/`$2b$` hashes) keep working.
//!
//! # Session tokens
//!
//! A session token is 32 random bytes, base64url encoded without padding.
//! Only the SHA-256 of the token is persisted; a leaked sessions table
//! cannot be replayed as cookies.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::Result;

/// bcrypt work factor for newly hashed passwords
pub const PASSWORD_HASH_COST: u32 = 10;

/// Number of random bytes in a session token
const SESSION_TOKEN_BYTES: usize = 32;

// ========================================
// Passwords
// ========================================

/// Hash a password with bcrypt
///
/// CPU-bound; async callers should run it under `spawn_blocking`.
pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, PASSWORD_HASH_COST)?)
}

/// Verify a password against a stored bcrypt hash
///
/// A malformed or empty stored hash verifies as `false` instead of
/// erroring, so a corrupt row cannot be distinguished from a bad password.
///
/// # Examples
///
/// ```
/// use fenix_common::auth::{hash_password, verify_password};
///
/// let hash = hash_password("secret1").unwrap();
/// assert!(verify_password("secret1", &hash));
/// assert!(!verify_password("secret2", &hash));
/// assert!(!verify_password("secret1", "not-a-hash"));
/// ```
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(password, stored_hash).unwrap_or(false)
}

// ========================================
// Session tokens
// ========================================

/// Generate a fresh session token for a cookie value
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a session token for storage and lookup (64 lowercase hex chars)
pub fn hash_session_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
