use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes in a session token.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Number of random bytes in a comment id.
pub const COMMENT_ID_BYTES: usize = 8;

/// Generate `len` bytes from the operating system's secure random source,
/// hex encoded.
///
/// If the random source fails the process is aborted: continuing would mean
/// handing out predictable session tokens and comment ids.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    if let Err(error) = OsRng.try_fill_bytes(&mut bytes) {
        tracing::error!(%error, "secure random source failed");
        std::process::abort();
    }
    hex::encode(bytes)
}

/// A fresh opaque session token.
pub fn session_token() -> String {
    random_hex(SESSION_TOKEN_BYTES)
}

/// A fresh opaque comment id.
pub fn comment_id() -> String {
    random_hex(COMMENT_ID_BYTES)
}
