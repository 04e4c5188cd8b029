use std::fmt::Write;

use md5::{Digest, Md5};

/// Derive a device fingerprint from request metadata.
///
/// Joins user agent, accept-language, accept-encoding and client IP with a
/// fixed delimiter and hashes the result with MD5. The digest is used only
/// for coarse correlation of activity across requests, never as an identity
/// proof, so collisions and MD5's weakness are accepted.
///
/// Pure function: the same four inputs always yield the same digest.
pub fn device_fingerprint(
    user_agent: &str,
    accept_language: &str,
    accept_encoding: &str,
    ip: &str,
) -> String {
    let components = [user_agent, accept_language, accept_encoding, ip].join("|");
    let digest = Md5::digest(components.as_bytes());

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
