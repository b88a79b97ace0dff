//! Session credential for the switch web UI
//!
//! The firmware's login scheme expects `md5(username + password)` as lowercase
//! hex, sent both as the `admin` cookie and as the `Response` form field.
//! MD5 is dictated by the device and is not a security boundary here.

/// Derive the session digest for the given identity
pub fn session_digest(username: &str, password: &str) -> String {
    let mut input = String::with_capacity(username.len() + password.len());
    input.push_str(username);
    input.push_str(password);
    format!("{:x}", md5::compute(input.as_bytes()))
}
