//! Small shared helpers used by more than one provider client.

/// Minimal percent-encoding for query parameters; avoids pulling in the
/// `url` crate's form-encoding helpers for a handful of call sites.
pub fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
