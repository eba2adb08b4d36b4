//! Classification of raw adapter responses
//!
//! This is a syntactic filter only. It knows the handful of error strings an
//! ELM327 emits and treats everything else as data: no checksum, frame count
//! or PID echo verification is attempted, so a garbled but marker-free
//! response still classifies as valid.

/// Error markers an adapter can embed in a response. Matched
/// case-insensitively, anywhere in the text.
const INVALID_MARKERS: [&str; 3] = ["?", "NO DATA", "UNABLE TO CONNECT"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Classification of a raw response
pub enum ResponseClass {
    /// The response appears to contain diagnostic data
    Valid,
    /// The response is empty or contains a recognized error marker
    Invalid,
}

impl ResponseClass {
    /// Returns true for [ResponseClass::Valid]
    pub fn is_valid(self) -> bool {
        self == ResponseClass::Valid
    }
}

/// Classifies a raw adapter response.
///
/// Empty or whitespace-only responses are invalid, as is anything containing
/// one of the known error markers (case-insensitive). Pure function: the same
/// input always yields the same class.
pub fn classify(response: &str) -> ResponseClass {
    if response.trim().is_empty() {
        return ResponseClass::Invalid;
    }
    let upper = response.to_uppercase();
    if INVALID_MARKERS.iter().any(|m| upper.contains(m)) {
        return ResponseClass::Invalid;
    }
    ResponseClass::Valid
}
