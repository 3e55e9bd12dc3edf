//! Domain models for texbuild.
//!
//! Canonical definitions for the request-scoped entities:
//! - `ProjectTree` / `SourceDocument`: the virtual project as received
//! - `ResolvedEntry`: the chosen entry document and its text snapshot

pub mod project;
pub mod resolved;

pub use project::{ProjectTree, SourceDocument};
pub use resolved::ResolvedEntry;

/// Decode external bytes as UTF-8, replacing invalid sequences.
///
/// Source files and subprocess transcripts are arbitrary bytes; encoding
/// noise must never fail a request.
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
