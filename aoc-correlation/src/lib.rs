//! Cross-tool correlation (spec §4.6): groups normalized findings by a
//! deterministic fingerprint, adjusts confidence against false-positive
//! priors and cross-validation requirements, applies a semantic-context
//! demotion pass, and derives final severity.

pub mod fingerprint;
pub mod pipeline;

pub use fingerprint::fingerprint;
pub use pipeline::correlate;
