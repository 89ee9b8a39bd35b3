//! Error taxonomy.
//!
//! Normal-flow anomalies are not errors here: a response whose target was
//! evicted is silently discarded, and operations referencing absent keys are
//! no-ops — both decided by state inspection and reported only through
//! tracing. The error type covers the ways the engine itself can stop.

/// Ways the viewport engine can stop running.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backing store closed its event stream. From the engine's
    /// perspective this is a permanent stall; retry policy belongs to the
    /// collaborator integration.
    #[error("backing store disconnected")]
    StoreDisconnected,

    /// The engine task is no longer running, so commands cannot be
    /// delivered.
    #[error("viewport engine is not running")]
    Shutdown,
}
