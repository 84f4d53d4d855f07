//! State tracking for packaging builds.
//!
//! A build walks a fixed sequence of phases. The state records where it is,
//! the checkpoints it passed and any recoverable warnings along the way.

mod build_state;

pub use build_state::{BuildCheckpoint, BuildPhase, BuildState, BuildWarning};
