//! Per-session plumbing above the raw [`crate::channel::SecureChannel`]:
//! the demultiplexing actor and the code-generation readiness barrier
//! (spec §4.B/§4.E/§9).

pub mod barrier;
pub mod demux;

pub use barrier::CodeGenBarrier;
pub use demux::{spawn, AppHandler, DemuxHandle};
