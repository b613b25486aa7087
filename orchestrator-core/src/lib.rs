//! Heartbeat-driven multi-agent orchestration kernel.
//!
//! Wires a priority message bus, a scoped versioned blackboard, a
//! signature/veto/appeal decision protocol, and an accountability/election
//! regime around agent *behaviors* supplied by the embedder. See
//! `agent::behavior` for the extension points (`Executor`, `Decomposer`,
//! `SignaturePolicy`).

pub mod accountability;
pub mod agent;
pub mod blackboard;
pub mod bus;
pub mod clock;
pub mod decision;
pub mod domain;
pub mod election;
pub mod error;
pub mod governance;
pub mod ids;
pub mod message;
pub mod queue;
pub mod recovery;
pub mod repo;
pub mod scorer;
pub mod state;
pub mod team;

pub use error::{KernelError, KernelResult};
