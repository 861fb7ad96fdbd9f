//! Scripted in-memory queue manager for testing without a server.
//!
//! [`MockQueueManager`] plays the server side of the [`Transport`](super::Transport)
//! contract and [`MockCodec`] stands in for the binary message layout.

mod codec;
mod queue_manager;
mod scenarios;
mod script;

pub use codec::MockCodec;
pub use queue_manager::{MockQueueManager, PublishOutcome};
pub use script::{
    ClassSpec, CycleSpec, ElementSpec, PublicationSpec, QueueSpec, ReplyQueueSpec, Scenario,
    TypeSpec,
};
