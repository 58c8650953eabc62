// Engine plumbing - the audio engine contract, the command queue feeding
// the engine thread and the event pump feeding the UI

pub mod interface;
pub mod pump;
pub mod queue;
pub mod worker;

pub use interface::{AudioEngine, EngineError, EngineListener, RecordingEngine, dispatch_notice};
pub use pump::{ChannelSource, EventPump, EventSource, SourcePoll};
pub use queue::QueuedEngine;
pub use worker::{EngineBackend, TraceBackend, spawn_worker};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared advisory cancellation flag
///
/// Long operations check it between steps; nothing is interrupted forcibly.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
