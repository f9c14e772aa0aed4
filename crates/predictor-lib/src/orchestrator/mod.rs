//! Training orchestration: phase sequencing, progress, cancellation and the
//! accept/reject gate

mod progress;
mod training;

pub use progress::{CancellationFlag, ChannelProgress, NoProgress, ProgressSink};
pub use training::{
    AcceptanceGate, TrainingDecision, TrainingHandle, TrainingOrchestrator, TrainingOutcome,
    TrainingPhase, Verdict,
};
