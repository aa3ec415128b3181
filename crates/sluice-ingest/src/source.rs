//! Source flow control
//!
//! The scheduler's backpressure policy is decoupled from any particular
//! stream implementation through a small capability interface: pause when
//! write capacity is exhausted, resume when capacity frees up, abort on a
//! hard stop.

/// Flow-control capability of an ingestion source.
///
/// Implementations must tolerate repeated calls: a `resume` without a
/// preceding `pause` and a second `abort` are both no-ops.
pub trait FlowControl: Send + Sync {
    /// Suspend upstream production. Called before a batch is admitted while
    /// the scheduler is at its concurrency limit.
    fn pause(&self);

    /// Resume upstream production after a write completion freed capacity.
    fn resume(&self);

    /// Stop the source for good. Called on the first write failure or a
    /// stream-level error; production never resumes afterwards.
    fn abort(&self);
}

/// No-op flow control for pull-based sources.
///
/// Files and in-memory buffers only produce bytes when read; suspending the
/// consumer is itself the backpressure, so the control signals have nothing
/// to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveFlow;

impl FlowControl for PassiveFlow {
    fn pause(&self) {}
    fn resume(&self) {}
    fn abort(&self) {}
}
