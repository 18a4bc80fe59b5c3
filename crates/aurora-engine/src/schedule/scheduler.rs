use crate::render::SkipReason;

/// Host-agnostic frame loop control.
///
/// The host calls `tick` once per display frame with a monotonically
/// increasing timestamp and schedules another tick while the outcome asks for
/// one.
pub trait FrameScheduler {
    fn start(&mut self);
    fn stop(&mut self);
    fn tick(&mut self, timestamp_ms: f64) -> TickOutcome;
    fn is_running(&self) -> bool;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TickOutcome {
    Rendered,
    Skipped(SkipReason),
    /// Not running; nothing was done.
    Idle,
    /// The renderer failed for good and the loop tore itself down.
    Failed,
}

impl TickOutcome {
    /// Whether the host should schedule another tick.
    ///
    /// A zero-area surface waits for the next resize instead of spinning.
    pub fn wants_next_frame(self) -> bool {
        match self {
            TickOutcome::Rendered => true,
            TickOutcome::Skipped(reason) => reason != SkipReason::ZeroArea,
            TickOutcome::Idle | TickOutcome::Failed => false,
        }
    }
}
