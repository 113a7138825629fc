use crate::workflow::Stage;

/// Progress text marking the switch from slot gathering to planning.
pub const PLANNING_SENTINEL: &str = "All_Details_Fetched";

/// Something the workflow reports while a turn is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A stage started.
    Stage(Stage),
    /// Every slot is filled and the research fan-out is about to start.
    PlanningStarted,
}

impl ProgressEvent {
    pub fn message(&self) -> &'static str {
        match self {
            ProgressEvent::Stage(stage) => stage.progress_message(),
            ProgressEvent::PlanningStarted => PLANNING_SENTINEL,
        }
    }
}

/// Receives progress from inside a turn.
///
/// Called synchronously from whichever task runs the stage, so
/// implementations must not block.
pub trait TurnObserver: Send + Sync {
    fn notify(&self, event: ProgressEvent);
}

impl<F> TurnObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {
    fn notify(&self, _event: ProgressEvent) {}
}
