use crate::smapi::InstallState;
use tokio::sync::mpsc::UnboundedSender;

/// Progress of one stage of a multi-stage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingProgress {
    pub stage_name: String,
    /// `-1` while the total is unknown.
    pub total_tasks_quantity: i64,
    pub processed_tasks_quantity: i64,
}

impl LoadingProgress {
    pub fn new(stage_name: impl Into<String>, total: i64) -> Self {
        Self {
            stage_name: stage_name.into(),
            total_tasks_quantity: total,
            processed_tasks_quantity: 0,
        }
    }

    /// Completed fraction, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_tasks_quantity > 0)
            .then(|| self.processed_tasks_quantity as f64 / self.total_tasks_quantity as f64)
    }
}

/// Everything an install workflow reports to its observer.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallEvent {
    State(InstallState),
    Progress(LoadingProgress),
}

/// Sends [`InstallEvent`]s to an optional observer.
///
/// A closed or absent receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<InstallEvent>>,
}

impl ProgressReporter {
    pub fn new(tx: Option<UnboundedSender<InstallEvent>>) -> Self {
        Self { tx }
    }

    pub fn state(&self, state: InstallState) {
        debug!("install state: {state}");
        self.send(InstallEvent::State(state));
    }

    /// Starts a new stage; the stage announces itself with a zero count.
    pub fn stage(&self, name: &str, total: i64) -> StageProgress<'_> {
        let progress = LoadingProgress::new(name, total);
        self.send(InstallEvent::Progress(progress.clone()));
        StageProgress {
            reporter: self,
            progress,
        }
    }

    fn send(&self, event: InstallEvent) {
        if let Some(tx) = &self.tx {
            // the observer may have gone away, that's fine
            tx.send(event).ok();
        }
    }
}

/// A live cursor for one stage.
#[derive(Debug)]
pub struct StageProgress<'a> {
    reporter: &'a ProgressReporter,
    progress: LoadingProgress,
}

impl StageProgress<'_> {
    /// Reports `processed` if it moves the stage forward.
    pub fn advance_to(&mut self, processed: i64) {
        if processed <= self.progress.processed_tasks_quantity {
            return;
        }
        self.progress.processed_tasks_quantity = processed;
        self.reporter.send(InstallEvent::Progress(self.progress.clone()));
    }

    pub fn set_total(&mut self, total: i64) {
        self.progress.total_tasks_quantity = total;
    }

    pub fn current(&self) -> &LoadingProgress {
        &self.progress
    }
}
