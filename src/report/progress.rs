/// Progress events emitted while reports are generated
///
/// One observer interface; closures and channels both implement it.
use crate::ReportFormat;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Starting,
    Generating,
    Writing,
    Validating,
    Completed,
    Failed,
}

impl ProgressStage {
    pub fn percent(&self) -> u8 {
        match self {
            ProgressStage::Starting => 0,
            ProgressStage::Generating => 25,
            ProgressStage::Writing => 75,
            ProgressStage::Validating => 90,
            ProgressStage::Completed | ProgressStage::Failed => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Completed | ProgressStage::Failed)
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgressStage::Starting => "starting",
            ProgressStage::Generating => "generating",
            ProgressStage::Writing => "writing",
            ProgressStage::Validating => "validating",
            ProgressStage::Completed => "completed",
            ProgressStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub format: ReportFormat,
    pub stage: ProgressStage,
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(format: ReportFormat, stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            format,
            stage,
            percent: stage.percent(),
            message: message.into(),
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver(mpsc::UnboundedSender<ProgressEvent>);

impl ChannelObserver {
    /// Observer plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl From<mpsc::UnboundedSender<ProgressEvent>> for ChannelObserver {
    fn from(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self(tx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        // Receiver dropped means nobody is listening any more
        let _ = self.0.send(event.clone());
    }
}
