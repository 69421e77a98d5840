use crate::ingest::StreamEvent;

#[derive(Debug, Clone)]
pub enum SessionAction {
    User(UserAction),
    Stream(StreamAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    SubmitPrompt(String),
    /// Card click or direct jump, by arrival-order index.
    Select(usize),
    /// Timeline click, by row index in the rendered timeline.
    SelectTimelineRow(usize),
    Next,
    Prev,
    Restart,
    ToggleTimeline,
    TimelineSettled,
    Export,
    DismissError,
}

/// Produced by the model adapter. Every variant names the submission it
/// belongs to so a restarted session can drop late arrivals.
#[derive(Debug, Clone)]
pub enum StreamAction {
    Event { generation: u64, event: StreamEvent },
    Meta { generation: u64, message: String },
    Finished { generation: u64 },
    Failed { generation: u64, message: String },
}

impl StreamAction {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Event { generation, .. }
            | Self::Meta { generation, .. }
            | Self::Finished { generation }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}
