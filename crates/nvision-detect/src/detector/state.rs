use super::DetectError;
use nvision_core::AllocError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a detection run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Preprocessing,
    Thresholding,
    Labeling,
    Extracting,
    Done,
    Failed,
}

impl PipelineState {
    /// Successor on the happy path. `Done` and `Failed` are terminal.
    pub fn next(self) -> Option<PipelineState> {
        use PipelineState::*;
        match self {
            Idle => Some(Preprocessing),
            Preprocessing => Some(Thresholding),
            Thresholding => Some(Labeling),
            Labeling => Some(Extracting),
            Extracting => Some(Done),
            Done | Failed => None,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Preprocessing => "preprocessing",
            PipelineState::Thresholding => "thresholding",
            PipelineState::Labeling => "labeling",
            PipelineState::Extracting => "extracting",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage of one run and logs every transition.
#[derive(Debug)]
pub(crate) struct StageCursor {
    state: PipelineState,
}

impl StageCursor {
    pub(crate) fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to the next happy-path stage.
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            log::debug!("pipeline: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Convert an allocation failure into an error tagged with the current stage.
    pub(crate) fn exhausted(&self, err: AllocError) -> DetectError {
        DetectError::ResourceExhausted {
            stage: self.state,
            bytes: err.bytes,
        }
    }

    pub(crate) fn fail(&mut self, err: &DetectError) {
        log::debug!("pipeline: {} -> failed ({err})", self.state);
        self.state = PipelineState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_ends_in_done() {
        let mut cursor = StageCursor::new();
        let mut seen = vec![cursor.state()];
        while !cursor.state().is_terminal() {
            cursor.advance();
            seen.push(cursor.state());
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::Idle,
                PipelineState::Preprocessing,
                PipelineState::Thresholding,
                PipelineState::Labeling,
                PipelineState::Extracting,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn failure_is_terminal_and_keeps_stage_in_error() {
        let mut cursor = StageCursor::new();
        cursor.advance();
        cursor.advance();
        let err = cursor.exhausted(AllocError { bytes: 64 });
        assert_eq!(
            err,
            DetectError::ResourceExhausted {
                stage: PipelineState::Thresholding,
                bytes: 64
            }
        );
        cursor.fail(&err);
        assert_eq!(cursor.state(), PipelineState::Failed);
        cursor.advance();
        assert_eq!(cursor.state(), PipelineState::Failed);
    }

    #[test]
    fn display_matches_serde_name() {
        let json = serde_json::to_string(&PipelineState::Labeling).expect("serialize");
        assert_eq!(json, "\"labeling\"");
        assert_eq!(PipelineState::Labeling.to_string(), "labeling");
    }
}
