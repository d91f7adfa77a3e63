use super::{ConfigError, PipelineState};
use nvision_core::InputError;

/// Errors returned by the detection pipeline.
///
/// An empty result is not an error: a scan without bright spots yields a
/// report with zero centers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("out of memory during {stage} ({bytes} bytes requested)")]
    ResourceExhausted { stage: PipelineState, bytes: usize },
}
