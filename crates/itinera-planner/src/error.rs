use thiserror::Error;

use crate::workflow::Stage;

/// Failure reported by an extraction, search, or synthesis backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("A turn is already in progress for this session")]
    SessionBusy { session_key: String },

    #[error("There is no previous plan to revise yet")]
    NothingToRevise,

    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        source: CollaboratorError,
    },
}

impl PlannerError {
    pub fn collaborator(stage: Stage) -> impl FnOnce(CollaboratorError) -> Self {
        move |source| Self::Collaborator { stage, source }
    }
}
