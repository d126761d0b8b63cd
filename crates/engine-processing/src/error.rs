use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError<E> {
    /// First failure of the unit of work or of the source.
    #[error(transparent)]
    Failed(E),

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Execution cancelled")]
    Cancelled,
}

impl<E> ExecutorError<E> {
    pub fn into_failure(self) -> Option<E> {
        match self {
            ExecutorError::Failed(err) => Some(err),
            _ => None,
        }
    }
}
