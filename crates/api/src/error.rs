#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph unavailable: {0}")]
    Unavailable(String),
    #[error("Analysis failed in {unit}: {message}")]
    Analysis { unit: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
