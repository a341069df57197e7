use thiserror::Error;

/// Errors surfaced by tensor construction, forward operations and the
/// backward pass. Every error is raised synchronously at the call that
/// detects it, before any tape entry is created.
#[derive(Debug, Error)]
pub enum TensorError {
    #[error("invalid input for operation: {0}")]
    InvalidInput(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("grad can only be created for scalar outputs")]
    NotScalar,

    #[error("no gradient found for `{0}`")]
    NoGradient(String),

    #[error("the tensor has no computable gradients")]
    NoComputableGradient,

    #[error("impossible to compute gradient of `{0}`")]
    UngradableOperation(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
