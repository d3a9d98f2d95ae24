use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid product: {0}")]
    InvalidProduct(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    /// Text that is safe to show an operator in the admin surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(DomainError::InvalidProduct(message)) => {
                format!("The product could not be saved: {message}.")
            }
            Self::Persistence(message) => {
                format!("The catalog store reported an error: {message}")
            }
        }
    }
}
