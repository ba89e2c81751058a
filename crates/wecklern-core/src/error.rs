use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid melody token: {0:?}")]
    InvalidToken(String),
    #[error("palette must contain at least one pitch")]
    EmptyPalette,
}

pub type Result<T> = std::result::Result<T, CoreError>;
