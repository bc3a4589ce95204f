use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("text content is required")]
    EmptyText,
    #[error("invalid moderation policy: {0}")]
    InvalidPolicy(String),
}
