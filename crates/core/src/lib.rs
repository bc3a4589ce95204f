pub mod config;
pub mod context;
pub mod error;
pub mod matcher;
pub mod models;
pub mod policy;
pub mod similarity;

pub use config::ModerationPolicy;
pub use context::{ContextValidator, SafeDomain};
pub use error::ModerationError;
pub use matcher::{tokenize, KeywordMatcher};
pub use models::*;
pub use policy::{round_score, PolicyEngine};
pub use similarity::sequence_ratio;
