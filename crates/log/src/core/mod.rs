//! Error handling for grey-log

mod error;

pub use error::{LogError, LogResult};
