//! # Grey Core
//!
//! Core types shared by the Grey probe targets and the agent that schedules
//! them.
//!
//! ## Key Components
//!
//! - **Samples**: [`Sample`] is the set of named values a single probe
//!   evaluation produced, [`SampleValue`] is one such value.
//!
//! ## Usage
//!
//! ```rust
//! use grey_core::{Sample, SampleValue};
//!
//! let sample = Sample::default()
//!     .with("http.status_code", 200)
//!     .with("quote.who", "Bender");
//!
//! assert_eq!(sample.get("http.status_code"), &SampleValue::Int(200));
//! assert_eq!(sample.get("missing"), &SampleValue::None);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sample;

pub use sample::{Sample, SampleValue};

/// Common prelude for Grey crates
pub mod prelude {
    pub use super::{Sample, SampleValue};
}
