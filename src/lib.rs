// Library surface for the CLI binary and for headless/integration tests.
pub mod app_dirs;
pub mod audio;
pub mod coach;
pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod range;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod targets;

pub use error::{CoachError, RangeError, Result};
pub use range::{Range, RangeBuilder};
