pub mod adapters;
pub mod contracts;
pub mod prompt;
pub mod scripted;

pub use adapters::*;
pub use contracts::*;
pub use prompt::build_request;
pub use scripted::*;
