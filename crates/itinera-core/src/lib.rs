pub mod actions;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod reducer;
pub mod selection;
pub mod state;
pub mod store;
pub mod view;

pub use actions::*;
pub use config::*;
pub use error::*;
pub use ingest::StreamEvent;
pub use reducer::*;
pub use selection::Selection;
pub use state::*;
pub use store::ItineraryStore;
pub use view::*;
