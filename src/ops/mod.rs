pub mod engine;
pub mod lists;
pub mod sync;
pub mod tag_index;

pub use engine::{Effect, Engine, EngineError, Event};
pub use sync::{SyncOptions, SyncReport};
pub use tag_index::TagIndex;
