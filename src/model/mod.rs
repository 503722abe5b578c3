pub mod config;
pub mod list;
pub mod tag;

pub use config::*;
pub use list::*;
pub use tag::*;
