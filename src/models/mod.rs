pub mod cache;
pub mod config;
pub mod index;
pub mod origin;
pub mod version;

pub use cache::*;
pub use config::*;
pub use index::*;
pub use origin::*;
pub use version::*;
