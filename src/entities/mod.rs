pub mod lock;
pub mod package;

pub use lock::*;
pub use package::*;
