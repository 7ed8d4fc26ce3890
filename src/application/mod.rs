pub mod install;
pub mod publish;
pub mod repository;

pub use publish::IndexReport;
pub use repository::{Repository, sources_from_config};
