pub mod application;
pub mod entities;
pub mod errors;
pub mod factories;
pub mod models;
pub mod paths;
pub mod ports;
pub mod repositories;
pub mod services;

pub use application::{IndexReport, Repository, sources_from_config};
pub use entities::*;
pub use errors::*;
pub use models::*;
pub use ports::*;
pub use repositories::{DirectoryRepository, HttpRepository, LocalFileSystem, ReqwestClient, VersionCache};
pub use services::{ContentDigest, content_digest};
