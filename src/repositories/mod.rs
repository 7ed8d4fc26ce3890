pub mod archive;
pub mod directory_repository;
pub mod http_client;
pub mod http_repository;
pub mod local_file_system;
pub mod version_cache;

pub use directory_repository::DirectoryRepository;
pub use http_client::ReqwestClient;
pub use http_repository::HttpRepository;
pub use local_file_system::LocalFileSystem;
pub use version_cache::{JsonCacheStore, VersionCache};
