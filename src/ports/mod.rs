// src/ports/mod.rs

pub use cache_store::CacheStore;
pub use external_repository::ExternalRepository;
pub use file_system::FileSystemOperations;
pub use network::NetworkOperations;

pub mod cache_store;
pub mod external_repository;
pub mod file_system;
pub mod network;
