// src/factories/mod.rs

mod package_factory;

pub use package_factory::PackageFactory;
