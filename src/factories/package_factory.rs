// src/factories/package_factory.rs

use crate::{Package, RepoError, entities::package::ManifestDocument, models::parse_version};
use semver::Version;
use std::collections::BTreeMap;

/// Factory for creating Package manifests with validation.
///
/// Every Package, whether parsed from `package.toml` or built in code,
/// passes through here so that names are safe to use as directory names
/// and versions are valid semver.
#[derive(Debug, Clone)]
pub struct PackageFactory;

impl PackageFactory {
    /// Creates a new Package with validation.
    ///
    /// # Arguments
    /// * `name` - Package name (letters, digits, `-` and `_`, starting with a letter)
    /// * `version` - Package version
    ///
    /// # Returns
    /// * `Ok(Package)` - Valid manifest without published size or hash
    /// * `Err(RepoError)` - Validation error
    ///
    /// # Examples
    /// ```
    /// use semver::Version;
    /// use modrepo_core::factories::PackageFactory;
    ///
    /// let package = PackageFactory::create("my-package", Version::new(1, 0, 0)).unwrap();
    /// assert_eq!(package.id(), "my-package@1.0.0");
    /// ```
    pub fn create(name: &str, version: Version) -> Result<Package, RepoError> {
        Self::validate_name(name)?;

        Ok(Package::from_parts(
            name.to_string(),
            version,
            None,
            None,
            None,
            None,
            BTreeMap::new(),
            BTreeMap::new(),
        ))
    }

    pub(crate) fn from_document(document: ManifestDocument) -> Result<Package, RepoError> {
        Self::validate_name(&document.name)?;

        let version = parse_version(&document.version)
            .map_err(|_| RepoError::InvalidManifest(format!(
                "Invalid version '{}' for package '{}'",
                document.version, document.name
            )))?;

        if let Some(hash) = &document.sha256 {
            if !Self::is_valid_hex(hash) {
                return Err(RepoError::InvalidManifest(format!(
                    "Invalid sha256 '{}' for package '{}'",
                    hash, document.name
                )));
            }
        }

        Ok(Package::from_parts(
            document.name,
            version,
            document.author,
            document.description,
            document.size,
            document.sha256.map(|h| h.to_ascii_lowercase()),
            document.dependencies,
            document.extra,
        ))
    }

    fn validate_name(name: &str) -> Result<(), RepoError> {
        if name.trim().is_empty() {
            return Err(RepoError::ValidationError(
                "Package name cannot be empty or whitespace".to_string(),
            ));
        }

        if !Self::is_valid_package_name(name) {
            return Err(RepoError::ValidationError(format!(
                "Invalid package name '{}'. Must contain only alphanumeric characters, hyphens, and underscores",
                name
            )));
        }

        Ok(())
    }

    /// Validates package name format
    fn is_valid_package_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && name
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
    }

    fn is_valid_hex(hash: &str) -> bool {
        !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit())
    }
}
