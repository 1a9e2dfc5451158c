//! Core traits for Prairie configuration.
//!
//! The primary trait is [`ConfigProvider`], which abstracts where a
//! deployment keeps its data so that store factories and CLI handlers can
//! stay generic over the concrete configuration type.

use std::path::PathBuf;

use crate::Result;

/// Trait for deployment-specific configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across threads
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use prairie_core::traits::ConfigProvider;
/// use prairie_core::Result;
///
/// #[derive(Clone)]
/// struct LabConfig {
///     data_dir: PathBuf,
/// }
///
/// impl ConfigProvider for LabConfig {
///     fn project_name(&self) -> &str {
///         "pangenome-lab"
///     }
///
///     fn base_path(&self) -> Result<PathBuf> {
///         Ok(self.data_dir.clone())
///     }
///
///     fn store_path(&self, store: &str) -> Result<PathBuf> {
///         Ok(self.data_dir.join(store))
///     }
/// }
/// ```
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Base path for all project data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn base_path(&self) -> Result<PathBuf>;

    /// On-disk location for a named store.
    ///
    /// `store` is a backend-defined key such as `"embedded"` (the redb
    /// file) or `"staging"` (bulk-load `.rdf` files).
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unknown or the path cannot be
    /// resolved.
    fn store_path(&self, store: &str) -> Result<PathBuf>;
}
