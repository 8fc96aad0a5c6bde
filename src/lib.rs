//! pkgcache: a local, integrity-verified mirror of product packages
//!
//! The cache reads a product manifest (platform → platform version →
//! architecture → package version → descriptor), downloads the packages it
//! selects into a local directory tree, rewrites every download URL to point
//! at the mirror host, and stores the rewritten manifest per project and
//! channel.
//!
//! # Example
//!
//! ```no_run
//! use pkgcache::{Cache, CacheConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig {
//!         sync_min_version: Some("12.13".into()),
//!         mirror_host: Some("mirror.internal".into()),
//!         ..CacheConfig::default()
//!     };
//!
//!     let cache = Cache::from_config(config)?;
//!     cache.update().await?;
//!
//!     println!("{}", cache.last_modified_for("chef", "stable")?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod mirror;
pub mod provider;
pub mod rewrite;
pub mod store;

pub use cache::{Cache, CycleSummary};
pub use config::{
    load_config, validate_config, validate_pair, CacheConfig, ProviderConfig, ProviderKind,
};
pub use error::{Error, Result};
pub use pkgcache_manifest::{Manifest, PackageDescriptor, PackageVersion, RunData};
