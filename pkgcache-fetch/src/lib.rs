//! Upstream access for the pkgcache mirror: an HTTP client that fetches
//! manifest documents and streams package bodies, and the on-disk package
//! store those bodies are verified into.

pub mod cache;
pub mod client;
pub mod digest;
pub mod error;

pub use cache::{CacheCheck, PackageCache};
pub use client::{ClientOptions, Download, UpstreamClient};
pub use error::{FetchError, Result};
