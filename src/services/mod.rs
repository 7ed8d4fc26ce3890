pub mod content;
pub mod locks;
pub mod resolution;

pub use content::{ContentDigest, content_digest};
pub use locks::{KeyGuard, KeyedLocks};
pub use resolution::{RemoteListing, VersionOrigins, merge_origins, select_best};
