mod error;
mod hash;
mod traits;

pub mod memory;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use hash::{BLOB_KEY_PREFIX, ContentHash};
pub use traits::{ContentStore, ObjectTags, PUBLIC_TAG_KEY, PUBLIC_TAG_VALUE, public_tags};
