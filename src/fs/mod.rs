//! The virtual-filesystem projection: path routing, attribute/listing/
//! content producers, the slug sanitizer/resolver, and the thin `fuser`
//! adapter that bridges kernel callbacks into this pure async core.

pub mod attr;
pub mod content;
pub mod error;
pub mod fuse_adapter;
pub mod listing;
pub mod projection;
pub mod router;
pub mod slug;

pub use error::FsError;
pub use projection::Projection;
