//! Pyramid Access
//!
//! Access codes unlock the ebook. The server side checks a code against a
//! [`CodeStore`] and counts the use; the client side remembers the grant in
//! injected [`KeyValueStorage`].
//!
//! # Example
//!
//! ```rust
//! use pyramid_access::{AccessCode, AccessCodes, MemoryCodeStore};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryCodeStore::new());
//! store.upsert(AccessCode::new("PIVOT").with_max_uses(1));
//! let codes = AccessCodes::new(store);
//!
//! assert!(codes.redeem("PIVOT").await.unwrap().valid);
//! let second = codes.redeem("PIVOT").await.unwrap();
//! assert_eq!(second.error.as_deref(), Some("This code has reached its usage limit"));
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod client;
mod code;
mod error;
mod redeem;
mod store;

pub use client::{
    AccessGrant, AccessStore, JsonFileStorage, KeyValueStorage, MemoryStorage, ACCESS_KEY,
};
pub use code::{AccessCode, RedeemResult, Redemption, Rejection};
pub use error::AccessError;
pub use redeem::AccessCodes;
pub use store::{CodeBook, CodeStore, MemoryCodeStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
