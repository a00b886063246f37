//! Duplicate call suppression.
//!
//! A [`Group`] makes sure that only one execution of a piece of work is in
//! flight for a given key at a time. Callers that arrive while it runs wait
//! for it and receive a clone of the same result, error included. Nothing is
//! cached: as soon as the work completes its key is released, and the next
//! call runs the work again.
//!
//! ```
//! use singleflight::Group;
//!
//! let group: Group<String, u64, String> = Group::new();
//! let v = group.work("user:42".to_string(), || Ok(42));
//! assert_eq!(v, Ok(42));
//! ```
//!
//! Coordination is local to one process. There is no timeout or cancellation
//! of the shared work; wrap a caller's own wait if it needs one.

mod call;
mod group;
mod types;

pub use group::Group;
pub use types::{Options, SharedError, Stats};
