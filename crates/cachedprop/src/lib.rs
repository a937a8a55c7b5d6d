//! # cachedprop
//!
//! Per-instance memoizing accessors with invalidation on write.
//!
//! ## Architecture
//! - **Accessor**: shared, immutable bundle of compute/write/remove functions
//! - **Slots**: instance-owned table, one slot per accessor keyed by `AccessorId`
//! - **Sync** (`sync` feature, on by default): locked variant for instances
//!   shared across threads
//!
//! ## Contract
//! - `read` computes at most once until the slot is invalidated
//! - `write` and `remove` always clear the slot after running their function
//! - Mutations that bypass the accessor are not observed
//!
//! ```
//! use cachedprop::{Accessor, CacheHost, Slots};
//!
//! struct Test {
//!     p: i32,
//!     slots: Slots,
//! }
//!
//! impl CacheHost for Test {
//!     fn slots(&self) -> &Slots {
//!         &self.slots
//!     }
//! }
//!
//! let p = Accessor::new("p", |t: &Test| t.p).with_write(|t, value| t.p = value);
//! let mut t = Test { p: 10, slots: Slots::new() };
//!
//! assert_eq!(p.read(&t).unwrap(), 10);
//! p.write(&mut t, 20).unwrap();
//! assert_eq!(p.read(&t).unwrap(), 20);
//! ```

#![warn(missing_docs)]

#[macro_use]
mod bindings;

mod accessor;
mod error;
mod slots;
mod stats;
#[cfg(feature = "sync")]
mod sync;

pub use accessor::{Accessor, AccessorId};
pub use error::{Error, Result};
pub use slots::{CacheHost, Slots};
pub use stats::CacheStats;
#[cfg(feature = "sync")]
pub use sync::{SyncAccessor, SyncCacheHost, SyncSlots};
