//! Ownership-polymorphic handles.
//!
//! Code that merely needs to reach an object should not have to decide, at
//! the call site, whether the object is shared and refcounted, owned
//! somewhere else, or only observed. This crate provides one handle type for
//! all of these:
//!
//! - `OwningHandle` holds its target by borrow or by shared ownership, and
//!   checks for `Unset` on every access rather than at construction.
//! - `WeakHandle` additionally admits a weak observer, and produces an
//!   `OwningHandle` on demand with `lock`.
//! - `invoke` and `invoke_weak` call an operation on the target of any of
//!   these, or of a plain reference, `Box`, `Rc`, `Arc` or weak pointer.
//!
//! Failures are `ChainedError`s, which carry an optional cause and can be
//! wrapped with added context as they propagate.
//!
//! Handles are generic over their `Family`: `Local` builds on `Rc` and is the
//! default, `Global` (feature `global`) builds on `Arc`.
//!
//! ```
//! use mptr::{invoke, invoke_weak, OwningHandle};
//! use std::cell::Cell;
//!
//! #[derive(Default)]
//! struct Counter(Cell<u32>);
//!
//! impl Counter
//! {
//!     fn add(&self, n: u32) { self.0.set(self.0.get() + n) }
//! }
//!
//! let counter = OwningHandle::new(Counter::default());
//! let observer = counter.downgrade();
//!
//! invoke(&counter, Counter::add, (2,))?;
//! assert!(invoke_weak(&observer, Counter::add, (3,)));
//! assert_eq!(counter.get()?.0.get(), 5);
//!
//! drop(counter);
//! assert!(!invoke_weak(&observer, Counter::add, (4,)));
//! # Ok::<(), mptr::ChainedError>(())
//! ```

pub mod dispatch;
pub mod error;
pub mod family;
pub mod pointers;
pub mod stats;

#[cfg(test)]
mod tests;

pub use dispatch::{invoke, invoke_weak, invoke_weak_with, Callable, Holds, Observes};
pub use error::{ChainedError, Context, ErrorKind};
#[cfg(feature = "global")]
pub use family::Global;
pub use family::{Family, Local, Upcast};
pub use pointers::{Mode, OwningHandle, WeakHandle};
#[cfg(feature = "global")]
pub use stats::global_stats;
pub use stats::{thread_local_stats, Stats};
