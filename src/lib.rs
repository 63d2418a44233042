//! # SharedBox: Reference-Counted Box with a Replaceable Destroyer
//!
//! [`SharedBox`] owns a heap-allocated object and shares that ownership with every
//! clone made from it. The clones of one box form a *family*; the family's destroyer
//! runs exactly once, when its last member goes away.
//!
//! ## Core Concept
//!
//! Like [`Rc`](https://doc.rust-lang.org/std/rc/struct.Rc.html), but the cleanup is
//! not fixed to dropping the value: a family can carry a custom destroyer, which
//! makes `SharedBox` usable for things that must be *returned* rather than freed,
//! such as pooled connections or handles from a foreign allocator. A box can also
//! be empty, reset to a new object, or give its object back with
//! [`release`](SharedBox::release).
//!
//! ## Quick Start
//!
//! Add SharedBox to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sharedbox = "0.1"
//! ```
//!
//! Basic usage:
//!
//! ```rust
//! use sharedbox::{make_shared, SharedBox};
//!
//! let a = make_shared(vec![1, 2, 3]);
//! let b = a.clone();
//!
//! assert!(SharedBox::same_family(&a, &b));
//! assert_eq!(SharedBox::use_count(&a), 2);
//!
//! drop(a);
//! assert!(SharedBox::is_unique(&b));
//! println!("Still alive: {:?}", *b);
//! ```
//!
//! ## Configuration
//!
//! ### Feature Flags
//!
//! - **`std`** (enabled by default)
//!   - Links to the standard library
//!   - Disable for `#![no_std]` environments: `default-features = false`
//!
//! - **`log`** (optional)
//!   - Emits `trace` records through the [`log`](https://docs.rs/log) facade when a
//!     family is born, dies, or is disarmed by a release
//!
//! ### No-std Usage
//!
//! SharedBox only needs `alloc`:
//!
//! ```toml
//! [dependencies]
//! sharedbox = { version = "0.1", default-features = false }
//! ```
//!
//! ## Custom Destroyers
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use sharedbox::SharedBox;
//!
//! let pool = Rc::new(RefCell::new(Vec::new()));
//!
//! let buf = SharedBox::new_with(Vec::<u8>::with_capacity(4096), {
//!     let pool = pool.clone();
//!     move |mut buf: Box<Vec<u8>>| {
//!         buf.clear();
//!         pool.borrow_mut().push(buf);
//!     }
//! });
//!
//! let reader = buf.clone();
//! drop(buf);
//! drop(reader);
//! assert_eq!(pool.borrow().len(), 1);
//! ```
//!
//! ## Threads
//!
//! The member count is a plain integer, so `SharedBox` is neither `Send` nor
//! `Sync`. Share across threads with `Arc` instead.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(clippy::as_conversions)]

extern crate alloc;

#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

mod family;
mod sharedbox;

pub use crate::sharedbox::{make_shared, try_make_shared, SharedBox};
