//! objsync inspects the object monitors and identity hashes of a Java VM image
//! that is suspended or dumped: a debugger-style, read-only view of live VM state.
//!
//! The embedder describes the image through the traits in [`vm`], attaches an
//! [`ObjectSynchronizer`], and signals when the image's layout database is
//! available. From then on it can:
//!
//! * resolve the identity hash of any object from its header
//!   ([`ObjectSynchronizer::identity_hash_value_for`]), following an inflated
//!   lock's monitor record, or a lightweight lock's displaced header when the
//!   image is suspended;
//! * walk every monitor record in the image's monitor blocks
//!   ([`ObjectSynchronizer::object_monitor_iterator`]).
//!
//! objsync never writes to the image and never allocates in it.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod error;
pub mod monitor;
mod object_synchronizer;
pub mod util;
pub mod vm;

pub use crate::error::{InspectError, Result};
pub use crate::object_synchronizer::ObjectSynchronizer;
