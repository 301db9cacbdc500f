//! The object monitor subsystem of an inspected image, read-only.
//!
//! * [`mark_word`]: decoding of object headers.
//! * [`object_monitor`]: one inflated lock record.
//! * [`block`]: fixed-capacity blocks of records, linked through slot 0.
//! * [`directory`]: layout constants and the block list head, resolved once per image.
//! * [`iterator`]: a walk over every record slot.
//! * [`identity_hash`]: identity hash recovery through the header, the monitor, or the displaced header.

pub mod block;
pub mod directory;
pub mod identity_hash;
pub mod iterator;
pub mod mark_word;
pub mod object_monitor;

pub use self::block::MonitorBlock;
pub use self::directory::MonitorDirectory;
pub use self::identity_hash::IdentityHashResolver;
pub use self::iterator::ObjectMonitorIterator;
pub use self::mark_word::{MarkState, MarkWord, MarkWordLayout};
pub use self::object_monitor::{MonitorLayout, MonitorRecord, ObjectMonitor};
