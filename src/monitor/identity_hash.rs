use crate::error::{InspectError, Result};
use crate::monitor::{MarkWord, MonitorDirectory};
use crate::util::ObjectReference;
use crate::vm::MemoryReader;

/// Identity hash returned when the hash cannot be determined: the object is
/// lightweight-locked and displaced headers may not be followed.
pub const INDETERMINATE_HASH: usize = 0;

/// Recovers an object's identity hash from its header, following the monitor
/// or displaced header the header points at. Never writes to the image: an
/// object that has no hash yet reports 0 rather than getting one assigned.
pub struct IdentityHashResolver<'a, R: MemoryReader + ?Sized> {
    directory: &'a MonitorDirectory,
    reader: &'a R,
    debugging: bool,
}

impl<'a, R: MemoryReader + ?Sized> IdentityHashResolver<'a, R> {
    /// `debugging` is true when the observer reads a suspended image, the
    /// only case in which displaced headers are followed.
    pub fn new(directory: &'a MonitorDirectory, reader: &'a R, debugging: bool) -> Self {
        IdentityHashResolver {
            directory,
            reader,
            debugging,
        }
    }

    pub fn mark_word_of(&self, object: ObjectReference) -> Result<MarkWord> {
        if object.is_null() {
            return Err(InspectError::precondition("identity hash of a null reference"));
        }
        MarkWord::read(self.reader, object.to_raw_address(), *self.directory.mark_layout())
    }

    pub fn identity_hash_of(&self, object: ObjectReference) -> Result<usize> {
        let mark = self.mark_word_of(object)?;
        trace!("{} has {}", object, mark);

        if mark.is_unlocked() {
            return mark.hash();
        }

        if mark.has_monitor() {
            let layout = self.directory.monitor_layout()?;
            let monitor = mark.monitor()?;
            let header = monitor.header(self.reader, layout)?;
            trace!("{} inflated, {} saved {}", object, monitor, header);
            return header.hash();
        }

        // Lightweight-locked. The saved header is on the owner's stack and may
        // change under us unless the image is suspended.
        if self.debugging && mark.has_displaced_mark_helper() {
            let displaced = mark.displaced_mark_helper(self.reader)?;
            trace!("{} lightweight-locked, displaced {}", object, displaced);
            return displaced.hash();
        }

        debug!(
            "Cannot determine the identity hash of {} with {} (debugging: {})",
            object, mark, self.debugging
        );
        Ok(INDETERMINATE_HASH)
    }
}
