use crate::error::{InspectError, Result};
use crate::monitor::block::MonitorBlock;
use crate::monitor::{MonitorDirectory, ObjectMonitor};
use crate::util::Address;
use crate::vm::MemoryReader;

/// A single pass over every record slot of every block in a directory.
///
/// Slots are visited from the highest index down to 1 within a block (slot 0
/// is the link), and blocks in link order. Free slots are yielded too; use
/// [`ObjectMonitor::snapshot`] and `is_live` to tell them apart.
///
/// A failed link read is yielded once as an error, after which the iterator
/// is exhausted. So is a block list longer than the configured limit.
/// Each walk needs its own iterator; it is not shared between threads.
pub struct ObjectMonitorIterator<'a, R: MemoryReader + ?Sized> {
    reader: &'a R,
    head: Address,
    block: MonitorBlock<'a>,
    /// The next slot to yield in `block`. Zero means `block` is used up.
    index: usize,
    blocks_visited: usize,
    max_blocks: usize,
    done: bool,
}

impl<'a, R: MemoryReader + ?Sized> ObjectMonitorIterator<'a, R> {
    /// Start at the head of `directory`. Returns `None` if the directory has
    /// no observable block list.
    pub fn new(
        directory: &'a MonitorDirectory,
        reader: &'a R,
        max_blocks: usize,
    ) -> Option<ObjectMonitorIterator<'a, R>> {
        let head = directory.head_block()?;
        trace!("Walking monitor blocks from {}", head);
        Some(ObjectMonitorIterator {
            reader,
            head: head.base(),
            block: head,
            index: head.capacity() - 1,
            blocks_visited: 1,
            max_blocks,
            done: false,
        })
    }

    /// Whether [`Iterator::next`] would yield another item: a slot is left in
    /// the current block, or the current block links to another one.
    pub fn has_next(&self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        if self.index > 0 {
            return Ok(true);
        }
        Ok(self.block.link(self.reader)?.is_some())
    }

    /// The block the cursor is in.
    pub fn current_block(&self) -> &MonitorBlock<'a> {
        &self.block
    }

    fn advance_block(&mut self) -> Option<Result<()>> {
        let next = match self.block.link(self.reader) {
            Ok(Some(next)) => next,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        self.blocks_visited += 1;
        trace!("Advancing to {}", next);
        self.block = next;
        self.index = next.capacity() - 1;
        Some(Ok(()))
    }
}

impl<R: MemoryReader + ?Sized> Iterator for ObjectMonitorIterator<'_, R> {
    type Item = Result<ObjectMonitor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.index == 0 {
            match self.advance_block() {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
        if self.blocks_visited > self.max_blocks {
            warn!(
                "Gave up after {} monitor blocks. The list may be corrupt or cyclic.",
                self.max_blocks
            );
            self.done = true;
            return Some(Err(InspectError::BlockListTooLong {
                head: self.head,
                limit: self.max_blocks,
            }));
        }
        let monitor = self.block.record(self.index);
        self.index -= 1;
        if monitor.is_err() {
            self.done = true;
        }
        Some(monitor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (self.index, None)
        }
    }
}

impl<R: MemoryReader + ?Sized> std::iter::FusedIterator for ObjectMonitorIterator<'_, R> {}
