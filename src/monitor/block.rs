use std::fmt;

use crate::error::{InspectError, Result};
use crate::monitor::{MonitorLayout, ObjectMonitor};
use crate::util::Address;
use crate::vm::MemoryReader;

/// Index of the slot whose `_next_om` field links a block to the next one.
/// That slot never holds a usable monitor.
pub const LINK_SLOT: usize = 0;

/// One fixed-capacity block of monitor records.
///
/// ```text
/// base                base + stride       base + 2*stride           base + (capacity-1)*stride
/// | slot 0 (link) ... | slot 1 ........ | slot 2 ........ | ... | slot capacity-1 ...... |
/// ```
#[derive(Copy, Clone)]
pub struct MonitorBlock<'a> {
    base: Address,
    capacity: usize,
    layout: &'a MonitorLayout,
}

impl<'a> MonitorBlock<'a> {
    pub fn new(base: Address, capacity: usize, layout: &'a MonitorLayout) -> MonitorBlock<'a> {
        debug_assert!(!base.is_zero());
        debug_assert!(capacity > 1, "a block needs a link slot and at least one record");
        MonitorBlock {
            base,
            capacity,
            layout,
        }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots that can hold a monitor (all but the link slot).
    pub fn record_slots(&self) -> usize {
        self.capacity - 1
    }

    /// The block linked from this one, or `None` for the last block.
    pub fn link<R: MemoryReader + ?Sized>(&self, reader: &R) -> Result<Option<MonitorBlock<'a>>> {
        let next = ObjectMonitor::new(self.base).next_om(reader, self.layout)?;
        Ok(next.map(|base| MonitorBlock::new(base, self.capacity, self.layout)))
    }

    /// Address of the record in `index`. Fails for the link slot and for
    /// indices past the block.
    pub fn slot_address(&self, index: usize) -> Result<Address> {
        if index == LINK_SLOT || index >= self.capacity {
            return Err(InspectError::precondition(format!(
                "slot {} of {} is not a record slot (capacity {})",
                index, self, self.capacity
            )));
        }
        index
            .checked_mul(self.layout.stride)
            .and_then(|offset| self.base.checked_add(offset))
            .ok_or_else(|| {
                InspectError::precondition(format!("slot {} of {} overflows", index, self))
            })
    }

    pub fn record(&self, index: usize) -> Result<ObjectMonitor> {
        self.slot_address(index).map(ObjectMonitor::new)
    }
}

impl fmt::Display for MonitorBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MonitorBlock@{}", self.base)
    }
}

impl fmt::Debug for MonitorBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MonitorBlock")
            .field("base", &self.base)
            .field("capacity", &self.capacity)
            .field("stride", &self.layout.stride)
            .finish()
    }
}

/// Walks blocks along their links, head first. Stops with
/// [`InspectError::BlockListTooLong`] after `limit` blocks, and fuses after
/// any error.
pub struct MonitorBlocks<'a, R: MemoryReader + ?Sized> {
    reader: &'a R,
    next: Option<MonitorBlock<'a>>,
    head: Address,
    visited: usize,
    limit: usize,
}

impl<'a, R: MemoryReader + ?Sized> MonitorBlocks<'a, R> {
    pub fn new(reader: &'a R, head: MonitorBlock<'a>, limit: usize) -> Self {
        MonitorBlocks {
            reader,
            next: Some(head),
            head: head.base(),
            visited: 0,
            limit,
        }
    }
}

impl<'a, R: MemoryReader + ?Sized> Iterator for MonitorBlocks<'a, R> {
    type Item = Result<MonitorBlock<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.next.take()?;
        if self.visited == self.limit {
            return Some(Err(InspectError::BlockListTooLong {
                head: self.head,
                limit: self.limit,
            }));
        }
        self.visited += 1;
        match block.link(self.reader) {
            Ok(next) => {
                self.next = next;
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl<R: MemoryReader + ?Sized> std::iter::FusedIterator for MonitorBlocks<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_util::fake_process::FakeProcess;
    use crate::vm::TargetProcess;

    #[test]
    fn slot_addresses_use_stride() {
        let mut fake = FakeProcess::builder().block_size(4).build();
        let base = fake.add_block();
        let layout = fake.monitor_layout();
        let block = MonitorBlock::new(base, 4, &layout);

        assert_eq!(block.record_slots(), 3);
        assert_eq!(block.slot_address(1), Ok(base + layout.stride));
        assert_eq!(block.slot_address(3), Ok(base + 3 * layout.stride));
        assert!(matches!(
            block.slot_address(LINK_SLOT),
            Err(InspectError::PreconditionViolation(_))
        ));
        assert!(matches!(
            block.slot_address(4),
            Err(InspectError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn link_chain() {
        let mut fake = FakeProcess::builder().block_size(4).build();
        let b0 = fake.add_block();
        let b1 = fake.add_block();
        let b2 = fake.add_block();
        let layout = fake.monitor_layout();
        let head = MonitorBlock::new(b0, 4, &layout);

        let bases: Vec<Address> = MonitorBlocks::new(fake.reader(), head, 16)
            .map(|b| b.map(|b| b.base()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(bases, vec![b0, b1, b2]);
    }

    #[test]
    fn cyclic_chain_hits_limit() {
        let mut fake = FakeProcess::builder().block_size(2).build();
        let b0 = fake.add_block();
        let b1 = fake.add_block();
        // b1 -> b0 closes a cycle.
        fake.link_blocks(b1, b0);
        let layout = fake.monitor_layout();
        let head = MonitorBlock::new(b0, 2, &layout);

        let items: Vec<_> = MonitorBlocks::new(fake.reader(), head, 5).collect();
        assert_eq!(items.len(), 6);
        assert!(items[..5].iter().all(|b| b.is_ok()));
        assert_eq!(
            items[5].as_ref().map(|_| ()),
            Err(&InspectError::BlockListTooLong { head: b0, limit: 5 })
        );
    }
}
