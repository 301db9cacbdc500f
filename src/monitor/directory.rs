use crate::error::{InspectError, Result};
use crate::monitor::block::{MonitorBlock, MonitorBlocks};
use crate::monitor::object_monitor::OBJECT_MONITOR_TYPE;
use crate::monitor::{MarkWordLayout, MonitorLayout};
use crate::util::conversions::constant_to_usize;
use crate::util::Address;
use crate::vm::{MemoryReader, TypeDatabase};

/// Name of the type whose static field holds the block list head.
pub const OBJECT_SYNCHRONIZER_TYPE: &str = "ObjectSynchronizer";
/// The static field holding the address of the first block.
pub const BLOCK_LIST_FIELD: &str = "gBlockList";
/// Monitors per block, including the link slot.
pub const BLOCK_SIZE_CONSTANT: &str = "ObjectSynchronizer::_BLOCKSIZE";
pub const CACHE_LINE_SIZE_CONSTANT: &str = "DEFAULT_CACHE_LINE_SIZE";

/// The list of monitor blocks of an image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockList {
    pub head: Address,
    /// Slots per block, the link slot included.
    pub block_size: usize,
}

/// Layout constants and the block list head of one image, resolved once when
/// the image's layout database becomes available and never changed after.
///
/// A directory resolved from an image that lacks some symbol is degraded:
/// it has no block list, so no monitors are observable, and
/// [`MonitorDirectory::degraded_reason`] says what was missing. Mark word
/// decoding still works in a degraded directory; following a monitor pointer
/// works if the monitor layout itself could be resolved.
#[derive(Clone, Debug)]
pub struct MonitorDirectory {
    mark_layout: MarkWordLayout,
    monitor_layout: Option<MonitorLayout>,
    block_list: Option<BlockList>,
    degraded: Option<InspectError>,
}

impl MonitorDirectory {
    /// Resolve the directory from the image. Never fails: missing symbols
    /// degrade the result instead.
    pub fn resolve<T, R>(types: &T, reader: &R) -> MonitorDirectory
    where
        T: TypeDatabase + ?Sized,
        R: MemoryReader + ?Sized,
    {
        let mark_layout = MarkWordLayout::resolve(types);
        let monitor_layout = Self::resolve_monitor_layout(types, mark_layout);
        let block_list = match &monitor_layout {
            Ok(_) => Self::resolve_block_list(types, reader),
            Err(e) => Err(e.clone()),
        };

        let directory = match (monitor_layout, block_list) {
            (Ok(layout), Ok(block_list)) => MonitorDirectory {
                mark_layout,
                monitor_layout: Some(layout),
                block_list,
                degraded: None,
            },
            (Ok(layout), Err(e)) => MonitorDirectory::degraded(mark_layout, Some(layout), e),
            (Err(e), _) => MonitorDirectory::degraded(mark_layout, None, e),
        };

        match (&directory.degraded, &directory.block_list) {
            (Some(reason), _) => {
                warn!("No monitors observable in this image: {}", reason);
            }
            (None, Some(list)) => {
                info!(
                    "Monitor directory ready: head {}, {} slots per block, stride {}",
                    list.head,
                    list.block_size,
                    directory.monitor_layout.map_or(0, |l| l.stride)
                );
            }
            (None, None) => {
                info!("Monitor directory ready: no monitor blocks allocated yet");
            }
        }
        directory
    }

    /// Build a directory from values the embedder already resolved.
    /// `head` may be `None` for an image that has not allocated any monitor block.
    pub fn from_parts(
        mark_layout: MarkWordLayout,
        monitor_layout: MonitorLayout,
        block_size: usize,
        head: Option<Address>,
    ) -> Result<MonitorDirectory> {
        Self::check_block_size(block_size)?;
        if monitor_layout.stride % monitor_layout.cache_line_size != 0
            || monitor_layout.stride < monitor_layout.size
        {
            return Err(InspectError::layout_unavailable(format!(
                "stride {} does not pad size {} to cache line {}",
                monitor_layout.stride, monitor_layout.size, monitor_layout.cache_line_size
            )));
        }
        Ok(MonitorDirectory {
            mark_layout,
            monitor_layout: Some(monitor_layout),
            block_list: head.map(|head| BlockList { head, block_size }),
            degraded: None,
        })
    }

    fn degraded(
        mark_layout: MarkWordLayout,
        monitor_layout: Option<MonitorLayout>,
        reason: InspectError,
    ) -> MonitorDirectory {
        MonitorDirectory {
            mark_layout,
            monitor_layout,
            block_list: None,
            degraded: Some(reason),
        }
    }

    fn resolve_monitor_layout<T: TypeDatabase + ?Sized>(
        types: &T,
        mark_layout: MarkWordLayout,
    ) -> Result<MonitorLayout> {
        let cache_line_size = Self::int_constant(types, CACHE_LINE_SIZE_CONSTANT)?;
        let ty = types.lookup_type(OBJECT_MONITOR_TYPE).ok_or_else(|| {
            InspectError::layout_unavailable(format!("type {} not exported", OBJECT_MONITOR_TYPE))
        })?;
        MonitorLayout::from_type(&ty, cache_line_size, mark_layout)
    }

    /// `Ok(None)` means the image exports everything but has no block yet.
    fn resolve_block_list<T, R>(types: &T, reader: &R) -> Result<Option<BlockList>>
    where
        T: TypeDatabase + ?Sized,
        R: MemoryReader + ?Sized,
    {
        let block_size = Self::int_constant(types, BLOCK_SIZE_CONSTANT)?;
        Self::check_block_size(block_size)?;
        let head_field = types
            .lookup_type(OBJECT_SYNCHRONIZER_TYPE)
            .and_then(|ty| ty.static_field_address(BLOCK_LIST_FIELD))
            .ok_or_else(|| {
                InspectError::layout_unavailable(format!(
                    "{}::{} not exported",
                    OBJECT_SYNCHRONIZER_TYPE, BLOCK_LIST_FIELD
                ))
            })?;
        let head = reader.read_address(head_field)?;
        debug!("{}::{} at {} = {}", OBJECT_SYNCHRONIZER_TYPE, BLOCK_LIST_FIELD, head_field, head);
        Ok(head.non_null().map(|head| BlockList { head, block_size }))
    }

    fn int_constant<T: TypeDatabase + ?Sized>(types: &T, name: &str) -> Result<usize> {
        let value = types.lookup_int_constant(name).ok_or_else(|| {
            InspectError::layout_unavailable(format!("constant {} not exported", name))
        })?;
        constant_to_usize(value).ok_or_else(|| {
            InspectError::layout_unavailable(format!("constant {} = {} is negative", name, value))
        })
    }

    fn check_block_size(block_size: usize) -> Result<()> {
        if block_size < 2 {
            return Err(InspectError::layout_unavailable(format!(
                "block size {} leaves no record slot",
                block_size
            )));
        }
        Ok(())
    }

    pub fn mark_layout(&self) -> &MarkWordLayout {
        &self.mark_layout
    }

    /// The monitor record layout, or why it is unavailable.
    pub fn monitor_layout(&self) -> Result<&MonitorLayout> {
        match (&self.monitor_layout, &self.degraded) {
            (Some(layout), _) => Ok(layout),
            (None, Some(reason)) => Err(reason.clone()),
            (None, None) => unreachable!("a healthy directory always has a monitor layout"),
        }
    }

    pub fn block_list(&self) -> Option<&BlockList> {
        self.block_list.as_ref()
    }

    /// Address of the first block, `None` if there is none or the directory is degraded.
    pub fn head(&self) -> Option<Address> {
        self.block_list.map(|list| list.head)
    }

    pub fn block_size(&self) -> Option<usize> {
        self.block_list.map(|list| list.block_size)
    }

    pub fn record_stride(&self) -> Option<usize> {
        self.monitor_layout.map(|layout| layout.stride)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn degraded_reason(&self) -> Option<&InspectError> {
        self.degraded.as_ref()
    }

    /// The first block, if monitors are observable.
    pub fn head_block(&self) -> Option<MonitorBlock<'_>> {
        let list = self.block_list?;
        let layout = self.monitor_layout.as_ref()?;
        Some(MonitorBlock::new(list.head, list.block_size, layout))
    }

    /// Walk the blocks in link order.
    pub fn blocks<'a, R: MemoryReader + ?Sized>(
        &'a self,
        reader: &'a R,
        limit: usize,
    ) -> Option<MonitorBlocks<'a, R>> {
        self.head_block().map(|head| MonitorBlocks::new(reader, head, limit))
    }
}
