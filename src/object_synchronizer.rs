use crate::error::{InspectError, Result};
use crate::monitor::{
    IdentityHashResolver, MonitorDirectory, MonitorRecord, ObjectMonitorIterator,
};
use crate::util::logger;
use crate::util::options::Options;
use crate::util::rust_util::InitializeOnce;
use crate::util::ObjectReference;
use crate::vm::TargetProcess;

/// An inspector attached to one image.
///
/// The embedder creates it when it attaches, then calls
/// [`ObjectSynchronizer::on_layout_available`] once the image's layout database
/// can be read (for a live VM, after its global structures are initialized).
/// Until then no monitors are observable and identity hashes cannot be resolved.
///
/// All reads are made on the caller's thread. The directory is shared by all
/// callers once resolved; each walk gets its own iterator.
pub struct ObjectSynchronizer<P: TargetProcess> {
    process: P,
    options: Options,
    directory: InitializeOnce<MonitorDirectory>,
}

impl<P: TargetProcess> ObjectSynchronizer<P> {
    /// Attach with options from the built-in defaults and `OBJSYNC_*` environment variables.
    pub fn new(process: P) -> Self {
        Self::with_options(process, Options::default())
    }

    pub fn with_options(process: P, options: Options) -> Self {
        logger::init_on_attach();
        debug!(
            "Attached inspector (target debugging: {}, options: {:?})",
            process.is_debugging(),
            options
        );
        ObjectSynchronizer {
            process,
            options,
            directory: InitializeOnce::new(),
        }
    }

    /// The layout database of the image became available. Resolves the
    /// directory. Only the first call does anything; it returns true. Calls
    /// racing with the first block until it is done.
    pub fn on_layout_available(&self) -> bool {
        let initialized = self.directory.initialize_once(|| {
            MonitorDirectory::resolve(self.process.type_database(), self.process.reader())
        });
        if !initialized {
            debug!("Layout already resolved. Ignoring repeated layout event.");
        }
        initialized
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Detach, handing the process back.
    pub fn into_process(self) -> P {
        self.process
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The directory, once the layout event has fired.
    pub fn directory(&self) -> Option<&MonitorDirectory> {
        self.directory.get()
    }

    /// Whether displaced headers are followed: the configured
    /// [`crate::util::options::InspectionMode`], with `Auto` deferring to the target.
    pub fn is_debugging(&self) -> bool {
        self.options.is_debugging(self.process.is_debugging())
    }

    fn resolved_directory(&self) -> Result<&MonitorDirectory> {
        self.directory
            .get()
            .ok_or_else(|| InspectError::layout_unavailable("layout database not available yet"))
    }

    /// A resolver bound to this image.
    pub fn identity_hash_resolver(&self) -> Result<IdentityHashResolver<'_, P::Reader>> {
        Ok(IdentityHashResolver::new(
            self.resolved_directory()?,
            self.process.reader(),
            self.is_debugging(),
        ))
    }

    /// The identity hash of `object`, or 0 if it is lightweight-locked and
    /// displaced headers may not be followed.
    pub fn identity_hash_value_for(&self, object: ObjectReference) -> Result<usize> {
        self.identity_hash_resolver()?.identity_hash_of(object)
    }

    /// A walk over every monitor record slot, or `None` if no monitors are
    /// observable: the layout event has not fired, the directory is degraded,
    /// or the image has not allocated any block yet.
    pub fn object_monitor_iterator(&self) -> Option<ObjectMonitorIterator<'_, P::Reader>> {
        ObjectMonitorIterator::new(
            self.directory.get()?,
            self.process.reader(),
            self.options.max_monitor_blocks,
        )
    }

    /// Snapshots of the records that are associated with an object.
    pub fn live_monitors(&self) -> Result<Vec<MonitorRecord>> {
        let Some(iter) = self.object_monitor_iterator() else {
            return Ok(vec![]);
        };
        let layout = self.resolved_directory()?.monitor_layout()?;
        let reader = self.process.reader();
        let mut live = vec![];
        for monitor in iter {
            let record = monitor?.snapshot(reader, layout)?;
            if record.is_live {
                live.push(record);
            }
        }
        debug!("{} live monitors", live.len());
        Ok(live)
    }

    /// Number of record slots in all blocks, free or not.
    pub fn monitor_count(&self) -> Result<usize> {
        let Some(directory) = self.directory.get() else {
            return Ok(0);
        };
        let reader = self.process.reader();
        let Some(blocks) = directory.blocks(reader, self.options.max_monitor_blocks) else {
            return Ok(0);
        };
        let mut count = 0;
        for block in blocks {
            count += block?.record_slots();
        }
        Ok(count)
    }
}
