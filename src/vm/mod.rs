//! objsync does not attach to processes or parse symbol tables itself. An embedder (a
//! debugger, a core file reader, a test harness) describes the inspected image by
//! implementing the traits in this module:
//!
//! * [`MemoryReader`]: read-only access to the image's memory.
//! * [`TypeDatabase`]: the image's exported type layouts and integer constants.
//! * [`TargetProcess`]: one attached image, tying the two together.

mod memory;
mod type_database;

pub use self::memory::MemoryReader;
pub use self::memory::ReadError;
pub use self::type_database::FieldInfo;
pub use self::type_database::FieldKind;
pub use self::type_database::TypeDatabase;
pub use self::type_database::TypeInfo;

/// An attached image. All reads through it happen on the observer thread
/// while the target is expected to be suspended.
pub trait TargetProcess {
    type Reader: MemoryReader + ?Sized;
    type Types: TypeDatabase + ?Sized;

    /// The memory of the image.
    fn reader(&self) -> &Self::Reader;

    /// The layout database of the image.
    fn type_database(&self) -> &Self::Types;

    /// True if the observer inspects a different, suspended process (a
    /// debugger attach or a core file) rather than its own live memory.
    /// Only then are displaced headers stable enough to follow.
    fn is_debugging(&self) -> bool;
}
