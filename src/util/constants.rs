/// log2 of the number of bits in a byte
pub const LOG_BITS_IN_BYTE: u8 = 3;
/// The number of bits in a byte
pub const BITS_IN_BYTE: usize = 1 << LOG_BITS_IN_BYTE;

/// log2 of the number of bytes in an int (a Java `int`, 32 bits)
pub const LOG_BYTES_IN_INT: u8 = 2;
/// The number of bytes in an int
pub const BYTES_IN_INT: usize = 1 << LOG_BYTES_IN_INT;

#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 3;
/// The number of bytes in an address
pub const BYTES_IN_ADDRESS: usize = 1 << LOG_BYTES_IN_ADDRESS;
/// log2 of the number of bits in an address
pub const LOG_BITS_IN_ADDRESS: usize = LOG_BITS_IN_BYTE as usize + LOG_BYTES_IN_ADDRESS as usize;
/// The number of bits in an address
pub const BITS_IN_ADDRESS: usize = 1 << LOG_BITS_IN_ADDRESS;

/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = LOG_BYTES_IN_ADDRESS;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// Cache line size assumed by tests and benchmarks. A real image always
/// supplies `DEFAULT_CACHE_LINE_SIZE` itself.
pub const DEFAULT_CACHE_LINE_SIZE: usize = 64;

/// Mark word tag values. These are fixed by the header encoding, unlike the
/// masks and shifts which are resolved per image.
pub mod mark_tags {
    /// Low two bits of a lightweight-locked header: the word points at a displaced header.
    pub const LOCKED_VALUE: usize = 0b00;
    /// Low two bits of a neutral header carrying the identity hash.
    pub const UNLOCKED_VALUE: usize = 0b01;
    /// Low two bits of an inflated header: the word points at an `ObjectMonitor`.
    pub const MONITOR_VALUE: usize = 0b10;
    /// Low two bits of a header claimed by the collector.
    pub const MARKED_VALUE: usize = 0b11;
    /// Low three bits of a biased header.
    pub const BIASED_LOCK_PATTERN: usize = 0b101;

    /// A hash field of zero means no identity hash was assigned yet.
    pub const NO_HASH: usize = 0;
}

static_assertions::const_assert!(DEFAULT_CACHE_LINE_SIZE.is_power_of_two());
static_assertions::const_assert_eq!(BYTES_IN_WORD, std::mem::size_of::<usize>());
static_assertions::const_assert_eq!(
    mark_tags::BIASED_LOCK_PATTERN & 0b11,
    mark_tags::UNLOCKED_VALUE
);
