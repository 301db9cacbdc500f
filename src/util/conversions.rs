/* Alignment */

pub const fn raw_align_up(val: usize, align: usize) -> usize {
    // See https://github.com/rust-lang/rust/blob/e620d0f337d0643c757bab791fc7d88d63217704/src/libcore/alloc.rs#L192
    val.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1)
}

pub const fn raw_align_down(val: usize, align: usize) -> usize {
    val & !align.wrapping_sub(1)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/// Round `val` up to the next multiple of `multiple`. Unlike [`raw_align_up`],
/// `multiple` does not have to be a power of two: cache line sizes come from
/// the inspected image and are only validated, never assumed.
/// Returns `None` if `multiple` is zero or the result overflows.
pub const fn ceil_to_multiple(val: usize, multiple: usize) -> Option<usize> {
    if multiple == 0 {
        return None;
    }
    let rem = val % multiple;
    if rem == 0 {
        Some(val)
    } else {
        val.checked_add(multiple - rem)
    }
}

/* Conversion */

/// Convert an integer constant read from the image into a `usize`, rejecting
/// negative values.
pub fn constant_to_usize(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}
