//! Address arithmetic shared by every core access path.

use crate::CoreError;

/// Wraps any integer address into `0..size`.
///
/// Total for all inputs, including large negative offsets. `size` must be
/// non-zero, which [`crate::MarsConfig::validate`] guarantees.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn fold(address: i64, size: usize) -> usize {
    address.rem_euclid(size as i64) as usize
}

/// Validates a raw absolute address without wrapping it.
///
/// # Errors
///
/// Returns [`CoreError::OutOfRange`] when `address` is negative or not
/// smaller than `size`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn validate_address(address: i64, size: usize) -> Result<usize, CoreError> {
    if address >= 0 && (address as u64) < size as u64 {
        Ok(address as usize)
    } else {
        Err(CoreError::OutOfRange { address, size })
    }
}
