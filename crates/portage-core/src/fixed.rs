use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// An amount of a fungible resource.
pub type Quantity = Fixed64;

/// Elapsed or remaining time in seconds.
pub type Seconds = Fixed64;

/// Number of scheduler passes since the network was created.
pub type Ticks = u64;

/// Stored amounts at or below this are clamped to zero on removal so that
/// repeated partial withdrawals never leave a near-zero ghost entry behind.
pub const QUANTITY_EPSILON: Quantity = Fixed64::from_bits(1 << 12);

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert an f64 from untrusted input. `None` when the value is not finite
/// or falls outside the Q32.32 range.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and logging.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Whether two quantities are equal within [`QUANTITY_EPSILON`].
#[inline]
pub fn approx_eq(a: Quantity, b: Quantity) -> bool {
    (a - b).abs() <= QUANTITY_EPSILON
}
