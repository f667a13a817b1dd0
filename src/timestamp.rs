//! Timestamp rescaling into the MPEG-2 timebase.
//!
//! TS PTS/DTS values are always expressed in 90 kHz ticks. Samples arrive
//! in their track's native timescale and are rescaled on the way into each
//! PES packet.

/// 90 kHz clock for PTS/DTS (ISO/IEC 13818-1).
pub const MPEG2_TIMESCALE: u64 = 90_000;

/// Rescale a timestamp from `timescale` ticks per second to 90 kHz.
///
/// Computes `value * 90000 / timescale` in 128-bit intermediates, rounding
/// half-to-even, so large timestamps neither overflow nor drift. When the
/// input timescale is already 90 kHz this is the identity.
///
/// `timescale` must be non-zero; the generator validates that at
/// initialization.
pub fn rescale_to_90khz(value: i64, timescale: u32) -> i64 {
    debug_assert!(timescale != 0);
    if u64::from(timescale) == MPEG2_TIMESCALE {
        return value;
    }

    let numerator = i128::from(value) * i128::from(MPEG2_TIMESCALE);
    let denominator = i128::from(timescale);

    let quotient = numerator.div_euclid(denominator);
    let remainder = numerator.rem_euclid(denominator);

    // Round half-to-even on the remainder.
    let doubled = remainder * 2;
    let round_up = doubled > denominator || (doubled == denominator && quotient % 2 != 0);
    let rounded = if round_up { quotient + 1 } else { quotient };
    rounded as i64
}
