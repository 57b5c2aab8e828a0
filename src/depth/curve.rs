//! Cost-curve evaluation over order-book ladders.

use rust_decimal::Decimal;

use super::types::PriceLevel;
use crate::error::DetectError;

/// Epsilon for all size and cost comparisons (1e-9).
pub const SIZE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Result of walking a ladder for a target size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderFill {
    /// Size filled (equals the target on success).
    pub filled_size: Decimal,
    /// Total cost to fill, fee-exclusive.
    pub cost: Decimal,
    /// Volume-weighted average price of the fill.
    pub vwap: Decimal,
    /// Worst (last) price level touched.
    pub worst_price: Decimal,
}

impl LadderFill {
    fn zero() -> Self {
        Self {
            filled_size: Decimal::ZERO,
            cost: Decimal::ZERO,
            vwap: Decimal::ZERO,
            worst_price: Decimal::ZERO,
        }
    }
}

/// Walk a ladder in the order given, accumulating cost until `target_size`
/// is filled.
///
/// Returns [`DetectError::InsufficientLiquidity`] if the ladder is exhausted
/// first. A non-positive target yields a trivial zero fill. For a fixed
/// ladder, `cost / filled_size` is non-decreasing in the target: each
/// successive unit fills at an equal-or-worse price, which is what makes the
/// size solver's binary search valid.
pub fn walk_cost(ladder: &[PriceLevel], target_size: Decimal) -> Result<LadderFill, DetectError> {
    if target_size <= SIZE_EPSILON {
        return Ok(LadderFill::zero());
    }

    let mut remaining = target_size;
    let mut cost = Decimal::ZERO;
    let mut worst_price = Decimal::ZERO;

    for level in ladder {
        if remaining <= SIZE_EPSILON {
            break;
        }

        let fill_size = remaining.min(level.size);
        cost += fill_size * level.price;
        remaining -= fill_size;
        worst_price = level.price;
    }

    if remaining > SIZE_EPSILON {
        return Err(DetectError::InsufficientLiquidity {
            required: target_size,
            available: target_size - remaining,
        });
    }

    Ok(LadderFill {
        filled_size: target_size,
        cost,
        vwap: cost / target_size,
        worst_price,
    })
}

/// Total size available on a ladder.
pub fn total_depth(ladder: &[PriceLevel]) -> Decimal {
    ladder.iter().map(|l| l.size).sum()
}
