//! Depth-aware position sizing.

use rust_decimal::Decimal;

use super::Opportunity;
use crate::basket::Side;
use crate::depth::{total_depth, walk_cost, PriceLevel, SIZE_EPSILON};
use crate::error::DetectError;

const SOLVER_ITERATIONS: u32 = 50;

/// Bounds and constraints for the size solver.
#[derive(Debug, Clone)]
pub struct SizeBounds {
    /// Smallest size worth trading.
    pub min_size: Decimal,
    /// Hard cap on size.
    pub max_size: Decimal,
    /// Cap on total fee-inclusive spend.
    pub max_notional: Decimal,
    /// Minimum profit rate the sized plan must retain.
    pub min_profit_rate: Decimal,
}

/// Per-leg component of a sized plan.
#[derive(Debug, Clone)]
pub struct LegPlan {
    /// Index of the leg within the basket.
    pub leg_index: usize,
    /// Worst price touched when filling the full size.
    pub limit_price: Decimal,
    /// Fee-exclusive cost (or proceeds, for sells) of the fill.
    pub fill_cost: Decimal,
    /// Fee charged on the fill.
    pub fee: Decimal,
    /// Volume-weighted average price of the fill.
    pub vwap: Decimal,
}

/// A fully sized execution plan for one basket.
#[derive(Debug, Clone)]
pub struct SizedPlan {
    /// Chosen size in payout units.
    pub size: Decimal,
    /// Total fee-inclusive cost across legs.
    pub total_cost: Decimal,
    /// Guaranteed profit at settlement, `size - total_cost`.
    pub expected_profit: Decimal,
    /// Profit per unit of payout at the chosen size.
    pub profit_rate: Decimal,
    /// Per-leg fill details, aligned with the basket's legs.
    pub legs: Vec<LegPlan>,
}

impl SizedPlan {
    /// Profit per unit of capital deployed. Reporting only; thresholds and
    /// ranking use `profit_rate`.
    pub fn return_on_cost(&self) -> Decimal {
        if self.total_cost <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.expected_profit / self.total_cost
    }
}

/// Find the largest size in `[min_size, max_size]` that stays profitable
/// after walking every leg's depth, or `None` if even the minimum is not
/// viable.
///
/// Average fill cost is non-decreasing in size on each ladder, so the set of
/// sizes meeting the profit and notional constraints is a prefix interval and
/// binary search applies. The lower bound folds in the opportunity's
/// top-of-book venue floor; since a walked fill can cost more than top of
/// book, the floors are also re-checked on the solution.
pub fn solve_size(
    opportunity: &Opportunity,
    bounds: &SizeBounds,
) -> Result<Option<SizedPlan>, DetectError> {
    if bounds.min_size <= Decimal::ZERO || bounds.max_size < bounds.min_size {
        return Err(DetectError::InvalidSize(bounds.min_size));
    }

    let ladders: Vec<&[PriceLevel]> = opportunity
        .basket
        .legs
        .iter()
        .zip(&opportunity.books)
        .map(|(leg, book)| match leg.side {
            Side::Buy => book.asks.as_slice(),
            Side::Sell => book.bids.as_slice(),
        })
        .collect();

    let depth_cap = ladders
        .iter()
        .map(|ladder| total_depth(ladder))
        .min()
        .unwrap_or(Decimal::ZERO);
    let floor = bounds.min_size.max(opportunity.min_size);
    let upper = bounds.max_size.min(depth_cap).min(opportunity.max_size);

    if upper < floor {
        return Ok(None);
    }

    // The largest candidate is the common case when depth is ample.
    if let Some(plan) = plan_at(opportunity, &ladders, upper, bounds)? {
        return Ok(finalize(opportunity, plan));
    }
    if plan_at(opportunity, &ladders, floor, bounds)?.is_none() {
        return Ok(None);
    }

    let mut lo = floor;
    let mut hi = upper;
    for _ in 0..SOLVER_ITERATIONS {
        if hi - lo <= SIZE_EPSILON {
            break;
        }
        let mid = (lo + hi) / Decimal::TWO;
        if plan_at(opportunity, &ladders, mid, bounds)?.is_some() {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let plan = plan_at(opportunity, &ladders, lo, bounds)?;
    Ok(plan.and_then(|p| finalize(opportunity, p)))
}

/// Price the basket at `size`. Returns `None` when the size violates the
/// profit-rate or notional-cap constraints.
fn plan_at(
    opportunity: &Opportunity,
    ladders: &[&[PriceLevel]],
    size: Decimal,
    bounds: &SizeBounds,
) -> Result<Option<SizedPlan>, DetectError> {
    let mut legs = Vec::with_capacity(ladders.len());
    let mut total_cost = Decimal::ZERO;

    for (index, (leg, ladder)) in opportunity.basket.legs.iter().zip(ladders).enumerate() {
        let fill = walk_cost(ladder, size)?;
        let fee = fill.cost * leg.fee_rate;
        total_cost += match leg.side {
            Side::Buy => fill.cost + fee,
            Side::Sell => -(fill.cost - fee),
        };
        legs.push(LegPlan {
            leg_index: index,
            limit_price: fill.worst_price,
            fill_cost: fill.cost,
            fee,
            vwap: fill.vwap,
        });
    }

    let expected_profit = size - total_cost;
    let profit_rate = expected_profit / size;

    if profit_rate < bounds.min_profit_rate || total_cost > bounds.max_notional {
        return Ok(None);
    }

    Ok(Some(SizedPlan {
        size,
        total_cost,
        expected_profit,
        profit_rate,
        legs,
    }))
}

/// Apply the per-venue minimum-notional floors to a candidate plan.
fn finalize(opportunity: &Opportunity, plan: SizedPlan) -> Option<SizedPlan> {
    for leg_plan in &plan.legs {
        let leg = &opportunity.basket.legs[leg_plan.leg_index];
        if leg_plan.fill_cost < leg.min_notional {
            return None;
        }
    }
    Some(plan)
}
