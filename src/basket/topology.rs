//! Basket topology loading.
//!
//! The topology file is the single place where venues, fees, and basket
//! directions are declared. It is parsed once at startup into immutable
//! typed records; nothing downstream touches raw JSON.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::{Basket, FillMode, Leg, Market, Side};
use crate::error::ConfigError;

/// Per-venue trading parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueParams {
    /// Taker fee rate, e.g. "0.02" for 2%.
    pub fee_rate: Decimal,
    /// Minimum notional per order.
    pub min_notional: Decimal,
}

/// Raw topology file shape.
#[derive(Debug, Deserialize)]
struct TopologyFile {
    venues: HashMap<String, VenueParams>,
    markets: Vec<MarketSpec>,
}

#[derive(Debug, Deserialize)]
struct MarketSpec {
    id: String,
    directions: Vec<DirectionSpec>,
}

#[derive(Debug, Deserialize)]
struct DirectionSpec {
    id: String,
    legs: Vec<LegSpec>,
}

#[derive(Debug, Deserialize)]
struct LegSpec {
    venue: String,
    instrument: String,
    #[serde(default = "default_side")]
    side: Side,
    #[serde(default)]
    fill_mode: FillMode,
}

fn default_side() -> Side {
    Side::Buy
}

/// Load and validate a topology file, resolving per-venue fees and minimum
/// notionals into each leg.
pub fn load_topology(path: impl AsRef<Path>) -> Result<Vec<Market>, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::TopologyRead {
        path: path.display().to_string(),
        source,
    })?;
    let file: TopologyFile = serde_json::from_str(&raw)?;

    parse_topology(file)
}

fn parse_topology(file: TopologyFile) -> Result<Vec<Market>, ConfigError> {
    for (venue, params) in &file.venues {
        if params.fee_rate < Decimal::ZERO || params.fee_rate >= Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "venue {venue}: fee_rate must be in [0, 1)"
            )));
        }
        if params.min_notional < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "venue {venue}: min_notional must be non-negative"
            )));
        }
    }

    if file.markets.is_empty() {
        return Err(ConfigError::Invalid("no markets configured".to_string()));
    }

    let mut seen_markets: Vec<&str> = Vec::new();
    let mut markets = Vec::with_capacity(file.markets.len());

    for spec in &file.markets {
        if seen_markets.contains(&spec.id.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate market id {}",
                spec.id
            )));
        }
        seen_markets.push(&spec.id);

        if spec.directions.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "market {}: at least one direction is required",
                spec.id
            )));
        }

        let mut directions = Vec::with_capacity(spec.directions.len());
        for direction in &spec.directions {
            if direction.legs.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "direction {}: at least one leg is required",
                    direction.id
                )));
            }

            let mut legs = Vec::with_capacity(direction.legs.len());
            for leg in &direction.legs {
                let params = file.venues.get(&leg.venue).ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "direction {}: unknown venue {}",
                        direction.id, leg.venue
                    ))
                })?;

                legs.push(Leg {
                    venue: leg.venue.clone(),
                    instrument: leg.instrument.clone(),
                    side: leg.side,
                    fee_rate: params.fee_rate,
                    min_notional: params.min_notional,
                    fill_mode: leg.fill_mode,
                });
            }

            directions.push(Basket {
                id: direction.id.clone(),
                legs,
            });
        }

        markets.push(Market {
            id: spec.id.clone(),
            directions,
        });
    }

    Ok(markets)
}
