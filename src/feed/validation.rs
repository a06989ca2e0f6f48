//! Market data validation
//!
//! Rejected records must never reach stop, P&L or cascade state.

use super::types::{Bar, PriceTick, TapeEvent, TickError};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Validates ticks against price sanity, staleness and per-symbol ordering
#[derive(Debug, Clone)]
pub struct TickValidator {
    max_age: Duration,
    /// Newest timestamp seen across all symbols
    newest: Option<DateTime<Utc>>,
    last_accepted: HashMap<String, DateTime<Utc>>,
}

impl TickValidator {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            max_age: Duration::seconds(max_age_secs),
            newest: None,
            last_accepted: HashMap::new(),
        }
    }

    /// Validate a tick and, if accepted, record it as the symbol's latest
    pub fn validate(&mut self, tick: &PriceTick) -> Result<(), TickError> {
        if tick.price <= Decimal::ZERO {
            return Err(TickError::NonPositivePrice(tick.price));
        }
        if tick.volume < Decimal::ZERO {
            return Err(TickError::NegativeVolume(tick.volume));
        }
        if let Some(newest) = self.newest {
            let age = newest - tick.timestamp;
            if age > self.max_age {
                return Err(TickError::Stale {
                    age_secs: age.num_seconds(),
                });
            }
        }
        if let Some(last) = self.last_accepted.get(&tick.symbol) {
            if tick.timestamp < *last {
                return Err(TickError::OutOfOrder {
                    symbol: tick.symbol.clone(),
                });
            }
        }

        self.last_accepted
            .insert(tick.symbol.clone(), tick.timestamp);
        self.newest = Some(self.newest.map_or(tick.timestamp, |n| n.max(tick.timestamp)));
        Ok(())
    }

    pub fn validate_bar(&self, bar: &Bar) -> Result<(), TickError> {
        if bar.is_well_formed() {
            Ok(())
        } else {
            Err(TickError::MalformedBar(bar.symbol.clone()))
        }
    }

    pub fn validate_tape(&self, event: &TapeEvent) -> Result<(), TickError> {
        if event.size <= Decimal::ZERO {
            return Err(TickError::InvalidTapeSize(event.size));
        }
        Ok(())
    }
}
