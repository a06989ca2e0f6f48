//! Kelly criterion position sizing

use super::types::RiskError;
use crate::config::KellyConfig;
use crate::ensemble::EdgeEstimate;
use rust_decimal::Decimal;

/// Fractional Kelly sizer for win/loss outcomes with payoff ratio `b`
#[derive(Debug, Clone)]
pub struct KellySizer {
    /// Kelly fraction (e.g., 0.25 for quarter Kelly)
    pub fraction: Decimal,
    /// Trades below this win probability are rejected
    pub min_probability: Decimal,
    pub min_position_size: Decimal,
    pub max_position_size: Decimal,
}

impl KellySizer {
    pub fn new(config: &KellyConfig) -> Self {
        Self {
            fraction: config.fraction,
            min_probability: config.min_probability,
            min_position_size: config.min_position_size,
            max_position_size: config.max_position_size,
        }
    }

    /// Full Kelly fraction: f* = (p*b - q) / b, floored at zero
    pub fn full_kelly(p: Decimal, b: Decimal) -> Decimal {
        if b <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let q = Decimal::ONE - p;
        ((p * b - q) / b).max(Decimal::ZERO)
    }

    /// Fraction of equity to commit, before correlation and breaker scaling
    ///
    /// A zero Kelly fraction is rejected rather than lifted to the minimum size.
    pub fn size(&self, edge: EdgeEstimate) -> Result<Decimal, RiskError> {
        if edge.win_probability < self.min_probability {
            return Err(RiskError::ProbabilityBelowMinimum {
                probability: edge.win_probability,
                minimum: self.min_probability,
            });
        }

        let full = Self::full_kelly(edge.win_probability, edge.payoff_ratio);
        if full.is_zero() {
            return Err(RiskError::NoEdge);
        }

        let fractional = full * self.fraction;
        Ok(fractional
            .max(self.min_position_size)
            .min(self.max_position_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> KellySizer {
        KellySizer::new(&KellyConfig::default())
    }

    fn edge(p: Decimal, b: Decimal) -> EdgeEstimate {
        EdgeEstimate {
            win_probability: p,
            payoff_ratio: b,
        }
    }

    #[test]
    fn test_full_kelly() {
        assert_eq!(KellySizer::full_kelly(dec!(0.6), dec!(2.0)), dec!(0.4));
        assert_eq!(KellySizer::full_kelly(dec!(0.3), dec!(1.0)), dec!(0));
    }

    #[test]
    fn test_quarter_kelly() {
        // f* = 0.4, quarter Kelly = 0.10
        assert_eq!(sizer().size(edge(dec!(0.6), dec!(2.0))).unwrap(), dec!(0.10));
    }

    #[test]
    fn test_low_probability_rejected_regardless_of_payoff() {
        for b in [dec!(1), dec!(5), dec!(100)] {
            let err = sizer().size(edge(dec!(0.5), b)).unwrap_err();
            assert!(matches!(err, RiskError::ProbabilityBelowMinimum { .. }));
        }
    }

    #[test]
    fn test_no_edge_rejected() {
        // p = 0.56, b = 0.5: 0.28 - 0.44 < 0
        let err = sizer().size(edge(dec!(0.56), dec!(0.5))).unwrap_err();
        assert_eq!(err, RiskError::NoEdge);
    }

    #[test]
    fn test_clamped_to_bounds() {
        // f* = 0.956 -> 0.239, capped at 0.20
        assert_eq!(sizer().size(edge(dec!(0.96), dec!(10))).unwrap(), dec!(0.20));
        // f* = 0.01 -> 0.0025, lifted to 0.01
        let tiny = sizer().size(edge(dec!(0.56), dec!(0.8))).unwrap();
        assert_eq!(tiny, dec!(0.01));
    }
}
