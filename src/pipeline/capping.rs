//! Outlier capping for the volume and spend columns
//!
//! Fences come from wide quantiles (1st/99th percentile by default) widened
//! by a multiple of the inter-quantile range. Values outside the fences are
//! replaced by the nearest integer inside the fences so order counts stay
//! integral.

use log::{debug, info};
use serde::Serialize;

use super::config::CappingConfig;
use super::error::{CltvError, Result};
use super::records::{CustomerRecord, VolumeColumn};

/// Lower and upper capping limits for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fences {
    pub low: f64,
    pub high: f64,
}

impl Fences {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Value written in place of anything above `high`
    pub fn upper_replacement(&self) -> f64 {
        self.snap(self.high, self.high.floor())
    }

    /// Value written in place of anything below `low`
    pub fn lower_replacement(&self) -> f64 {
        self.snap(self.low, self.low.ceil())
    }

    // Nearest integer (ties to even), else the closest integer inside the
    // fences, else the fence itself when no integer lies in `[low, high]`
    fn snap(&self, fence: f64, inward: f64) -> f64 {
        let rounded = fence.round_ties_even();
        if self.contains(rounded) {
            rounded
        } else if self.contains(inward) {
            inward
        } else {
            fence
        }
    }
}

/// Capping details for one column, kept for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ColumnCapping {
    pub column: VolumeColumn,
    pub fences: Fences,
    pub replaced_low: usize,
    pub replaced_high: usize,
}

/// Capped table plus per-column capping details
#[derive(Debug, Clone)]
pub struct CappingOutcome {
    pub records: Vec<CustomerRecord>,
    pub columns: Vec<ColumnCapping>,
}

impl CappingOutcome {
    pub fn total_replaced(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.replaced_low + c.replaced_high)
            .sum()
    }
}

/// Quantile of already-sorted data using linear interpolation between
/// closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}

/// Compute capping fences for one column.
pub fn outlier_thresholds(values: &[f64], config: &CappingConfig) -> Result<Fences> {
    if values.is_empty() {
        return Err(CltvError::InsufficientData {
            stage: "outlier capping",
            needed: 1,
            got: 0,
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CltvError::Numerical {
            stage: "outlier capping",
            message: "column contains non-finite values".to_string(),
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q_low = quantile_sorted(&sorted, config.lower_quantile);
    let q_high = quantile_sorted(&sorted, config.upper_quantile);
    let iqr = q_high - q_low;

    Ok(Fences {
        low: q_low - config.iqr_multiplier * iqr,
        high: q_high + config.iqr_multiplier * iqr,
    })
}

/// Replace out-of-fence values, returning the capped column.
pub fn replace_with_thresholds(values: &[f64], fences: &Fences) -> Vec<f64> {
    let upper = fences.upper_replacement();
    let lower = fences.lower_replacement();
    values
        .iter()
        .map(|&v| {
            if v > fences.high {
                upper
            } else if v < fences.low {
                lower
            } else {
                v
            }
        })
        .collect()
}

/// Cap every volume/spend column of the table independently.
pub fn cap_records(records: &[CustomerRecord], config: &CappingConfig) -> Result<CappingOutcome> {
    let mut capped = records.to_vec();
    let mut columns = Vec::with_capacity(VolumeColumn::ALL.len());

    for column in VolumeColumn::ALL {
        let values: Vec<f64> = records.iter().map(|r| column.get(r)).collect();
        let fences = outlier_thresholds(&values, config)?;
        let replaced = replace_with_thresholds(&values, &fences);

        let replaced_high = values.iter().filter(|&&v| v > fences.high).count();
        let replaced_low = values.iter().filter(|&&v| v < fences.low).count();

        for (record, value) in capped.iter_mut().zip(replaced) {
            column.set(record, value);
        }

        debug!(
            "{}: fences [{:.4}, {:.4}], {} high / {} low replaced",
            column.name(),
            fences.low,
            fences.high,
            replaced_high,
            replaced_low
        );

        columns.push(ColumnCapping {
            column,
            fences,
            replaced_low,
            replaced_high,
        });
    }

    let outcome = CappingOutcome {
        records: capped,
        columns,
    };
    info!(
        "outlier capping replaced {} value(s) across {} column(s)",
        outcome.total_replaced(),
        VolumeColumn::ALL.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert!((quantile_sorted(&sorted, 0.1) - 1.4).abs() < 1e-12);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_fences_formula() {
        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let fences = outlier_thresholds(&values, &CappingConfig::default()).unwrap();
        // q01 = 1, q99 = 99, iqr = 98
        assert!((fences.low - (1.0 - 1.5 * 98.0)).abs() < 1e-9);
        assert!((fences.high - (99.0 + 1.5 * 98.0)).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_is_noop() {
        let values = vec![7.0; 20];
        let fences = outlier_thresholds(&values, &CappingConfig::default()).unwrap();
        assert_eq!(fences.low, 7.0);
        assert_eq!(fences.high, 7.0);
        assert_eq!(replace_with_thresholds(&values, &fences), values);
    }

    #[test]
    fn test_extreme_value_replaced_by_rounded_fence() {
        let fences = Fences {
            low: -3.4,
            high: 10.2,
        };
        let capped = replace_with_thresholds(&[-10.0, 5.0, 50.0], &fences);
        assert_eq!(capped, vec![-3.0, 5.0, 10.0]);
    }

    #[test]
    fn test_rounding_never_leaves_fences() {
        let fences = Fences {
            low: 0.6,
            high: 10.6,
        };
        // round(10.6) = 11 would exceed the fence, so the count drops to 10
        assert_eq!(fences.upper_replacement(), 10.0);
        assert_eq!(fences.lower_replacement(), 1.0);

        let fences = Fences {
            low: -2.4,
            high: 3.3,
        };
        assert_eq!(fences.lower_replacement(), -2.0);
        assert_eq!(fences.upper_replacement(), 3.0);

        let narrow = Fences {
            low: 2.4,
            high: 2.45,
        };
        assert_eq!(narrow.upper_replacement(), 2.45);
        assert_eq!(narrow.lower_replacement(), 2.4);
    }

    #[test]
    fn test_half_fences_round_to_even() {
        let fences = Fences {
            low: -3.5,
            high: 12.5,
        };
        assert_eq!(fences.upper_replacement(), 12.0);
        assert_eq!(fences.lower_replacement(), -3.0);

        let fences = Fences { low: 0.5, high: 2.5 };
        assert_eq!(fences.upper_replacement(), 2.0);
        // round(0.5) = 0 would fall below the fence
        assert_eq!(fences.lower_replacement(), 1.0);
    }

    #[test]
    fn test_empty_column_errors() {
        let result = outlier_thresholds(&[], &CappingConfig::default());
        assert!(matches!(result, Err(CltvError::InsufficientData { .. })));
    }

    #[test]
    fn test_non_finite_column_errors() {
        let result = outlier_thresholds(&[1.0, f64::NAN], &CappingConfig::default());
        assert!(result.is_err());
    }
}
