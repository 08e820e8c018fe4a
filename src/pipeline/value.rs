//! Discounted lifetime value and quantile segmentation

use rayon::prelude::*;

use super::bgnbd::BgNbdModel;
use super::capping::quantile_sorted;
use super::config::Period;
use super::error::{CltvError, Result};
use super::gamma_gamma::GammaGammaModel;
use super::records::{FeatureRecord, SegmentLabel};

/// Lifetime value accumulation settings
#[derive(Debug, Clone, Copy)]
pub struct ValueHorizon {
    pub months: u32,
    pub discount_rate: f64,
    pub period: Period,
    pub weeks_per_month: f64,
}

/// Discounted expected spend over the horizon for every customer.
///
/// Month `i` contributes `E[value] · (N(i·f) − N((i−1)·f)) / (1 + d)^i`
/// where `N` is the frequency model's cumulative expected purchases and `f`
/// the number of model periods per month.
pub fn lifetime_value(
    frequency_model: &BgNbdModel,
    monetary_model: &GammaGammaModel,
    features: &[FeatureRecord],
    horizon: &ValueHorizon,
) -> Vec<f64> {
    let units = horizon.period.units_per_month(horizon.weeks_per_month);

    features
        .par_iter()
        .map(|f| {
            let x = f.frequency as f64;
            let expected_value =
                monetary_model.conditional_expected_average_value(x, f.avg_monetary);

            let mut total = 0.0;
            let mut previous = 0.0;
            for month in 1..=horizon.months {
                let cumulative = frequency_model.predict(
                    month as f64 * units,
                    x,
                    f.recency_weeks,
                    f.tenure_weeks,
                );
                let purchases = (cumulative - previous).max(0.0);
                previous = cumulative;
                total += expected_value * purchases
                    / (1.0 + horizon.discount_rate).powi(month as i32);
            }
            total
        })
        .collect()
}

/// Assign equal-count quantile segments, lowest values first.
///
/// Bin edges are linear-interpolated quantiles; bins include their upper
/// edge and the first bin also includes the minimum. Fails when the values
/// cannot support `buckets` distinct bins.
pub fn segment(values: &[f64], buckets: usize) -> Result<Vec<SegmentLabel>> {
    if buckets == 0 || buckets > SegmentLabel::ORDERED.len() {
        return Err(CltvError::InvalidConfig(format!(
            "segment count must be between 1 and {}, got {}",
            SegmentLabel::ORDERED.len(),
            buckets
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CltvError::Numerical {
            stage: "segmentation",
            message: "CLTV contains non-finite values".to_string(),
        });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() < buckets {
        return Err(CltvError::DegenerateSegments {
            buckets,
            distinct: distinct.len(),
        });
    }

    let edges: Vec<f64> = (0..=buckets)
        .map(|k| quantile_sorted(&sorted, k as f64 / buckets as f64))
        .collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CltvError::DegenerateSegments {
            buckets,
            distinct: distinct.len(),
        });
    }

    let interior = &edges[1..buckets];
    values
        .iter()
        .map(|&v| {
            let rank = interior.partition_point(|&e| e < v);
            SegmentLabel::from_rank(rank, buckets).ok_or_else(|| CltvError::Numerical {
                stage: "segmentation",
                message: format!("value {} fell outside the bin edges", v),
            })
        })
        .collect()
}
