//! Recency, tenure, frequency and monetary features

use chrono::{Duration, NaiveDate};
use log::{info, warn};

use super::error::{CltvError, Result};
use super::records::{CustomerRecord, FeatureRecord};

const DAYS_PER_WEEK: f64 = 7.0;

/// Determine the analysis date.
///
/// Without an override this is the latest purchase plus `offset_days`. An
/// override must fall strictly after every customer's last purchase.
pub fn analysis_instant(
    records: &[CustomerRecord],
    offset_days: i64,
    override_date: Option<NaiveDate>,
) -> Result<NaiveDate> {
    let latest = records
        .iter()
        .map(|r| r.last_order_date)
        .max()
        .ok_or(CltvError::InsufficientData {
            stage: "analysis date",
            needed: 1,
            got: 0,
        })?;

    match override_date {
        Some(date) if date <= latest => Err(CltvError::InvalidConfig(format!(
            "analysis date {} must be after the latest purchase {}",
            date, latest
        ))),
        Some(date) => Ok(date),
        None => latest
            .checked_add_signed(Duration::days(offset_days))
            .ok_or_else(|| {
                CltvError::InvalidConfig(format!(
                    "analysis offset of {} day(s) overflows the calendar",
                    offset_days
                ))
            }),
    }
}

/// Whole days from `from` to `to`, in weeks.
fn weeks_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / DAYS_PER_WEEK
}

/// Derive one feature row per repeat customer.
///
/// Customers with one purchase or fewer are dropped: the repeat-purchase
/// models are undefined for them.
pub fn derive_features(
    records: &[CustomerRecord],
    analysis_date: NaiveDate,
) -> Result<Vec<FeatureRecord>> {
    let mut features = Vec::with_capacity(records.len());
    let mut dropped = 0usize;

    for record in records {
        if record.last_order_date < record.first_order_date {
            return Err(CltvError::NonChronological {
                customer_id: record.master_id.clone(),
                first: record.first_order_date.to_string(),
                last: record.last_order_date.to_string(),
            });
        }
        if analysis_date <= record.last_order_date {
            return Err(CltvError::InvalidConfig(format!(
                "analysis date {} is not after last purchase {} of customer '{}'",
                analysis_date, record.last_order_date, record.master_id
            )));
        }

        let total_orders = record.order_num_total();
        if !total_orders.is_finite() || total_orders < 0.0 {
            return Err(CltvError::invalid_value(
                "order_num_total",
                &record.master_id,
                format!("order count {} is not a non-negative number", total_orders),
            ));
        }
        let frequency = total_orders.round();
        if frequency <= 1.0 {
            dropped += 1;
            continue;
        }

        // Spend is averaged over the recorded order count, before rounding
        let total_value = record.customer_value_total();
        let avg_monetary = total_value / total_orders;
        if !avg_monetary.is_finite() || avg_monetary <= 0.0 {
            return Err(CltvError::invalid_value(
                "customer_value_total",
                &record.master_id,
                format!(
                    "average order value {} must be positive for a repeat customer",
                    avg_monetary
                ),
            ));
        }

        features.push(FeatureRecord {
            customer_id: record.master_id.clone(),
            recency_weeks: weeks_between(record.first_order_date, record.last_order_date),
            tenure_weeks: weeks_between(record.first_order_date, analysis_date),
            frequency: frequency as u32,
            avg_monetary,
        });
    }

    if dropped > 0 {
        warn!(
            "excluded {} customer(s) with a single purchase from modeling",
            dropped
        );
    }
    info!(
        "derived features for {} customer(s) as of {}",
        features.len(),
        analysis_date
    );

    Ok(features)
}
