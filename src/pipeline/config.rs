//! Pipeline configuration with documented defaults

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{CltvError, Result};
use super::optimize::NelderMeadConfig;

/// Time unit in which lifetime value is accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Period {
    Hour,
    Day,
    #[default]
    Week,
    Month,
}

impl Period {
    /// Model time units per month. Only `Week` matches the unit features are
    /// derived in; the others exist for models fit on other time scales.
    pub fn units_per_month(&self, weeks_per_month: f64) -> f64 {
        match self {
            Period::Hour => 30.0 * 24.0,
            Period::Day => 30.0,
            Period::Week => weeks_per_month,
            Period::Month => 1.0,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Hour => write!(f, "H"),
            Period::Day => write!(f, "D"),
            Period::Week => write!(f, "W"),
            Period::Month => write!(f, "M"),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "H" | "HOUR" => Ok(Period::Hour),
            "D" | "DAY" => Ok(Period::Day),
            "W" | "WEEK" => Ok(Period::Week),
            "M" | "MONTH" => Ok(Period::Month),
            _ => Err(format!(
                "Invalid period '{}'. Valid options: H, D, W, M",
                s
            )),
        }
    }
}

/// Quantile fences used by the outlier capper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CappingConfig {
    /// Lower quantile (default 0.01)
    pub lower_quantile: f64,
    /// Upper quantile (default 0.99)
    pub upper_quantile: f64,
    /// Multiplier applied to the inter-quantile range (default 1.5)
    pub iqr_multiplier: f64,
}

impl Default for CappingConfig {
    fn default() -> Self {
        Self {
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            iqr_multiplier: 1.5,
        }
    }
}

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CltvConfig {
    pub capping: CappingConfig,
    /// Days added to the latest purchase to obtain the analysis date (default 2)
    pub analysis_offset_days: i64,
    /// Explicit analysis date; must be after every last purchase
    pub analysis_date: Option<NaiveDate>,
    /// L2 penalty for the BG/NBD fit (default 0.001)
    pub bgnbd_penalizer: f64,
    /// L2 penalty for the Gamma-Gamma fit (default 0.01)
    pub gamma_gamma_penalizer: f64,
    /// Short expected-sales horizon in weeks (default 12)
    pub short_horizon_weeks: f64,
    /// Long expected-sales horizon in weeks (default 24)
    pub long_horizon_weeks: f64,
    /// Lifetime value horizon in months (default 6)
    pub cltv_horizon_months: u32,
    /// Per-month discount rate (default 0.01)
    pub discount_rate: f64,
    /// Period unit for lifetime value accumulation (default weekly)
    pub period: Period,
    /// Months to weeks conversion factor (default 4.0)
    pub weeks_per_month: f64,
    /// Number of quantile segments, 2 to 4 (default 4)
    pub num_segments: usize,
    pub optimizer: NelderMeadConfig,
}

impl Default for CltvConfig {
    fn default() -> Self {
        Self {
            capping: CappingConfig::default(),
            analysis_offset_days: 2,
            analysis_date: None,
            bgnbd_penalizer: 0.001,
            gamma_gamma_penalizer: 0.01,
            short_horizon_weeks: 12.0,
            long_horizon_weeks: 24.0,
            cltv_horizon_months: 6,
            discount_rate: 0.01,
            period: Period::Week,
            weeks_per_month: 4.0,
            num_segments: 4,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

impl CltvConfig {
    /// Check every invariant the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let c = &self.capping;
        if !(0.0..=1.0).contains(&c.lower_quantile) || !(0.0..=1.0).contains(&c.upper_quantile) {
            return Err(CltvError::InvalidConfig(
                "capping quantiles must be within [0, 1]".to_string(),
            ));
        }
        if c.lower_quantile >= c.upper_quantile {
            return Err(CltvError::InvalidConfig(format!(
                "lower quantile {} must be below upper quantile {}",
                c.lower_quantile, c.upper_quantile
            )));
        }
        if !(c.iqr_multiplier >= 0.0) {
            return Err(CltvError::InvalidConfig(
                "IQR multiplier must be non-negative".to_string(),
            ));
        }
        if self.analysis_offset_days < 1 {
            return Err(CltvError::InvalidConfig(
                "analysis offset must be at least one day".to_string(),
            ));
        }
        if !(self.bgnbd_penalizer >= 0.0) || !(self.gamma_gamma_penalizer >= 0.0) {
            return Err(CltvError::InvalidConfig(
                "penalizer coefficients must be non-negative".to_string(),
            ));
        }
        if !(self.short_horizon_weeks >= 0.0) || !(self.long_horizon_weeks >= 0.0) {
            return Err(CltvError::InvalidConfig(
                "expected-sales horizons must be non-negative".to_string(),
            ));
        }
        if self.cltv_horizon_months == 0 {
            return Err(CltvError::InvalidConfig(
                "CLTV horizon must be at least one month".to_string(),
            ));
        }
        if !(self.discount_rate > -1.0) || !self.discount_rate.is_finite() {
            return Err(CltvError::InvalidConfig(format!(
                "discount rate {} must be greater than -1",
                self.discount_rate
            )));
        }
        if !(self.weeks_per_month > 0.0) {
            return Err(CltvError::InvalidConfig(
                "weeks per month must be positive".to_string(),
            ));
        }
        if !(2..=4).contains(&self.num_segments) {
            return Err(CltvError::InvalidConfig(format!(
                "number of segments must be between 2 and 4, got {}",
                self.num_segments
            )));
        }
        if self.optimizer.max_iter == 0 || !(self.optimizer.tolerance > 0.0) {
            return Err(CltvError::InvalidConfig(
                "optimizer needs a positive iteration budget and tolerance".to_string(),
            ));
        }
        Ok(())
    }
}
