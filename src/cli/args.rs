//! Command-line argument definitions using clap

use clap::Parser;
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::pipeline::{CappingConfig, CltvConfig, NelderMeadConfig, Period};

/// cltv - Estimate customer lifetime value with BG/NBD and Gamma-Gamma models
#[derive(Parser, Debug)]
#[command(name = "cltv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV or Parquet) with one row per customer
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path (CSV or Parquet, determined by extension).
    /// Defaults to input directory with '_cltv' suffix (e.g., data.csv → data_cltv.csv).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write a JSON model report (fitted parameters, fences, segment profiles) to this path
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Lower quantile used for the outlier fences
    #[arg(long, default_value = "0.01", value_parser = validate_quantile)]
    pub lower_quantile: f64,

    /// Upper quantile used for the outlier fences
    #[arg(long, default_value = "0.99", value_parser = validate_quantile)]
    pub upper_quantile: f64,

    /// Multiplier applied to the inter-quantile range when building fences
    #[arg(long, default_value = "1.5")]
    pub iqr_multiplier: f64,

    /// Days added to the latest purchase to obtain the analysis date
    #[arg(long, default_value = "2")]
    pub analysis_offset_days: i64,

    /// Explicit analysis date (YYYY-MM-DD). Overrides --analysis-offset-days.
    #[arg(long)]
    pub analysis_date: Option<NaiveDate>,

    /// L2 penalizer for the BG/NBD fit
    #[arg(long, default_value = "0.001")]
    pub bgnbd_penalizer: f64,

    /// L2 penalizer for the Gamma-Gamma fit
    #[arg(long, default_value = "0.01")]
    pub gamma_gamma_penalizer: f64,

    /// Short expected-sales horizon in weeks
    #[arg(long, default_value = "12")]
    pub short_horizon_weeks: f64,

    /// Long expected-sales horizon in weeks
    #[arg(long, default_value = "24")]
    pub long_horizon_weeks: f64,

    /// Lifetime value horizon in months
    #[arg(long, default_value = "6")]
    pub cltv_months: u32,

    /// Monthly discount rate applied to future value
    #[arg(long, default_value = "0.01")]
    pub discount_rate: f64,

    /// Period unit the models were fit in.
    /// Options: "H" (hour), "D" (day), "W" (week, default), "M" (month)
    #[arg(long, default_value = "W")]
    pub period: Period,

    /// Weeks per month when converting the CLTV horizon to weeks
    #[arg(long, default_value = "4.0")]
    pub weeks_per_month: f64,

    /// Number of quantile segments (2 to 4), labelled from A (highest) down
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u8).range(2..=4))]
    pub segments: u8,

    /// Number of top customers listed in the console output
    #[arg(long, default_value = "20")]
    pub top: usize,

    /// Maximum Nelder-Mead iterations per model fit
    #[arg(long, default_value = "20000")]
    pub max_iterations: usize,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,
}

impl Cli {
    /// Get the output path, deriving from input if not explicitly provided.
    /// The derived path will be in the same directory as the input with a '_cltv' suffix.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let parent = self
                .input
                .parent()
                .unwrap_or_else(|| std::path::Path::new("."));
            let stem = self
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            let extension = self
                .input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("csv");
            parent.join(format!("{}_cltv.{}", stem, extension))
        })
    }

    /// Build the pipeline configuration from the parsed arguments
    pub fn to_config(&self) -> CltvConfig {
        CltvConfig {
            capping: CappingConfig {
                lower_quantile: self.lower_quantile,
                upper_quantile: self.upper_quantile,
                iqr_multiplier: self.iqr_multiplier,
            },
            analysis_offset_days: self.analysis_offset_days,
            analysis_date: self.analysis_date,
            bgnbd_penalizer: self.bgnbd_penalizer,
            gamma_gamma_penalizer: self.gamma_gamma_penalizer,
            short_horizon_weeks: self.short_horizon_weeks,
            long_horizon_weeks: self.long_horizon_weeks,
            cltv_horizon_months: self.cltv_months,
            discount_rate: self.discount_rate,
            period: self.period,
            weeks_per_month: self.weeks_per_month,
            num_segments: self.segments as usize,
            optimizer: NelderMeadConfig {
                max_iter: self.max_iterations,
                ..NelderMeadConfig::default()
            },
        }
    }
}

/// Validator for the capping quantiles
fn validate_quantile(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("quantile must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}
