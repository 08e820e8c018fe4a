//! JSON export of fitted models and run metadata

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{BgNbdModel, CltvConfig, CltvRun, ColumnCapping, GammaGammaModel};

use super::segments::{profile_segments, SegmentProfile};

/// Metadata about the run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub cltv_version: String,
    pub input_file: String,
    /// Date every recency and tenure is measured against
    pub analysis_date: String,
    pub customers_scored: usize,
    pub customers_excluded: usize,
}

/// BG/NBD fit plus population-level diagnostics
#[derive(Serialize)]
pub struct FrequencyModelExport<'a> {
    #[serde(flatten)]
    pub model: &'a BgNbdModel,
    /// Mean probability that a scored customer is still active
    pub mean_probability_alive: f64,
}

/// Gamma-Gamma fit plus its population mean
#[derive(Serialize)]
pub struct MonetaryModelExport<'a> {
    #[serde(flatten)]
    pub model: &'a GammaGammaModel,
    pub population_mean: f64,
}

/// Complete model report
#[derive(Serialize)]
pub struct ModelReport<'a> {
    pub metadata: RunMetadata,
    pub config: &'a CltvConfig,
    pub capping: &'a [ColumnCapping],
    pub frequency_model: FrequencyModelExport<'a>,
    pub monetary_model: MonetaryModelExport<'a>,
    pub segments: Vec<SegmentProfile>,
    pub total_cltv: f64,
}

/// Assemble the report for a finished run
pub fn build_model_report<'a>(
    run: &'a CltvRun,
    config: &'a CltvConfig,
    input_file: &str,
) -> ModelReport<'a> {
    let mean_probability_alive = if run.features.is_empty() {
        0.0
    } else {
        run.features
            .iter()
            .map(|f| {
                run.frequency_model.probability_alive(
                    f.frequency as f64,
                    f.recency_weeks,
                    f.tenure_weeks,
                )
            })
            .sum::<f64>()
            / run.features.len() as f64
    };

    ModelReport {
        metadata: RunMetadata {
            timestamp: Utc::now().to_rfc3339(),
            cltv_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: input_file.to_string(),
            analysis_date: run.analysis_date.to_string(),
            customers_scored: run.forecasts.len(),
            customers_excluded: run.excluded_customers,
        },
        config,
        capping: &run.capping.columns,
        frequency_model: FrequencyModelExport {
            model: &run.frequency_model,
            mean_probability_alive,
        },
        monetary_model: MonetaryModelExport {
            model: &run.monetary_model,
            population_mean: run.monetary_model.population_mean(),
        },
        segments: profile_segments(&run.forecasts),
        total_cltv: run.forecasts.iter().map(|f| f.cltv).sum(),
    }
}

/// Write the model report for a finished run to a JSON file
pub fn export_model_report(
    run: &CltvRun,
    config: &CltvConfig,
    input_file: &str,
    output_path: &Path,
) -> Result<()> {
    let report = build_model_report(run, config, input_file);

    let json =
        serde_json::to_string_pretty(&report).context("Failed to serialize model report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write model report to {}", output_path.display()))?;

    Ok(())
}
