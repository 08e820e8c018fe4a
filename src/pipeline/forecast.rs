//! End-to-end CLTV run: capping, features, model fits, forecasts

use chrono::NaiveDate;
use log::info;

use super::bgnbd::BgNbdModel;
use super::capping::{cap_records, CappingOutcome};
use super::config::CltvConfig;
use super::error::Result;
use super::features::{analysis_instant, derive_features};
use super::gamma_gamma::GammaGammaModel;
use super::records::{CustomerRecord, FeatureRecord, ForecastRecord};
use super::value::{lifetime_value, segment, ValueHorizon};

/// Everything produced by one run
#[derive(Debug, Clone)]
pub struct CltvRun {
    pub analysis_date: NaiveDate,
    pub capping: CappingOutcome,
    /// Customers without a repeat purchase
    pub excluded_customers: usize,
    pub features: Vec<FeatureRecord>,
    pub frequency_model: BgNbdModel,
    pub monetary_model: GammaGammaModel,
    pub forecasts: Vec<ForecastRecord>,
}

/// Pick the analysis date and derive features from the capped table.
pub fn prepare_features(
    capped: &[CustomerRecord],
    config: &CltvConfig,
) -> Result<(NaiveDate, Vec<FeatureRecord>)> {
    let analysis_date =
        analysis_instant(capped, config.analysis_offset_days, config.analysis_date)?;
    let features = derive_features(capped, analysis_date)?;
    Ok((analysis_date, features))
}

/// Fit both models on the feature table.
pub fn fit_models(
    features: &[FeatureRecord],
    config: &CltvConfig,
) -> Result<(BgNbdModel, GammaGammaModel)> {
    let frequency_model = BgNbdModel::fit(features, config.bgnbd_penalizer, &config.optimizer)?;
    let monetary_model =
        GammaGammaModel::fit(features, config.gamma_gamma_penalizer, &config.optimizer)?;
    Ok((frequency_model, monetary_model))
}

/// Score every customer with already-fitted models.
pub fn build_forecasts(
    features: &[FeatureRecord],
    frequency_model: &BgNbdModel,
    monetary_model: &GammaGammaModel,
    config: &CltvConfig,
) -> Result<Vec<ForecastRecord>> {
    let short = frequency_model.predict_many(config.short_horizon_weeks, features);
    let long = frequency_model.predict_many(config.long_horizon_weeks, features);
    let expected_values = monetary_model.conditional_expected_average_values(features);

    let horizon = ValueHorizon {
        months: config.cltv_horizon_months,
        discount_rate: config.discount_rate,
        period: config.period,
        weeks_per_month: config.weeks_per_month,
    };
    let cltv = lifetime_value(frequency_model, monetary_model, features, &horizon);
    let segments = segment(&cltv, config.num_segments)?;

    let forecasts = features
        .iter()
        .enumerate()
        .map(|(i, f)| ForecastRecord {
            customer_id: f.customer_id.clone(),
            recency_cltv_weekly: f.recency_weeks,
            t_weekly: f.tenure_weeks,
            frequency: f.frequency,
            monetary_cltv_avg: f.avg_monetary,
            exp_sales_3_month: short[i],
            exp_sales_6_month: long[i],
            exp_average_value: expected_values[i],
            cltv: cltv[i],
            segment: segments[i],
        })
        .collect();

    Ok(forecasts)
}

/// Run every stage in order. Nothing is returned unless all stages succeed.
pub fn run_pipeline(records: &[CustomerRecord], config: &CltvConfig) -> Result<CltvRun> {
    config.validate()?;

    let capping = cap_records(records, &config.capping)?;
    let (analysis_date, features) = prepare_features(&capping.records, config)?;
    let excluded_customers = records.len() - features.len();

    let (frequency_model, monetary_model) = fit_models(&features, config)?;
    let forecasts = build_forecasts(&features, &frequency_model, &monetary_model, config)?;

    info!(
        "scored {} customer(s), {} excluded",
        forecasts.len(),
        excluded_customers
    );

    Ok(CltvRun {
        analysis_date,
        capping,
        excluded_customers,
        features,
        frequency_model,
        monetary_model,
        forecasts,
    })
}
