//! Integration tests for the full CLTV pipeline

use cltv::pipeline::*;
use cltv::report::{build_model_report, profile_segments, top_customers};

#[path = "common/mod.rs"]
mod common;

use common::*;

fn scenario_config() -> CltvConfig {
    CltvConfig {
        analysis_date: Some(scenario_analysis_date()),
        // Two scored customers cannot fill four quantile buckets
        num_segments: 2,
        ..CltvConfig::default()
    }
}

#[test]
fn test_scenario_end_to_end() {
    let run = run_pipeline(&scenario_customers(), &scenario_config()).unwrap();

    assert_eq!(run.analysis_date, scenario_analysis_date());
    assert_eq!(run.excluded_customers, 1);
    assert_eq!(run.forecasts.len(), 2);

    let ids: Vec<&str> = run.forecasts.iter().map(|f| f.customer_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert!(!ids.contains(&"C"));

    for f in &run.forecasts {
        assert!(f.cltv.is_finite() && f.cltv >= 0.0, "{}: cltv {}", f.customer_id, f.cltv);
        assert!(f.exp_sales_3_month <= f.exp_sales_6_month);
        assert!(["A", "B", "C", "D"].contains(&f.segment.display_label()));
    }
}

#[test]
fn test_scenario_with_four_segments_is_degenerate() {
    let config = CltvConfig {
        num_segments: 4,
        ..scenario_config()
    };
    let err = run_pipeline(&scenario_customers(), &config).unwrap_err();
    assert!(matches!(
        err,
        CltvError::DegenerateSegments {
            buckets: 4,
            distinct: 2
        }
    ));
}

#[test]
fn test_stage_by_stage_matches_run_pipeline() {
    let records = synthetic_customers(60);
    let config = CltvConfig::default();
    let run = run_pipeline(&records, &config).unwrap();

    let capping = cap_records(&records, &config.capping).unwrap();
    let (analysis_date, features) = prepare_features(&capping.records, &config).unwrap();
    let (bg, gg) = fit_models(&features, &config).unwrap();
    let forecasts = build_forecasts(&features, &bg, &gg, &config).unwrap();

    assert_eq!(analysis_date, run.analysis_date);
    assert_eq!(features, run.features);
    assert_eq!(bg.params(), run.frequency_model.params());
    assert_eq!(gg.params(), run.monetary_model.params());
    assert_eq!(forecasts, run.forecasts);
}

#[test]
fn test_population_run_segments_evenly() {
    let records = synthetic_customers(200);
    let run = run_pipeline(&records, &CltvConfig::default()).unwrap();

    assert_eq!(run.forecasts.len(), 200);
    assert_eq!(run.excluded_customers, 0);

    let profiles = profile_segments(&run.forecasts);
    assert_eq!(profiles.len(), 4);
    let labels: Vec<&str> = profiles.iter().map(|p| p.segment.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C", "D"]);
    for p in &profiles {
        assert!(
            (48..=52).contains(&p.count),
            "segment {} holds {} customers",
            p.segment,
            p.count
        );
    }

    // Segment means follow the label order
    for w in profiles.windows(2) {
        assert!(w[0].cltv_mean > w[1].cltv_mean);
    }

    // Every A-segment customer is worth at least as much as every D-segment customer
    let min_a = run
        .forecasts
        .iter()
        .filter(|f| f.segment == SegmentLabel::Highest)
        .map(|f| f.cltv)
        .fold(f64::INFINITY, f64::min);
    let max_d = run
        .forecasts
        .iter()
        .filter(|f| f.segment == SegmentLabel::Lowest)
        .map(|f| f.cltv)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(min_a >= max_d);

    let top = top_customers(&run.forecasts, 20);
    assert_eq!(top.len(), 20);
    assert!(top.iter().all(|f| f.segment == SegmentLabel::Highest));
}

#[test]
fn test_cltv_grows_with_horizon_and_shrinks_with_discount() {
    let records = synthetic_customers(60);
    let base = run_pipeline(&records, &CltvConfig::default()).unwrap();

    let longer = CltvConfig {
        cltv_horizon_months: 12,
        ..CltvConfig::default()
    };
    let longer = run_pipeline(&records, &longer).unwrap();

    let steeper = CltvConfig {
        discount_rate: 0.05,
        ..CltvConfig::default()
    };
    let steeper = run_pipeline(&records, &steeper).unwrap();

    for ((b, l), s) in base.forecasts.iter().zip(&longer.forecasts).zip(&steeper.forecasts) {
        assert!(l.cltv >= b.cltv);
        assert!(s.cltv <= b.cltv);
    }
}

#[test]
fn test_forecast_table_layout() {
    let run = run_pipeline(&scenario_customers(), &scenario_config()).unwrap();
    let df = forecasts_to_dataframe(&run.forecasts).unwrap();

    assert_shape(&df, 2, OUTPUT_COLUMNS.len());
    assert_has_columns(&df, &OUTPUT_COLUMNS);
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, OUTPUT_COLUMNS.map(String::from).to_vec());
}

#[test]
fn test_model_report_serializes() {
    let config = scenario_config();
    let run = run_pipeline(&scenario_customers(), &config).unwrap();
    let report = build_model_report(&run, &config, "customers.csv");
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();

    assert_eq!(json["metadata"]["input_file"], "customers.csv");
    assert_eq!(json["metadata"]["customers_scored"], 2);
    assert_eq!(json["metadata"]["customers_excluded"], 1);
    assert_eq!(json["metadata"]["analysis_date"], "2021-06-01");
    assert!(json["frequency_model"]["params"]["r"].as_f64().unwrap() > 0.0);
    assert!(json["monetary_model"]["params"]["q"].as_f64().unwrap() > 1.0);
    let alive = json["frequency_model"]["mean_probability_alive"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&alive));
    assert_eq!(json["capping"].as_array().unwrap().len(), 4);
    assert_eq!(json["config"]["num_segments"], 2);
}

#[test]
fn test_invalid_config_rejected_before_work() {
    let config = CltvConfig {
        num_segments: 5,
        ..CltvConfig::default()
    };
    let err = run_pipeline(&scenario_customers(), &config).unwrap_err();
    assert!(matches!(err, CltvError::InvalidConfig(_)));
}
