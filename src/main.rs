//! cltv: Customer Lifetime Value CLI Tool
//!
//! A command-line tool that caps outliers, derives RFM features, fits
//! BG/NBD and Gamma-Gamma models, and writes per-customer CLTV segments.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use polars::prelude::{CsvWriter, DataFrame, ParquetWriter, SerWriter};

use cltv::cli::Cli;
use cltv::pipeline::{
    build_forecasts, cap_records, fit_models, forecasts_to_dataframe,
    load_dataset_with_progress, prepare_features, records_from_dataframe, CltvRun,
};
use cltv::report::{
    display_profiles, display_segment_profiles, display_top_customers, export_model_report,
    profile_segments, profile_volume_columns, top_customers, RunSummary,
};
use cltv::utils::{
    create_spinner, finish_with_error, finish_with_success, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let input = &cli.input;
    let output_path = cli.output_path();
    let config = cli.to_config();
    config.validate()?;

    // Print styled banner
    print_banner(env!("CARGO_PKG_VERSION"));

    // Print configuration card
    print_config(input, &output_path, &config);

    // Load dataset
    let step_start = Instant::now();
    println!();
    let (df, rows, cols, memory_mb) = load_dataset_with_progress(input, cli.infer_schema_length)?;
    print_success("Dataset loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);
    println!("      Estimated memory: {:.2} MB", memory_mb);

    let records = records_from_dataframe(&df)?;
    let mut summary = RunSummary::new(records.len());
    summary.load_time = step_start.elapsed();
    print_step_time(summary.load_time);

    // Step 1: Outlier capping
    print_step_header(1, "Outlier Capping");

    let step_start = Instant::now();
    display_profiles("Before capping", &profile_volume_columns(&records));
    let spinner = create_spinner("Capping order and spend outliers...");
    let capping = match cap_records(&records, &config.capping) {
        Ok(capping) => capping,
        Err(e) => {
            finish_with_error(&spinner, "Outlier capping failed");
            return Err(e.into());
        }
    };
    finish_with_success(&spinner, "Outlier capping complete");

    summary.set_capping(&capping);
    if summary.values_capped == 0 {
        print_info("No values outside the capping fences");
    } else {
        print_count(
            "value(s) outside the fences",
            summary.values_capped,
            Some(&format!(
                "({:.2}/{:.2} quantiles × {:.1} IQR)",
                config.capping.lower_quantile,
                config.capping.upper_quantile,
                config.capping.iqr_multiplier
            )),
        );
        display_profiles("After capping", &profile_volume_columns(&capping.records));
    }
    summary.capping_time = step_start.elapsed();
    print_step_time(summary.capping_time);

    // Step 2: RFM features
    print_step_header(2, "Recency, Frequency, Monetary Features");

    let step_start = Instant::now();
    let (analysis_date, features) = prepare_features(&capping.records, &config)?;
    print_info(&format!("Analysis date: {}", analysis_date));
    summary.customers_excluded = records.len() - features.len();
    if summary.customers_excluded > 0 {
        print_warning(&format!(
            "Excluded {} customer(s) without a repeat purchase",
            summary.customers_excluded
        ));
    }
    print_success(&format!("Derived features for {} customer(s)", features.len()));
    summary.feature_time = step_start.elapsed();
    print_step_time(summary.feature_time);

    // Step 3: Model fitting
    print_step_header(3, "Model Fitting");

    let step_start = Instant::now();
    let spinner = create_spinner("Fitting BG/NBD and Gamma-Gamma models...");
    let (frequency_model, monetary_model) = match fit_models(&features, &config) {
        Ok(models) => models,
        Err(e) => {
            finish_with_error(&spinner, "Model fitting failed");
            return Err(e.into());
        }
    };
    finish_with_success(&spinner, "Models fitted");

    let bg = frequency_model.params();
    println!(
        "      BG/NBD:      r={:.4} alpha={:.4} a={:.4} b={:.4} {}",
        bg.r,
        bg.alpha,
        bg.a,
        bg.b,
        style(format!("({} iterations)", frequency_model.iterations)).dim()
    );
    let gg = monetary_model.params();
    println!(
        "      Gamma-Gamma: p={:.4} q={:.4} v={:.4} {}",
        gg.p,
        gg.q,
        gg.v,
        style(format!("({} iterations)", monetary_model.iterations)).dim()
    );
    summary.fit_time = step_start.elapsed();
    print_step_time(summary.fit_time);

    // Step 4: Scoring and segmentation
    print_step_header(4, "Lifetime Value and Segments");

    let step_start = Instant::now();
    let spinner = create_spinner("Scoring customers...");
    let forecasts = match build_forecasts(&features, &frequency_model, &monetary_model, &config)
    {
        Ok(forecasts) => forecasts,
        Err(e) => {
            finish_with_error(&spinner, "Scoring failed");
            return Err(e.into());
        }
    };
    finish_with_success(&spinner, "Customers scored and segmented");

    summary.customers_scored = forecasts.len();
    summary.total_cltv = forecasts.iter().map(|f| f.cltv).sum();
    display_segment_profiles(&profile_segments(&forecasts));
    display_top_customers(&top_customers(&forecasts, cli.top));
    summary.scoring_time = step_start.elapsed();
    print_step_time(summary.scoring_time);

    // Step 5: Save output
    print_step_header(5, "Save Results");

    let step_start = Instant::now();
    let spinner = create_spinner("Writing output file...");
    let mut out = forecasts_to_dataframe(&forecasts)?;
    save_dataset(&mut out, &output_path)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));

    if let Some(report_path) = &cli.report {
        let run = CltvRun {
            analysis_date,
            capping,
            excluded_customers: summary.customers_excluded,
            features,
            frequency_model,
            monetary_model,
            forecasts,
        };
        export_model_report(&run, &config, &input.display().to_string(), report_path)?;
        print_success(&format!("Model report saved to {}", report_path.display()));
    }
    summary.save_time = step_start.elapsed();
    print_step_time(summary.save_time);

    // Display summary
    summary.display();

    // Final completion message
    print_completion();

    Ok(())
}

/// Save dataset to file (CSV or Parquet based on extension)
fn save_dataset(df: &mut DataFrame, path: &std::path::Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}
