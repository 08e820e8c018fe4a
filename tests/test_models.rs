//! Tests for the BG/NBD and Gamma-Gamma model fits

use cltv::pipeline::*;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Beta, Gamma};

#[path = "common/mod.rs"]
mod common;

use common::*;

fn population_features(n: usize) -> Vec<FeatureRecord> {
    derive_features(&synthetic_customers(n), date(2021, 6, 1)).unwrap()
}

#[test]
fn test_bgnbd_fit_converges_with_positive_params() {
    let features = population_features(60);
    let model = BgNbdModel::fit(&features, 0.001, &NelderMeadConfig::default()).unwrap();

    let p = model.params();
    for value in [p.r, p.alpha, p.a, p.b] {
        assert!(value.is_finite() && value > 0.0);
    }
    assert_eq!(model.n_customers, 60);
    assert!(model.iterations > 0);
    assert!(model.mean_log_likelihood.is_finite());
}

/// Purchase histories drawn from a BG/NBD process, each observed for 26 to 52 weeks
fn simulate_bgnbd(truth: &BgNbdParams, n: usize, seed: u64) -> Vec<FeatureRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let purchase_rate = Gamma::new(truth.r, truth.alpha).unwrap();
    let dropout = Beta::new(truth.a, truth.b).unwrap();

    (0..n)
        .map(|i| {
            let lambda = purchase_rate.sample(&mut rng);
            let p = dropout.sample(&mut rng);
            let tenure = rng.gen_range(26.0..52.0);

            let (mut t, mut x, mut t_x) = (0.0_f64, 0_u32, 0.0_f64);
            loop {
                t += -(1.0 - rng.gen::<f64>()).ln() / lambda;
                if t > tenure {
                    break;
                }
                x += 1;
                t_x = t;
                if rng.gen::<f64>() < p {
                    break;
                }
            }

            FeatureRecord {
                customer_id: format!("sim_{}", i),
                recency_weeks: t_x,
                tenure_weeks: tenure,
                frequency: x,
                avg_monetary: 1.0,
            }
        })
        .collect()
}

/// Average spend of 2 to 10 purchases per customer under a Gamma-Gamma process
fn simulate_gamma_gamma(truth: &GammaGammaParams, n: usize, seed: u64) -> Vec<FeatureRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let spend_rate = Gamma::new(truth.q, truth.v).unwrap();

    (0..n)
        .map(|i| {
            let nu = spend_rate.sample(&mut rng);
            let spend = Gamma::new(truth.p, nu).unwrap();
            let x = rng.gen_range(2..=10_u32);
            let total: f64 = (0..x).map(|_| spend.sample(&mut rng)).sum();

            FeatureRecord {
                customer_id: format!("sim_{}", i),
                recency_weeks: 1.0,
                tenure_weeks: 2.0,
                frequency: x,
                avg_monetary: total / x as f64,
            }
        })
        .collect()
}

#[test]
fn test_bgnbd_fit_recovers_simulated_parameters() {
    let truth = BgNbdParams {
        r: 0.25,
        alpha: 4.0,
        a: 0.8,
        b: 2.5,
    };
    let features = simulate_bgnbd(&truth, 3000, 17);
    let model = BgNbdModel::fit(&features, 0.0, &NelderMeadConfig::default()).unwrap();
    let fitted = model.params();

    assert!((fitted.r - truth.r).abs() < 0.05, "r = {}", fitted.r);
    assert!(fitted.alpha > 2.8 && fitted.alpha < 5.4, "alpha = {}", fitted.alpha);
    // a and b trade off against each other; the mean dropout probability is well identified
    let dropout = fitted.a / (fitted.a + fitted.b);
    assert!(
        (dropout - truth.a / (truth.a + truth.b)).abs() < 0.08,
        "a = {}, b = {}",
        fitted.a,
        fitted.b
    );

    let reference = BgNbdModel::from_params(truth).unwrap();
    let expected = reference.predict(39.0, 2.0, 30.43, 38.86);
    let predicted = model.predict(39.0, 2.0, 30.43, 38.86);
    assert!(
        (predicted - expected).abs() < 0.12 * expected,
        "{} vs {}",
        predicted,
        expected
    );
}

#[test]
fn test_gamma_gamma_fit_recovers_simulated_parameters() {
    let truth = GammaGammaParams {
        p: 6.0,
        q: 4.0,
        v: 15.0,
    };
    let features = simulate_gamma_gamma(&truth, 3000, 23);
    let model = GammaGammaModel::fit(&features, 0.0, &NelderMeadConfig::default()).unwrap();
    let fitted = model.params();

    assert!((fitted.q - truth.q).abs() < 0.5, "q = {}", fitted.q);
    // p and v are only loosely identified on their own
    assert!(fitted.p > 3.0 && fitted.p < 14.0, "p = {}", fitted.p);

    let reference = GammaGammaModel::from_params(truth).unwrap();
    let population_mean = model.population_mean();
    assert!(
        (population_mean - reference.population_mean()).abs() < 0.05 * reference.population_mean(),
        "population mean {}",
        population_mean
    );
}

#[test]
fn test_expected_purchases_grow_with_horizon() {
    let features = population_features(60);
    let model = BgNbdModel::fit(&features, 0.001, &NelderMeadConfig::default()).unwrap();

    let horizons = [0.0, 4.0, 12.0, 24.0, 52.0];
    for f in &features {
        let x = f.frequency as f64;
        let predictions: Vec<f64> = horizons
            .iter()
            .map(|&h| model.predict(h, x, f.recency_weeks, f.tenure_weeks))
            .collect();

        assert_eq!(predictions[0], 0.0);
        for w in predictions.windows(2) {
            assert!(
                w[1] >= w[0] - 1e-12,
                "{}: predictions not monotone: {:?}",
                f.customer_id,
                predictions
            );
        }
        assert!(predictions.iter().all(|p| p.is_finite() && *p >= 0.0));
    }

    assert!(model.expected_transactions(24.0) > model.expected_transactions(12.0));
}

#[test]
fn test_probability_alive_is_a_probability() {
    let features = population_features(40);
    let model = BgNbdModel::fit(&features, 0.001, &NelderMeadConfig::default()).unwrap();

    for f in &features {
        let p = model.probability_alive(f.frequency as f64, f.recency_weeks, f.tenure_weeks);
        assert!((0.0..=1.0).contains(&p), "{}: P(alive) = {}", f.customer_id, p);
    }
    // Someone who just bought is more likely alive than someone silent for the same tenure
    let recent = model.probability_alive(4.0, 29.0, 30.0);
    let stale = model.probability_alive(4.0, 2.0, 30.0);
    assert!(recent > stale);
}

#[test]
fn test_predict_many_matches_predict() {
    let features = population_features(40);
    let model = BgNbdModel::fit(&features, 0.001, &NelderMeadConfig::default()).unwrap();

    let many = model.predict_many(12.0, &features);
    for (f, value) in features.iter().zip(&many) {
        let single = model.predict(12.0, f.frequency as f64, f.recency_weeks, f.tenure_weeks);
        assert_eq!(single, *value);
    }
}

#[test]
fn test_gamma_gamma_shrinkage_bound() {
    let features = population_features(60);
    let model = GammaGammaModel::fit(&features, 0.01, &NelderMeadConfig::default()).unwrap();

    let params = model.params();
    assert!(params.p > 0.0 && params.q > 1.0 && params.v > 0.0);

    let population_mean = model.population_mean();
    assert!(population_mean.is_finite() && population_mean > 0.0);

    for f in &features {
        let expected = model.conditional_expected_average_value(f.frequency as f64, f.avg_monetary);
        let lo = f.avg_monetary.min(population_mean) - 1e-9;
        let hi = f.avg_monetary.max(population_mean) + 1e-9;
        assert!(
            (lo..=hi).contains(&expected),
            "{}: {} outside [{}, {}]",
            f.customer_id,
            expected,
            lo,
            hi
        );
    }
}

#[test]
fn test_scenario_models_fit() {
    let features = derive_features(&scenario_customers(), scenario_analysis_date()).unwrap();
    let config = CltvConfig::default();
    let (bg, gg) = fit_models(&features, &config).unwrap();

    assert_eq!(bg.n_customers, 2);
    assert_eq!(gg.n_customers, 2);

    let values = gg.conditional_expected_average_values(&features);
    assert!(values[0] > values[1], "A spends more on average than B");
}

#[test]
fn test_iteration_budget_exhaustion_is_reported() {
    let features = population_features(60);
    let config = NelderMeadConfig {
        max_iter: 2,
        ..NelderMeadConfig::default()
    };

    let err = BgNbdModel::fit(&features, 0.001, &config).unwrap_err();
    assert!(err.is_numerical_error());
    assert!(matches!(err, CltvError::NotConverged { iterations: 2, .. }));

    let err = GammaGammaModel::fit(&features, 0.01, &config).unwrap_err();
    assert!(matches!(err, CltvError::NotConverged { .. }));
}

#[test]
fn test_single_customer_cannot_be_fit() {
    let features = population_features(1);
    let err = BgNbdModel::fit(&features, 0.001, &NelderMeadConfig::default()).unwrap_err();
    assert!(matches!(err, CltvError::InsufficientData { got: 1, .. }));

    let err = GammaGammaModel::fit(&features, 0.01, &NelderMeadConfig::default()).unwrap_err();
    assert!(matches!(err, CltvError::InsufficientData { got: 1, .. }));
}
