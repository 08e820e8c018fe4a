//! Gamma-Gamma spend-per-transaction model
//!
//! Each customer's transaction values are Gamma(p, ν) with a customer-level
//! rate ν ~ Gamma(q, v) (Fader, Hardie & Lee 2005, "RFM and CLV: Using
//! Iso-Value Curves for Customer Base Analysis"). Spend is assumed
//! independent of purchase frequency given ν.

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use super::error::{CltvError, Result};
use super::optimize::{nelder_mead, NelderMeadConfig};
use super::records::FeatureRecord;
use super::special::ln_gamma;

const STAGE: &str = "Gamma-Gamma fit";

/// Average values are rescaled so their maximum equals this while fitting.
const FIT_VALUE_SCALE: f64 = 10.0;

/// Fitted Gamma-Gamma parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

impl GammaGammaParams {
    // q is kept above 1 so the population mean p·v/(q-1) exists
    fn from_unconstrained(theta: &[f64]) -> Self {
        Self {
            p: theta[0].exp(),
            q: 1.0 + theta[1].exp(),
            v: theta[2].exp(),
        }
    }

    fn is_valid(&self) -> bool {
        self.p.is_finite()
            && self.q.is_finite()
            && self.v.is_finite()
            && self.p > 0.0
            && self.q > 1.0
            && self.v > 0.0
    }
}

/// A fitted Gamma-Gamma model
#[derive(Debug, Clone, Serialize)]
pub struct GammaGammaModel {
    params: GammaGammaParams,
    pub mean_log_likelihood: f64,
    pub iterations: usize,
    pub n_customers: usize,
}

/// Log-likelihood of one customer's average value `m` over `x` purchases.
pub fn log_likelihood(params: &GammaGammaParams, x: f64, m: f64) -> f64 {
    let GammaGammaParams { p, q, v } = *params;
    let px = p * x;
    ln_gamma(px + q) - ln_gamma(px) - ln_gamma(q) + q * v.ln() + (px - 1.0) * m.ln()
        + px * x.ln()
        - (px + q) * (x * m + v).ln()
}

impl GammaGammaModel {
    /// Wrap known parameters.
    pub fn from_params(params: GammaGammaParams) -> Result<Self> {
        if !params.is_valid() {
            return Err(CltvError::Numerical {
                stage: STAGE,
                message: format!("need p > 0, q > 1, v > 0: {:?}", params),
            });
        }
        Ok(Self {
            params,
            mean_log_likelihood: f64::NAN,
            iterations: 0,
            n_customers: 0,
        })
    }

    /// Fit by penalized maximum likelihood on `(frequency, avg_monetary)`.
    pub fn fit(
        features: &[FeatureRecord],
        penalizer: f64,
        config: &NelderMeadConfig,
    ) -> Result<Self> {
        if features.len() < 2 {
            return Err(CltvError::InsufficientData {
                stage: STAGE,
                needed: 2,
                got: features.len(),
            });
        }
        for f in features {
            if f.frequency == 0 || !f.avg_monetary.is_finite() || f.avg_monetary <= 0.0 {
                return Err(CltvError::invalid_value(
                    "monetary_cltv_avg",
                    &f.customer_id,
                    "Gamma-Gamma needs positive frequency and average value",
                ));
            }
        }

        let max_value = features
            .iter()
            .map(|f| f.avg_monetary)
            .fold(0.0, f64::max);
        let scale = FIT_VALUE_SCALE / max_value;

        let data: Vec<(f64, f64)> = features
            .iter()
            .map(|f| (f.frequency as f64, f.avg_monetary * scale))
            .collect();
        let n = data.len() as f64;

        let objective = |theta: &[f64]| {
            let params = GammaGammaParams::from_unconstrained(theta);
            if !params.is_valid() {
                return f64::INFINITY;
            }
            let total: f64 = data
                .iter()
                .map(|&(x, m)| log_likelihood(&params, x, m))
                .sum();
            let GammaGammaParams { p, q, v } = params;
            -total / n + penalizer * (p * p + q * q + v * v)
        };

        let result = nelder_mead(objective, &[0.0; 3], config);
        debug!(
            "{}: objective {:.6} after {} iterations (converged: {})",
            STAGE, result.optimal_value, result.iterations, result.converged
        );

        if !result.converged {
            return Err(CltvError::NotConverged {
                stage: STAGE,
                iterations: result.iterations,
            });
        }
        if !result.optimal_value.is_finite() {
            return Err(CltvError::Numerical {
                stage: STAGE,
                message: "likelihood is not finite at the optimum".to_string(),
            });
        }

        let scaled = GammaGammaParams::from_unconstrained(&result.optimal_point);
        let params = GammaGammaParams {
            v: scaled.v / scale,
            ..scaled
        };
        if !params.is_valid() {
            return Err(CltvError::Numerical {
                stage: STAGE,
                message: format!("degenerate parameters {:?}", params),
            });
        }

        let mean_log_likelihood = features
            .iter()
            .map(|f| log_likelihood(&params, f.frequency as f64, f.avg_monetary))
            .sum::<f64>()
            / n;

        info!(
            "{}: p={:.4} q={:.4} v={:.4}",
            STAGE, params.p, params.q, params.v
        );

        Ok(Self {
            params,
            mean_log_likelihood,
            iterations: result.iterations,
            n_customers: features.len(),
        })
    }

    pub fn params(&self) -> &GammaGammaParams {
        &self.params
    }

    /// Mean transaction value across the population, `p·v/(q-1)`.
    pub fn population_mean(&self) -> f64 {
        let GammaGammaParams { p, q, v } = self.params;
        p * v / (q - 1.0)
    }

    /// Posterior expected average transaction value.
    ///
    /// Equals `w·m + (1-w)·population_mean` with `w = p·x / (p·x + q - 1)`,
    /// so customers with more purchases are shrunk less.
    pub fn conditional_expected_average_value(&self, x: f64, m: f64) -> f64 {
        let GammaGammaParams { p, q, v } = self.params;
        p * (v + x * m) / (p * x + q - 1.0)
    }

    pub fn conditional_expected_average_values(&self, features: &[FeatureRecord]) -> Vec<f64> {
        features
            .par_iter()
            .map(|f| self.conditional_expected_average_value(f.frequency as f64, f.avg_monetary))
            .collect()
    }
}
