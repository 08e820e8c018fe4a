//! BG/NBD purchase-frequency model
//!
//! Beta-Geometric/Negative-Binomial model of Fader, Hardie & Lee (2005),
//! "Counting Your Customers the Easy Way". While active, a customer buys at
//! a Poisson rate `λ ~ Gamma(r, α)`; after each purchase they drop out with
//! probability `p ~ Beta(a, b)`.
//!
//! Inputs per customer are the frequency `x`, the recency `t_x` (time of the
//! last purchase measured from the first) and the tenure `T`, all in the same
//! time unit (weeks in this crate).

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use super::error::{CltvError, Result};
use super::optimize::{nelder_mead, NelderMeadConfig};
use super::records::FeatureRecord;
use super::special::{hyp2f1, ln_gamma};

const STAGE: &str = "BG/NBD fit";

/// Tenure is rescaled so its maximum equals this value while fitting.
const FIT_TIME_SCALE: f64 = 10.0;

/// Fitted BG/NBD parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BgNbdParams {
    /// Shape of the purchase-rate Gamma distribution
    pub r: f64,
    /// Rate (inverse scale) of the purchase-rate Gamma distribution
    pub alpha: f64,
    /// Dropout Beta distribution, first shape
    pub a: f64,
    /// Dropout Beta distribution, second shape
    pub b: f64,
}

impl BgNbdParams {
    fn from_log(theta: &[f64]) -> Self {
        Self {
            r: theta[0].exp(),
            alpha: theta[1].exp(),
            a: theta[2].exp(),
            b: theta[3].exp(),
        }
    }

    fn is_valid(&self) -> bool {
        [self.r, self.alpha, self.a, self.b]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    fn sum_of_squares(&self) -> f64 {
        self.r * self.r + self.alpha * self.alpha + self.a * self.a + self.b * self.b
    }
}

/// A fitted BG/NBD model
#[derive(Debug, Clone, Serialize)]
pub struct BgNbdModel {
    params: BgNbdParams,
    /// Mean per-customer log-likelihood at the optimum
    pub mean_log_likelihood: f64,
    pub iterations: usize,
    pub n_customers: usize,
}

/// Log-likelihood of one customer (FHL 2005, eq. 6).
pub fn log_likelihood(params: &BgNbdParams, x: f64, t_x: f64, t: f64) -> f64 {
    let BgNbdParams { r, alpha, a, b } = *params;

    let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
    let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
    let a3 = -(r + x) * (alpha + t).ln();

    let tail = if x > 0.0 {
        let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + t_x).ln();
        log_add_exp(a3, a4)
    } else {
        a3
    };

    a1 + a2 + tail
}

fn log_add_exp(u: f64, v: f64) -> f64 {
    let m = u.max(v);
    if m == f64::NEG_INFINITY {
        return m;
    }
    m + ((u - m).exp() + (v - m).exp()).ln()
}

fn validate_inputs(features: &[FeatureRecord]) -> Result<()> {
    if features.len() < 2 {
        return Err(CltvError::InsufficientData {
            stage: STAGE,
            needed: 2,
            got: features.len(),
        });
    }
    for f in features {
        if !f.recency_weeks.is_finite() || !f.tenure_weeks.is_finite() {
            return Err(CltvError::invalid_value(
                "recency/tenure",
                &f.customer_id,
                "non-finite value",
            ));
        }
        if f.recency_weeks < 0.0 || f.recency_weeks > f.tenure_weeks || f.tenure_weeks <= 0.0 {
            return Err(CltvError::invalid_value(
                "recency/tenure",
                &f.customer_id,
                format!(
                    "need 0 <= recency ({}) <= tenure ({}) and tenure > 0",
                    f.recency_weeks, f.tenure_weeks
                ),
            ));
        }
    }
    Ok(())
}

impl BgNbdModel {
    /// Wrap known parameters, e.g. from a previous fit.
    pub fn from_params(params: BgNbdParams) -> Result<Self> {
        if !params.is_valid() {
            return Err(CltvError::Numerical {
                stage: STAGE,
                message: format!("parameters must be positive and finite: {:?}", params),
            });
        }
        Ok(Self {
            params,
            mean_log_likelihood: f64::NAN,
            iterations: 0,
            n_customers: 0,
        })
    }

    /// Fit by penalized maximum likelihood.
    ///
    /// Minimizes `-mean(LL) + penalizer * (r² + α² + a² + b²)` over
    /// log-parameters. Times are rescaled so the largest tenure is 10 during
    /// the search; `α` is mapped back to weekly units afterwards.
    pub fn fit(
        features: &[FeatureRecord],
        penalizer: f64,
        config: &NelderMeadConfig,
    ) -> Result<Self> {
        validate_inputs(features)?;

        let max_tenure = features
            .iter()
            .map(|f| f.tenure_weeks)
            .fold(0.0, f64::max);
        let scale = FIT_TIME_SCALE / max_tenure;

        let data: Vec<(f64, f64, f64)> = features
            .iter()
            .map(|f| {
                (
                    f.frequency as f64,
                    f.recency_weeks * scale,
                    f.tenure_weeks * scale,
                )
            })
            .collect();
        let n = data.len() as f64;

        let objective = |theta: &[f64]| {
            let params = BgNbdParams::from_log(theta);
            if !params.is_valid() {
                return f64::INFINITY;
            }
            let total: f64 = data
                .iter()
                .map(|&(x, t_x, t)| log_likelihood(&params, x, t_x, t))
                .sum();
            -total / n + penalizer * params.sum_of_squares()
        };

        let result = nelder_mead(objective, &[0.0; 4], config);
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

        let scaled = BgNbdParams::from_log(&result.optimal_point);
        let params = BgNbdParams {
            alpha: scaled.alpha / scale,
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
            .map(|f| {
                log_likelihood(
                    &params,
                    f.frequency as f64,
                    f.recency_weeks,
                    f.tenure_weeks,
                )
            })
            .sum::<f64>()
            / n;

        info!(
            "{}: r={:.4} alpha={:.4} a={:.4} b={:.4}",
            STAGE, params.r, params.alpha, params.a, params.b
        );

        Ok(Self {
            params,
            mean_log_likelihood,
            iterations: result.iterations,
            n_customers: features.len(),
        })
    }

    pub fn params(&self) -> &BgNbdParams {
        &self.params
    }

    /// Expected number of purchases in `(T, T + horizon]` given the history
    /// `(x, t_x, T)` (FHL 2005, eq. 10).
    ///
    /// The hypergeometric term is evaluated after Euler's transformation,
    /// `(1-z)^(r+x) 2F1(r+x, b+x; c; z) = (1-z)^(a-1) 2F1(a+b-1-r, a-1; c; z)`,
    /// which keeps the series well scaled for large `x`.
    pub fn predict(&self, horizon: f64, x: f64, t_x: f64, t: f64) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let BgNbdParams { r, alpha, b, .. } = self.params;
        // The closed form has a removable singularity at a = 1
        let a = if (self.params.a - 1.0).abs() < 1e-8 {
            1.0 + 1e-8
        } else {
            self.params.a
        };

        let c = a + b + x - 1.0;
        let z = horizon / (alpha + t + horizon);
        let ln_one_minus_z = ((alpha + t) / (alpha + t + horizon)).ln();
        let series = hyp2f1(a + b - 1.0 - r, a - 1.0, c, z);

        let numerator = c / (a - 1.0) * (1.0 - ((a - 1.0) * ln_one_minus_z).exp() * series);
        numerator / self.dropout_odds_term(x, t_x, t)
    }

    /// Expected purchases for every customer over `horizon`.
    pub fn predict_many(&self, horizon: f64, features: &[FeatureRecord]) -> Vec<f64> {
        features
            .par_iter()
            .map(|f| {
                self.predict(
                    horizon,
                    f.frequency as f64,
                    f.recency_weeks,
                    f.tenure_weeks,
                )
            })
            .collect()
    }

    /// Unconditional expected purchases in `(0, t]` for a new customer
    /// (FHL 2005, eq. 7).
    pub fn expected_transactions(&self, t: f64) -> f64 {
        self.predict(t, 0.0, 0.0, 0.0)
    }

    /// Probability the customer is still active at `T` (FHL 2005, eq. 11).
    pub fn probability_alive(&self, x: f64, t_x: f64, t: f64) -> f64 {
        1.0 / self.dropout_odds_term(x, t_x, t)
    }

    // 1 + δ(x>0) · a/(b+x-1) · ((α+T)/(α+t_x))^(r+x)
    fn dropout_odds_term(&self, x: f64, t_x: f64, t: f64) -> f64 {
        if x <= 0.0 {
            return 1.0;
        }
        let BgNbdParams { r, alpha, a, b } = self.params;
        let ln_ratio = (r + x) * ((alpha + t) / (alpha + t_x)).ln();
        1.0 + a / (b + x - 1.0) * ln_ratio.exp()
    }
}
