//! Derivative-free minimization for the likelihood fits.
//!
//! Both customer models are fit by minimizing a penalized negative
//! log-likelihood over a handful of log-transformed parameters. The surface
//! is smooth but gradients are awkward to write for the hypergeometric
//! terms, so a Nelder–Mead simplex search is used.

use serde::{Deserialize, Serialize};

/// Configuration for Nelder–Mead optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence tolerance. The search stops once either the relative
    /// spread of objective values or the simplex diameter falls below it.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrinkage coefficient.
    pub sigma: f64,
    /// Initial simplex edge length.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 20_000,
            tolerance: 1e-9,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.25,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `objective` starting from `initial`.
///
/// Non-finite objective values are treated as `+inf`, so the simplex walks
/// away from regions where the likelihood is undefined.
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: &NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(initial.to_vec());
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += config.initial_step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        let centroid = centroid_excluding(&simplex, worst);

        if values[best].is_finite() {
            let spread = values[worst] - values[best];
            let diameter = simplex
                .iter()
                .map(|v| max_abs_diff(v, &simplex[best]))
                .fold(0.0, f64::max);
            if spread <= config.tolerance * (1.0 + values[best].abs())
                || diameter <= config.tolerance
            {
                converged = true;
                break;
            }
        }

        let reflected = along(&centroid, &simplex[worst], -config.alpha);
        let reflected_value = eval(&reflected);

        if reflected_value < values[best] {
            let expanded = along(&centroid, &simplex[worst], -config.alpha * config.gamma);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        // Contract toward whichever of the reflected/worst points is better
        let (contracted, reference) = if reflected_value < values[worst] {
            (along(&centroid, &reflected, config.rho), reflected_value)
        } else {
            (along(&centroid, &simplex[worst], config.rho), values[worst])
        };
        let contracted_value = eval(&contracted);
        if contracted_value < reference {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i != best {
                for j in 0..n {
                    simplex[i][j] = anchor[j] + config.sigma * (simplex[i][j] - anchor[j]);
                }
                values[i] = eval(&simplex[i]);
            }
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    NelderMeadResult {
        optimal_point: simplex[best].clone(),
        optimal_value: values[best],
        iterations,
        converged,
    }
}

fn centroid_excluding(simplex: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let n = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut centroid = vec![0.0; n];
    for (i, vertex) in simplex.iter().enumerate() {
        if i != exclude {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v;
            }
        }
    }
    for c in &mut centroid {
        *c /= count;
    }
    centroid
}

/// `centroid + t * (point - centroid)`
fn along(centroid: &[f64], point: &[f64], t: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + t * (p - c))
        .collect()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
