//! Special functions used by the likelihoods and closed-form predictions

pub use statrs::function::gamma::ln_gamma;

/// Series cap for [`hyp2f1`]; terms decay geometrically in `z` for the
/// arguments the models produce.
const MAX_SERIES_TERMS: usize = 100_000;
const SERIES_EPS: f64 = 1e-15;

/// Gauss hypergeometric function 2F1(a, b; c; z) for `0 <= z < 1`.
///
/// Evaluated by direct power series. Returns NaN outside the supported
/// domain or when `c` is a non-positive integer.
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if !(0.0..1.0).contains(&z) || (c <= 0.0 && c.fract() == 0.0) {
        return f64::NAN;
    }
    if z == 0.0 {
        return 1.0;
    }

    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 0..MAX_SERIES_TERMS {
        let k = k as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;
        if term == 0.0 || term.abs() <= SERIES_EPS * sum.abs() {
            break;
        }
        if !sum.is_finite() {
            return f64::NAN;
        }
    }
    sum
}
