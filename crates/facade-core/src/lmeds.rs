//! Generic, model-agnostic Least-Median-of-Squares (LMedS) engine.
//!
//! Implement [`Estimator`] for a model and call [`lmeds`] with the data and
//! some [`LmedsOptions`]. Each candidate fitted from a minimal sample is scored
//! by the median of its squared residuals over all data; the candidate with
//! the smallest median wins.
//!
//! The engine never panics on bad input. When the data is too small, or when
//! every drawn sample is degenerate, [`lmeds`] returns an [`LmedsResult`]
//! with `model == None` instead of a placeholder model.

use log::{debug, trace};
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{median_in_place, Real};

/// Configuration parameters for the LMedS engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmedsOptions {
    /// Upper bound on the number of minimal samples evaluated.
    pub max_iters: usize,
    /// Probability that at least one sample is outlier-free.
    pub confidence: Real,
    /// Expected outlier ratio in `[0, 1)`.
    pub outlier_ratio: Real,
    /// Maximum accepted residual (square root of the best median).
    ///
    /// `None` means unbounded: the best candidate is accepted unconditionally.
    pub threshold: Option<Real>,
    /// Random-number generator seed (for reproducibility).
    pub seed: u64,
}

impl Default for LmedsOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            confidence: 0.99,
            outlier_ratio: 0.5,
            threshold: None,
            seed: 1_234_567,
        }
    }
}

/// Output of an LMedS run.
#[derive(Debug, Clone)]
pub struct LmedsResult<M> {
    /// Best model found (if any).
    pub model: Option<M>,
    /// Median squared residual of the best candidate, also reported when the
    /// candidate is rejected by the threshold.
    pub median: Real,
    /// Robust standard deviation derived from the best median.
    pub sigma: Real,
    /// Indices of data within `2.5 * sigma` of the best model.
    pub inliers: Vec<usize>,
    /// Number of minimal samples evaluated.
    pub iters: usize,
    /// Whether every minimal subset was enumerated instead of sampled.
    pub exhaustive: bool,
}

impl<M> Default for LmedsResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            median: Real::INFINITY,
            sigma: Real::INFINITY,
            inliers: Vec::new(),
            iters: 0,
            exhaustive: false,
        }
    }
}

impl<M> LmedsResult<M> {
    /// Whether a model was found and accepted.
    pub fn success(&self) -> bool {
        self.model.is_some()
    }
}

/// Estimator plugged into the LMedS engine.
///
/// Estimators take `&self` so that a kernel can carry fixed constraints (for
/// instance an anchor segment every candidate must contain).
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if the subset is degenerate or fitting fails.
    fn fit(&self, data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum (e.g. point-to-plane distance).
    fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> Real;

    /// Optional degeneracy check on the sample subset.
    ///
    /// Default: assume non-degenerate.
    fn is_degenerate(&self, _data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }
}

/// Number of random samples needed to reach `confidence` with the given
/// outlier ratio, capped by `max_iters`.
fn sample_budget(
    confidence: Real,
    outlier_ratio: Real,
    min_samples: usize,
    max_iters: usize,
) -> usize {
    if !(0.0..1.0).contains(&confidence) || !(0.0..1.0).contains(&outlier_ratio) {
        return max_iters;
    }
    let good = (1.0 - outlier_ratio).powi(min_samples as i32);
    let denom = (1.0 - good).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    (n.max(1.0) as usize).min(max_iters)
}

/// `C(n, k)`, saturating at `limit + 1`.
fn binomial_capped(n: usize, k: usize, limit: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > limit as u128 {
            return limit.saturating_add(1);
        }
    }
    acc as usize
}

/// Advance `idx` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(idx: &mut [usize], n: usize) -> bool {
    let k = idx.len();
    for i in (0..k).rev() {
        if idx[i] < n - k + i {
            idx[i] += 1;
            for j in i + 1..k {
                idx[j] = idx[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

struct Best<M> {
    model: M,
    median: Real,
    iter: usize,
}

fn score<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    sample: &[usize],
    residuals: &mut Vec<Real>,
) -> Option<(E::Model, Real)> {
    if estimator.is_degenerate(data, sample) {
        return None;
    }
    let model = estimator.fit(data, sample)?;
    residuals.clear();
    residuals.extend(data.iter().map(|d| {
        let r = estimator.residual(&model, d);
        r * r
    }));
    let median = median_in_place(residuals)?;
    if !median.is_finite() {
        return None;
    }
    Some((model, median))
}

/// Run the LMedS loop for a given [`Estimator`].
///
/// When the number of distinct minimal subsets does not exceed
/// `opts.max_iters` they are all enumerated, which makes the result
/// independent of the seed. Otherwise the number of random samples follows
/// the usual `log(1 - confidence) / log(1 - (1 - outlier_ratio)^k)` bound.
pub fn lmeds<E: Estimator>(
    estimator: &E,
    data: &[E::Datum],
    opts: &LmedsOptions,
) -> LmedsResult<E::Model> {
    let mut result = LmedsResult::default();
    let n = data.len();
    let k = E::MIN_SAMPLES;
    if n < k || k == 0 {
        debug!("lmeds: {n} data points, {k} required");
        return result;
    }

    let mut residuals = Vec::with_capacity(n);
    let mut best: Option<Best<E::Model>> = None;
    let mut consider = |sample: &[usize], iter: usize, best: &mut Option<Best<E::Model>>| {
        if let Some((model, median)) = score(estimator, data, sample, &mut residuals) {
            if best.as_ref().map_or(true, |b| median < b.median) {
                trace!("lmeds: iter {iter} improves median to {median:.3e}");
                *best = Some(Best {
                    model,
                    median,
                    iter,
                });
            }
        }
    };

    let subsets = binomial_capped(n, k, opts.max_iters);
    if subsets <= opts.max_iters {
        result.exhaustive = true;
        let mut sample: Vec<usize> = (0..k).collect();
        loop {
            result.iters += 1;
            consider(&sample, result.iters, &mut best);
            if !next_combination(&mut sample, n) {
                break;
            }
        }
    } else {
        let budget = sample_budget(opts.confidence, opts.outlier_ratio, k, opts.max_iters);
        let all_indices: Vec<usize> = (0..n).collect();
        let mut sample = vec![0usize; k];
        let mut rng = StdRng::seed_from_u64(opts.seed);
        while result.iters < budget {
            result.iters += 1;
            all_indices
                .as_slice()
                .choose_multiple(&mut rng, k)
                .enumerate()
                .for_each(|(i, &idx)| sample[i] = idx);
            consider(&sample, result.iters, &mut best);
        }
    }

    let Some(best) = best else {
        debug!("lmeds: all {} samples were degenerate", result.iters);
        return result;
    };

    if let Some(threshold) = opts.threshold {
        if best.median.sqrt() > threshold {
            debug!(
                "lmeds: best median residual {:.3e} exceeds threshold {threshold:.3e}",
                best.median.sqrt()
            );
            result.median = best.median;
            return result;
        }
    }

    let dof = n.saturating_sub(k).max(1) as Real;
    let sigma = 1.4826 * (1.0 + 5.0 / dof) * best.median.sqrt();
    let cutoff = 2.5 * sigma;
    result.inliers = data
        .iter()
        .enumerate()
        .filter(|(_, d)| estimator.residual(&best.model, d) <= cutoff)
        .map(|(i, _)| i)
        .collect();
    debug!(
        "lmeds: best median {:.3e} at iter {}/{} ({} inliers of {n})",
        best.median,
        best.iter,
        result.iters,
        result.inliers.len()
    );
    result.median = best.median;
    result.sigma = sigma;
    result.model = Some(best.model);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct LineModel {
        slope: f64,
        intercept: f64,
    }

    struct LineEstimator;

    impl Estimator for LineEstimator {
        type Datum = (f64, f64);
        type Model = LineModel;

        const MIN_SAMPLES: usize = 2;

        fn fit(&self, data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
            let p0 = data[sample_indices[0]];
            let p1 = data[sample_indices[1]];
            let dx = p1.0 - p0.0;
            if dx.abs() < 1e-9 {
                return None;
            }
            let slope = (p1.1 - p0.1) / dx;
            Some(LineModel {
                slope,
                intercept: p0.1 - slope * p0.0,
            })
        }

        fn residual(&self, model: &Self::Model, datum: &Self::Datum) -> f64 {
            let (x, y) = *datum;
            (model.slope * x - y + model.intercept).abs() / (model.slope * model.slope + 1.0).sqrt()
        }
    }

    fn noisy_line(n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 0.5;
                (x, 2.0 * x + 1.0 + if i % 2 == 0 { 0.01 } else { -0.01 })
            })
            .collect()
    }

    #[test]
    fn lmeds_handles_insufficient_data() {
        let res = lmeds(&LineEstimator, &[(0.0, 0.0)], &LmedsOptions::default());
        assert!(!res.success());
        assert!(res.inliers.is_empty());
        assert_eq!(res.iters, 0);
    }

    #[test]
    fn lmeds_recovers_line_with_outliers() {
        let mut data = noisy_line(10);
        data.extend([(5.0, -3.0), (6.0, 10.0), (7.0, -8.0), (1.0, 9.0)]);

        let res = lmeds(&LineEstimator, &data, &LmedsOptions::default());
        let model = res.model.as_ref().expect("model should be present");
        assert!((model.slope - 2.0).abs() < 0.05);
        assert!((model.intercept - 1.0).abs() < 0.05);
        assert!(res.exhaustive, "C(14, 2) fits the default budget");
        for outlier in 10..14 {
            assert!(!res.inliers.contains(&outlier));
        }
    }

    #[test]
    fn random_sampling_is_reproducible_for_a_seed() {
        let mut data = noisy_line(60);
        data.extend((0..20).map(|i| (i as f64, -5.0 * i as f64)));
        let opts = LmedsOptions {
            max_iters: 200,
            ..LmedsOptions::default()
        };
        let a = lmeds(&LineEstimator, &data, &opts);
        let b = lmeds(&LineEstimator, &data, &opts);
        assert!(!a.exhaustive);
        assert_eq!(a.iters, b.iters);
        assert_eq!(a.median, b.median);
        let model = a.model.expect("model");
        assert!((model.slope - 2.0).abs() < 0.1);
    }

    #[test]
    fn all_degenerate_samples_yield_no_model() {
        // Vertical stack: every pair has dx == 0.
        let data: Vec<_> = (0..6).map(|i| (1.0, i as f64)).collect();
        let res = lmeds(&LineEstimator, &data, &LmedsOptions::default());
        assert!(res.model.is_none());
        assert_eq!(res.iters, 15);
        assert!(res.median.is_infinite());
    }

    #[test]
    fn threshold_rejects_poor_consensus() {
        let data = vec![(0.0, 0.0), (1.0, 5.0), (2.0, -3.0), (3.0, 8.0), (4.0, -7.0)];
        let opts = LmedsOptions {
            threshold: Some(1e-3),
            ..LmedsOptions::default()
        };
        assert!(!lmeds(&LineEstimator, &data, &opts).success());
        assert!(lmeds(&LineEstimator, &data, &LmedsOptions::default()).success());
    }

    #[test]
    fn budget_follows_confidence_formula() {
        assert_eq!(sample_budget(0.99, 0.5, 3, 1000), 35);
        assert_eq!(sample_budget(0.99, 0.5, 1, 1000), 7);
        assert_eq!(sample_budget(0.99, 0.5, 3, 10), 10);
        assert_eq!(binomial_capped(5, 2, 100), 10);
        assert_eq!(binomial_capped(100, 3, 1000), 1001);
    }

    #[test]
    fn options_round_trip_with_defaults() {
        let opts: LmedsOptions = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(opts.seed, 7);
        assert_eq!(opts.threshold, None);
        assert_eq!(opts.max_iters, LmedsOptions::default().max_iters);
    }
}
