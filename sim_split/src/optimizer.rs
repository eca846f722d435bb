//! Picks the similarity threshold whose largest cluster is closest to a target size.

use log::{debug, info};

use crate::cluster::{assign_clusters, Clusters};
use crate::pairs::PairStore;

/// Result of a bounded scalar minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedMinimum {
    pub x: f64,
    pub fun: f64,
    pub evaluations: usize,
    /// False when the evaluation budget ran out before the bracket shrank below tolerance.
    pub converged: bool,
}

/// Brent's bounded minimizer: golden section steps with parabolic interpolation where the
/// parabola is trustworthy. Never evaluates `f` outside `[lower, upper]`.
pub fn minimize_bounded<F>(mut f: F, lower: f64, upper: f64, xatol: f64, max_evaluations: usize) -> BoundedMinimum
where
    F: FnMut(f64) -> f64,
{
    let sqrt_eps = (2.2e-16f64).sqrt();
    let golden_mean = 0.5 * (3.0 - 5.0f64.sqrt());

    let (mut a, mut b) = (lower, upper);

    let mut fulc = a + golden_mean * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0f64;
    let mut e = 0.0f64;

    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > (tol2 - 0.5 * (b - a)) {

        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;

            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            let acceptable = p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf);
            match acceptable {
                true => {
                    rat = p / q;
                    let x = xf + rat;
                    if (x - a) < tol2 || (b - x) < tol2 {
                        rat = tol1 * sign_or_one(xm - xf);
                    }
                },
                false => golden = true,
            }
        }

        if golden {
            e = match xf >= xm {
                true => a - xf,
                false => b - xf,
            };
            rat = golden_mean * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_evaluations {
            converged = false;
            break;
        }
    }

    return BoundedMinimum { x: xf, fun: fx, evaluations, converged };
}

/// Sign of `v`, with zero counted as positive.
fn sign_or_one(v: f64) -> f64 {

    match v < 0.0 {
        true => -1.0,
        false => 1.0,
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdFit {
    pub threshold: f64,
    pub clusters: Clusters,
    /// `|largest cluster - target|` at `threshold`.
    pub deviation: f64,
    pub evaluations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdOptimizer {
    pub min_threshold: f64,
    pub largest_cluster_fraction: f64,
    pub xatol: f64,
    pub max_evaluations: usize,
}

impl ThresholdOptimizer {

    pub fn new(min_threshold: f64, largest_cluster_fraction: f64) -> Self {

        return Self {
            min_threshold,
            largest_cluster_fraction,
            xatol: 1e-5,
            max_evaluations: 500,
        }
    }

    /// Size of the largest cluster formed by the pairs strictly above `threshold`.
    pub fn max_cluster_size(pairs: &PairStore, n_instances: usize, threshold: f64) -> usize {

        let good_pairs = pairs.filter(threshold);
        return assign_clusters(n_instances, good_pairs).max_cluster_size();
    }

    pub fn deviation(&self, pairs: &PairStore, n_instances: usize, threshold: f64) -> f64 {

        let target = self.largest_cluster_fraction * n_instances as f64;
        let largest = Self::max_cluster_size(pairs, n_instances, threshold) as f64;
        return (largest - target).abs();
    }

    /// Searches `[min_threshold, 1]` and clusters once more at the threshold found.
    pub fn optimize(&self, pairs: &PairStore, n_instances: usize) -> ThresholdFit {

        let result = minimize_bounded(
            |t| self.deviation(pairs, n_instances, t),
            self.min_threshold,
            1.0,
            self.xatol,
            self.max_evaluations,
        );

        info!("Optimal threshold: {}", result.x);
        debug!("Threshold search used {} evaluations (converged: {}), deviation {}", result.evaluations, result.converged, result.fun);

        let good_pairs = pairs.filter(result.x);
        debug!("Generating clusters with {} close pairs", good_pairs.len());
        let clusters = assign_clusters(n_instances, good_pairs);

        let target = self.largest_cluster_fraction * n_instances as f64;
        let deviation = (clusters.max_cluster_size() as f64 - target).abs();

        return ThresholdFit {
            threshold: result.x,
            clusters,
            deviation,
            evaluations: result.evaluations,
            converged: result.converged,
        };
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::pairs::PairRecord;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn quadratic_minimum() {

        let res = minimize_bounded(|x| (x - 0.7) * (x - 0.7), 0.0, 1.0, 1e-5, 500);

        assert!(res.converged);
        assert_approx_eq!(res.x, 0.7, 1e-4);
        assert_approx_eq!(res.fun, 0.0, 1e-8);
    }

    #[test]
    fn minimum_on_the_boundary() {

        let res = minimize_bounded(|x| x, 0.45, 1.0, 1e-5, 500);

        assert!(res.x >= 0.45);
        assert_approx_eq!(res.x, 0.45, 1e-3);
    }

    #[test]
    fn stays_inside_bounds() {

        let mut probes: Vec<f64> = Vec::new();
        minimize_bounded(|x| { probes.push(x); (x * 17.0).sin() }, 0.2, 0.9, 1e-5, 500);

        assert!(probes.iter().all(|x| *x >= 0.2 && *x <= 0.9));
    }

    #[test]
    fn budget_is_respected() {

        let res = minimize_bounded(|x| (x * 40.0).sin(), 0.0, 1.0, 1e-12, 5);

        assert_eq!(res.evaluations, 5);
        assert!(!res.converged);
    }

    #[test]
    fn step_objective_lands_on_plateau() {

        // largest cluster: 5 below 0.47, 3 up to 0.9, 2 up to 0.95, then 1
        let pairs = PairStore::new(vec![
            PairRecord::new(0, 1, 0.9),
            PairRecord::new(0, 2, 0.9),
            PairRecord::new(1, 2, 0.9),
            PairRecord::new(3, 4, 0.95),
            PairRecord::new(2, 3, 0.47),
        ], 0.45);

        let optimizer = ThresholdOptimizer::new(0.45, 0.5);
        let fit = optimizer.optimize(&pairs, 6);

        assert!(fit.threshold >= 0.47 && fit.threshold < 0.9, "threshold {}", fit.threshold);
        assert_approx_eq!(fit.deviation, 0.0);
        assert_eq!(fit.clusters.ids(), &[0, 0, 0, 3, 3, 5]);
    }

    #[test]
    fn clusters_recomputed_at_optimum() {

        let pairs = PairStore::new(vec![
            PairRecord::new(0, 1, 0.95),
            PairRecord::new(1, 2, 0.6),
        ], 0.45);

        let fit = ThresholdOptimizer::new(0.45, 0.1).optimize(&pairs, 10);

        let expected = assign_clusters(10, pairs.filter(fit.threshold));
        assert_eq!(fit.clusters, expected);
    }
}
