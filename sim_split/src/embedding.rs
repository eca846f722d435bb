//! Two dimensional embeddings of fingerprint space, for plotting how the clusters sit.
//!
//! Only the coordinates are produced here; drawing them is left to the caller.

use std::str::FromStr;

use log::debug;
use rand::Rng;

use crate::data::FingerprintMatrix;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TsneParams {
    pub perplexity: f64,
    pub learning_rate: f64,
    pub n_iter: usize,
    pub early_exaggeration: f64,
    /// Iterations run with exaggerated affinities and low momentum.
    pub exaggeration_iter: usize,
}

impl Default for TsneParams {

    fn default() -> Self {

        return Self {
            perplexity: 30.0,
            learning_rate: 200.0,
            n_iter: 1000,
            early_exaggeration: 12.0,
            exaggeration_iter: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DimReducer {
    Tsne(TsneParams),
    /// Classical (Torgerson) multidimensional scaling.
    Mds,
}

impl FromStr for DimReducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {

        match s {
            "tsne" => Ok(DimReducer::Tsne(TsneParams::default())),
            "mds" => Ok(DimReducer::Mds),
            _ => Err(Error::UnsupportedReducer(s.to_string())),
        }
    }
}

impl DimReducer {

    pub fn fit_transform<R: Rng + ?Sized>(&self, fps: &FingerprintMatrix, rng: &mut R) -> Vec<[f64; 2]> {

        debug!("Reducing {} fingerprints of length {} with {:?}", fps.len(), fps.length(), self);

        match self {
            DimReducer::Tsne(params) => tsne(fps, params, rng),
            DimReducer::Mds => classical_mds(fps, rng),
        }
    }
}

fn squared_distances(fps: &FingerprintMatrix) -> Vec<f64> {

    let n = fps.len();
    let mut d = vec![0.0f64; n * n];

    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f64 = fps.row(i).iter().zip(fps.row(j))
                .map(|(a, b)| ((*a - *b) as f64).powi(2))
                .sum();
            d[i * n + j] = dist;
            d[j * n + i] = dist;
        }
    }

    return d;
}

/// Row `i` of the conditional affinities, with the Gaussian bandwidth found by bisection so the
/// row's entropy matches `ln(perplexity)`.
fn conditional_row(d: &[f64], i: usize, n: usize, perplexity: f64) -> Vec<f64> {

    let target = perplexity.ln();
    let mut beta = 1.0f64;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.0f64; n];

    for _ in 0..100 {

        let mut sum = 0.0;
        for j in 0..n {
            row[j] = match j == i {
                true => 0.0,
                false => (-d[i * n + j] * beta).exp(),
            };
            sum += row[j];
        }
        let sum = sum.max(1e-12);

        let mut weighted = 0.0;
        for j in 0..n {
            weighted += d[i * n + j] * row[j];
        }
        let entropy = sum.ln() + beta * weighted / sum;

        for p in row.iter_mut() {
            *p /= sum;
        }

        let diff = entropy - target;
        if diff.abs() < 1e-5 {
            break;
        }

        if diff > 0.0 {
            beta_min = beta;
            beta = match beta_max.is_infinite() {
                true => beta * 2.0,
                false => (beta + beta_max) / 2.0,
            };
        } else {
            beta_max = beta;
            beta = match beta_min.is_infinite() {
                true => beta / 2.0,
                false => (beta + beta_min) / 2.0,
            };
        }
    }

    return row;
}

/// Exact t-SNE: O(n^2) per iteration, fine for the few thousand points a plot can show.
pub fn tsne<R: Rng + ?Sized>(fps: &FingerprintMatrix, params: &TsneParams, rng: &mut R) -> Vec<[f64; 2]> {

    let n = fps.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }

    let d = squared_distances(fps);
    let perplexity = params.perplexity.min((n - 1) as f64 / 3.0).max(1.0);

    let mut p = vec![0.0f64; n * n];
    for i in 0..n {
        let row = conditional_row(&d, i, n, perplexity);
        p[i * n..(i + 1) * n].copy_from_slice(&row);
    }

    // symmetrize
    let mut joint = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            joint[i * n + j] = ((p[i * n + j] + p[j * n + i]) / (2.0 * n as f64)).max(1e-12);
        }
    }

    let mut y: Vec<[f64; 2]> = (0..n)
        .map(|_| [(rng.gen::<f64>() - 0.5) * 1e-4, (rng.gen::<f64>() - 0.5) * 1e-4])
        .collect();
    let mut update = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];
    let mut num = vec![0.0f64; n * n];

    for iter in 0..params.n_iter {

        let (exaggeration, momentum) = match iter < params.exaggeration_iter {
            true => (params.early_exaggeration, 0.5),
            false => (1.0, 0.8),
        };

        let mut sum_num = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let q = 1.0 / (1.0 + dx * dx + dy * dy);
                num[i * n + j] = q;
                num[j * n + i] = q;
                sum_num += 2.0 * q;
            }
        }
        let sum_num = sum_num.max(1e-12);

        for i in 0..n {

            let mut grad = [0.0f64; 2];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[i * n + j] / sum_num).max(1e-12);
                let mult = (exaggeration * joint[i * n + j] - q) * num[i * n + j];
                grad[0] += 4.0 * mult * (y[i][0] - y[j][0]);
                grad[1] += 4.0 * mult * (y[i][1] - y[j][1]);
            }

            for k in 0..2 {
                gains[i][k] = match (grad[k] > 0.0) != (update[i][k] > 0.0) {
                    true => gains[i][k] + 0.2,
                    false => gains[i][k] * 0.8,
                }
                .max(0.01);
                update[i][k] = momentum * update[i][k] - params.learning_rate * gains[i][k] * grad[k];
            }
        }

        for i in 0..n {
            y[i][0] += update[i][0];
            y[i][1] += update[i][1];
        }

        center(&mut y);
    }

    return y;
}

fn center(y: &mut [[f64; 2]]) {

    let n = y.len() as f64;
    let mean_x: f64 = y.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y: f64 = y.iter().map(|p| p[1]).sum::<f64>() / n;

    for p in y.iter_mut() {
        p[0] -= mean_x;
        p[1] -= mean_y;
    }
}

/// Top two eigenpairs of the double centred squared distance matrix, scaled by the root of
/// their eigenvalues. Eigenvectors come from power iteration with deflation.
pub fn classical_mds<R: Rng + ?Sized>(fps: &FingerprintMatrix, rng: &mut R) -> Vec<[f64; 2]> {

    let n = fps.len();
    if n < 2 {
        return vec![[0.0, 0.0]; n];
    }

    let d = squared_distances(fps);

    let row_means: Vec<f64> = (0..n).map(|i| d[i * n..(i + 1) * n].iter().sum::<f64>() / n as f64).collect();
    let grand_mean: f64 = row_means.iter().sum::<f64>() / n as f64;

    let mut b = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            b[i * n + j] = -0.5 * (d[i * n + j] - row_means[i] - row_means[j] + grand_mean);
        }
    }

    let mut coords = vec![[0.0f64; 2]; n];
    for k in 0..2 {

        let mut v: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() - 0.5).collect();
        let mut eigenvalue = 0.0;

        for _ in 0..500 {
            let mut w = vec![0.0f64; n];
            for i in 0..n {
                w[i] = (0..n).map(|j| b[i * n + j] * v[j]).sum();
            }

            let norm = w.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm < 1e-12 {
                eigenvalue = 0.0;
                break;
            }

            let next: Vec<f64> = w.iter().map(|x| x / norm).collect();
            let delta: f64 = next.iter().zip(v.iter()).map(|(a, b)| (a - b).abs()).sum();
            v = next;
            eigenvalue = norm;
            if delta < 1e-10 {
                break;
            }
        }

        let scale = eigenvalue.max(0.0).sqrt();
        for i in 0..n {
            coords[i][k] = v[i] * scale;
        }

        // deflate
        for i in 0..n {
            for j in 0..n {
                b[i * n + j] -= eigenvalue * v[i] * v[j];
            }
        }
    }

    return coords;
}

#[cfg(test)]
mod tests {

    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
    }

    #[test]
    fn reducer_names() {

        assert_eq!("mds".parse::<DimReducer>().unwrap(), DimReducer::Mds);
        assert!(matches!("tsne".parse::<DimReducer>().unwrap(), DimReducer::Tsne(_)));
        assert!(matches!("umap".parse::<DimReducer>(), Err(Error::UnsupportedReducer(name)) if name == "umap"));
    }

    #[test]
    fn mds_recovers_planar_distances() {

        let points = vec![vec![0.0, 0.0], vec![3.0, 0.0], vec![0.0, 4.0], vec![3.0, 4.0], vec![1.0, 1.0]];
        let fps = FingerprintMatrix::from_rows(points.clone()).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let coords = classical_mds(&fps, &mut rng);

        for i in 0..points.len() {
            for j in 0..points.len() {
                let expected = (((points[i][0] - points[j][0]) as f64).powi(2) + ((points[i][1] - points[j][1]) as f64).powi(2)).sqrt();
                assert_approx_eq!(dist(coords[i], coords[j]), expected, 1e-3);
            }
        }
    }

    #[test]
    fn tsne_separates_two_groups() {

        let mut rows: Vec<Vec<f32>> = Vec::new();
        for k in 0..10 {
            rows.push(vec![k as f32 * 0.01, 0.0, 0.0]);
        }
        for k in 0..10 {
            rows.push(vec![10.0 + k as f32 * 0.01, 10.0, 10.0]);
        }
        let fps = FingerprintMatrix::from_rows(rows).unwrap();

        let mut params = TsneParams::default();
        params.n_iter = 300;
        let coords = tsne(&fps, &params, &mut StdRng::seed_from_u64(4));

        let mut within = 0.0;
        let mut between = 0.0;
        for i in 0..20 {
            for j in 0..20 {
                match (i < 10) == (j < 10) {
                    true => within += dist(coords[i], coords[j]),
                    false => between += dist(coords[i], coords[j]),
                }
            }
        }

        assert!(coords.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
        assert!(between / 200.0 > within / 180.0);
    }

    #[test]
    fn tiny_inputs() {

        let fps = FingerprintMatrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(DimReducer::Mds.fit_transform(&fps, &mut rng), vec![[0.0, 0.0]]);
        assert_eq!(DimReducer::Tsne(TsneParams::default()).fit_transform(&fps, &mut rng), vec![[0.0, 0.0]]);
    }
}
