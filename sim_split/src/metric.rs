//! Distance metrics over fingerprints. Similarity is always `1 - distance`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[serde(alias = "tanimoto")]
    Jaccard,
    Dice,
    Cosine,
    Hamming,
}

impl MetricKind {

    pub fn distance(&self, u: &[f32], v: &[f32]) -> f32 {

        match self {
            MetricKind::Jaccard => jaccard(u, v),
            MetricKind::Dice => dice(u, v),
            MetricKind::Cosine => cosine(u, v),
            MetricKind::Hamming => hamming(u, v),
        }
    }
}

impl FromStr for MetricKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {

        match s.to_ascii_lowercase().as_str() {
            "jaccard" | "tanimoto" => Ok(MetricKind::Jaccard),
            "dice" => Ok(MetricKind::Dice),
            "cosine" => Ok(MetricKind::Cosine),
            "hamming" => Ok(MetricKind::Hamming),
            _ => Err(Error::UnknownMetric(s.to_string())),
        }
    }
}

pub type DistanceFn = dyn Fn(&[f32], &[f32]) -> f32 + Send + Sync;

/// A named metric or a caller supplied distance function returning values in `[0, 1]`.
#[derive(Clone)]
pub enum DistanceMetric {
    Named(MetricKind),
    Custom(Arc<DistanceFn>),
}

impl DistanceMetric {

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f32], &[f32]) -> f32 + Send + Sync + 'static,
    {
        DistanceMetric::Custom(Arc::new(f))
    }

    pub fn distance(&self, u: &[f32], v: &[f32]) -> f32 {

        match self {
            DistanceMetric::Named(kind) => kind.distance(u, v),
            DistanceMetric::Custom(f) => f(u, v),
        }
    }

    pub fn similarity(&self, u: &[f32], v: &[f32]) -> f32 {
        1.0 - self.distance(u, v)
    }
}

impl From<MetricKind> for DistanceMetric {

    fn from(kind: MetricKind) -> Self {
        DistanceMetric::Named(kind)
    }
}

impl fmt::Debug for DistanceMetric {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {

        match self {
            DistanceMetric::Named(kind) => write!(f, "{:?}", kind),
            DistanceMetric::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Fraction of the positions non-zero in either vector where the two vectors disagree.
/// Two all-zero vectors are at distance 0.
pub fn jaccard(u: &[f32], v: &[f32]) -> f32 {

    let mut nonzero: u32 = 0;
    let mut unequal: u32 = 0;

    for (a, b) in u.iter().zip(v) {
        if *a != 0.0 || *b != 0.0 {
            nonzero += 1;
            if a != b {
                unequal += 1;
            }
        }
    }

    match nonzero {
        0 => 0.0,
        _ => unequal as f32 / nonzero as f32,
    }
}

/// Dice dissimilarity, treating every non-zero entry as a set bit.
pub fn dice(u: &[f32], v: &[f32]) -> f32 {

    let mut both: u32 = 0;
    let mut one: u32 = 0;

    for (a, b) in u.iter().zip(v) {
        match (*a != 0.0, *b != 0.0) {
            (true, true) => both += 1,
            (true, false) | (false, true) => one += 1,
            (false, false) => {},
        }
    }

    match 2 * both + one {
        0 => 0.0,
        denom => one as f32 / denom as f32,
    }
}

/// `1 - cos(u, v)`, clamped into `[0, 1]`. A zero vector is at distance 1 from anything.
pub fn cosine(u: &[f32], v: &[f32]) -> f32 {

    let mut dot = 0.0f64;
    let mut norm_u = 0.0f64;
    let mut norm_v = 0.0f64;

    for (a, b) in u.iter().zip(v) {
        dot += (*a as f64) * (*b as f64);
        norm_u += (*a as f64) * (*a as f64);
        norm_v += (*b as f64) * (*b as f64);
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return 1.0;
    }

    let dist = 1.0 - dot / (norm_u.sqrt() * norm_v.sqrt());
    return dist.clamp(0.0, 1.0) as f32;
}

/// Fraction of positions where the vectors differ.
pub fn hamming(u: &[f32], v: &[f32]) -> f32 {

    if u.is_empty() {
        return 0.0;
    }

    let unequal = u.iter().zip(v).filter(|(a, b)| a != b).count();
    return unequal as f32 / u.len() as f32;
}

#[cfg(test)]
mod tests {

    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn jaccard_on_bits() {

        let u = [1.0, 1.0, 0.0, 1.0, 0.0];
        let v = [1.0, 0.0, 0.0, 1.0, 1.0];

        // 4 positions set in either, 2 of them differ
        assert_approx_eq!(jaccard(&u, &v), 0.5);
        assert_approx_eq!(jaccard(&u, &u), 0.0);
        assert_approx_eq!(jaccard(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn dice_on_bits() {

        let u = [1.0, 1.0, 0.0, 1.0, 0.0];
        let v = [1.0, 0.0, 0.0, 1.0, 1.0];

        assert_approx_eq!(dice(&u, &v), 2.0 / 6.0);
    }

    #[test]
    fn cosine_bounds() {

        assert_approx_eq!(cosine(&[1.0, 0.0], &[2.0, 0.0]), 0.0);
        assert_approx_eq!(cosine(&[1.0, 0.0], &[0.0, 3.0]), 1.0);
        assert_approx_eq!(cosine(&[0.0, 0.0], &[0.0, 3.0]), 1.0);
    }

    #[test]
    fn hamming_counts_positions() {

        assert_approx_eq!(hamming(&[1.0, 0.0, 1.0, 1.0], &[1.0, 1.0, 0.0, 1.0]), 0.5);
    }

    #[test]
    fn parse_metric_names() {

        assert_eq!("Tanimoto".parse::<MetricKind>().unwrap(), MetricKind::Jaccard);
        assert_eq!("dice".parse::<MetricKind>().unwrap(), MetricKind::Dice);
        assert!("braycurtis".parse::<MetricKind>().is_err());
    }

    #[test]
    fn custom_metric_similarity() {

        let metric = DistanceMetric::custom(|u, v| if u == v { 0.0 } else { 1.0 });

        assert_approx_eq!(metric.similarity(&[1.0], &[1.0]), 1.0);
        assert_approx_eq!(metric.similarity(&[1.0], &[0.0]), 0.0);
    }
}
