use std::collections::HashSet;

use crate::error::StyleError;

pub(crate) struct KMeansConfig {
    pub(crate) k: usize,
    pub(crate) max_iter: usize,
    pub(crate) epsilon: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct Clusters {
    pub(crate) centers: Vec<[f32; 3]>,
    pub(crate) counts: Vec<usize>,
}

impl Clusters {
    /// Center of the most populated cluster.
    pub(crate) fn largest(&self) -> Option<[f32; 3]> {
        self.counts
            .iter()
            .enumerate()
            .max_by_key(|(idx, count)| (**count, std::cmp::Reverse(*idx)))
            .map(|(idx, _)| self.centers[idx])
    }
}

pub(crate) fn distinct_colors(pixels: &[[u8; 3]], limit: usize) -> usize {
    let mut seen = HashSet::new();
    for pixel in pixels {
        seen.insert(*pixel);
        if seen.len() >= limit {
            break;
        }
    }
    seen.len()
}

/// Lloyd's k-means in RGB space with max-min seeding, so the result only
/// depends on the input order.
pub(crate) fn kmeans(pixels: &[[u8; 3]], config: &KMeansConfig) -> Result<Clusters, StyleError> {
    let k = config.k;
    if k == 0 {
        return Err(StyleError::ClusteringFailure("k must be positive".to_string()));
    }
    if pixels.len() < k {
        return Err(StyleError::ClusteringFailure(format!(
            "{} pixels for {} clusters",
            pixels.len(),
            k
        )));
    }
    if distinct_colors(pixels, k) < k {
        return Err(StyleError::ClusteringFailure(format!(
            "fewer than {} distinct colors",
            k
        )));
    }

    let samples: Vec<[f32; 3]> = pixels
        .iter()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();
    let mut centers = seed_centers(&samples, k);
    let mut labels = vec![0usize; samples.len()];

    for _ in 0..config.max_iter.max(1) {
        for (label, sample) in labels.iter_mut().zip(&samples) {
            *label = nearest(&centers, sample);
        }
        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (label, sample) in labels.iter().zip(&samples) {
            counts[*label] += 1;
            for c in 0..3 {
                sums[*label][c] += sample[c] as f64;
            }
        }
        let mut shift = 0f32;
        for idx in 0..k {
            if counts[idx] == 0 {
                continue;
            }
            let n = counts[idx] as f64;
            let updated = [
                (sums[idx][0] / n) as f32,
                (sums[idx][1] / n) as f32,
                (sums[idx][2] / n) as f32,
            ];
            shift = shift.max(distance(&centers[idx], &updated));
            centers[idx] = updated;
        }
        if shift <= config.epsilon {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for sample in &samples {
        counts[nearest(&centers, sample)] += 1;
    }
    let usable = counts.iter().filter(|count| **count > 0).count();
    if usable < k {
        return Err(StyleError::ClusteringFailure(format!(
            "only {} of {} clusters populated",
            usable, k
        )));
    }
    Ok(Clusters { centers, counts })
}

fn seed_centers(samples: &[[f32; 3]], k: usize) -> Vec<[f32; 3]> {
    let mut mean = [0f64; 3];
    for sample in samples {
        for c in 0..3 {
            mean[c] += sample[c] as f64;
        }
    }
    let n = samples.len().max(1) as f64;
    let mean = [
        (mean[0] / n) as f32,
        (mean[1] / n) as f32,
        (mean[2] / n) as f32,
    ];

    let mut centers = vec![farthest_from(samples, |sample| distance(sample, &mean))];
    while centers.len() < k {
        let next = farthest_from(samples, |sample| {
            centers
                .iter()
                .map(|center| distance(sample, center))
                .fold(f32::INFINITY, f32::min)
        });
        centers.push(next);
    }
    centers
}

fn farthest_from<F>(samples: &[[f32; 3]], score: F) -> [f32; 3]
where
    F: Fn(&[f32; 3]) -> f32,
{
    let mut best = samples[0];
    let mut best_score = f32::NEG_INFINITY;
    for sample in samples {
        let value = score(sample);
        if value > best_score {
            best_score = value;
            best = *sample;
        }
    }
    best
}

fn nearest(centers: &[[f32; 3]], sample: &[f32; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (idx, center) in centers.iter().enumerate() {
        let d = distance(center, sample);
        if d < best_distance {
            best_distance = d;
            best = idx;
        }
    }
    best
}

pub(crate) fn distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    (dr * dr + dg * dg + db * db).sqrt()
}
