// kmeans.rs - Deterministic k-means over RGB samples.
//
// ALGORITHM
// ─────────
// 1. Degenerate case: with n ≤ k distinct points every point is its own
//    centroid, in input order. No iteration is needed.
//
// 2. Initialisation (farthest-point / maxmin):
//      c₀ = points[0]
//      cⱼ = the point whose distance to its nearest chosen centroid is
//           largest (first such point on ties)
//    This is k-means++ with the random draw replaced by an argmax, so two
//    runs over the same snapshot always start from the same centroids.
//
// 3. Lloyd iterations: assign every point to its nearest centroid, move each
//    centroid to the mean of its members, stop when the largest centroid
//    move is below `tolerance` or after `max_iterations`. A centroid whose
//    cluster empties keeps its previous position.
//
// TIE-BREAK
// ─────────
// `nearest_centroid` scans centroids in ascending index order and only
// replaces the current best on a strictly smaller distance. A point exactly
// between two centroids therefore joins the lower index. The recolor shader
// resolves equidistant palette entries the same way.
//
// Distances are squared Euclidean in raw 0–255 units; the square root is
// only taken for the convergence test.

use serde::{Deserialize, Serialize};

/// Clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmeansConfig {
    /// Target cluster count. Clamped to the palette size by the extractor.
    pub clusters: usize,
    /// Hard cap on Lloyd iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the largest centroid move (0–255 units).
    pub tolerance: f64,
}

impl Default for KmeansConfig {
    fn default() -> Self {
        KmeansConfig {
            clusters: 16,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Output of [`kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansResult {
    /// One centroid per effective cluster, `min(k, n)` entries.
    pub centroids: Vec<[f64; 3]>,
    /// Lloyd iterations actually run (0 for the degenerate case).
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap.
    pub converged: bool,
}

#[inline]
fn dist_sq(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Index of the centroid closest to `p`; lowest index on ties.
///
/// Returns 0 for an empty centroid list.
pub fn nearest_centroid(p: [f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, *c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn init_farthest_point(points: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[0]);

    // Distance from each point to its nearest chosen centroid.
    let mut nearest_d: Vec<f64> = points.iter().map(|p| dist_sq(*p, points[0])).collect();

    while centroids.len() < k {
        let mut far_idx = 0;
        let mut far_d = -1.0;
        for (i, &d) in nearest_d.iter().enumerate() {
            if d > far_d {
                far_d = d;
                far_idx = i;
            }
        }
        let c = points[far_idx];
        centroids.push(c);
        for (p, nd) in points.iter().zip(nearest_d.iter_mut()) {
            *nd = nd.min(dist_sq(*p, c));
        }
    }
    centroids
}

/// Cluster `points` into at most `config.clusters` groups.
///
/// `points` are expected to be distinct (the observed color set guarantees
/// this). An empty input yields an empty result.
pub fn kmeans(points: &[[f64; 3]], config: &KmeansConfig) -> KmeansResult {
    let k = config.clusters;
    let n = points.len();

    if n == 0 || k == 0 {
        return KmeansResult {
            centroids: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    if n <= k {
        return KmeansResult {
            centroids: points.to_vec(),
            iterations: 0,
            converged: true,
        };
    }

    let mut centroids = init_farthest_point(points, k);
    let mut iterations = 0;
    let mut converged = false;

    let mut sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0usize; k];

    while iterations < config.max_iterations {
        iterations += 1;

        sums.fill([0.0; 3]);
        counts.fill(0);
        for p in points {
            let c = nearest_centroid(*p, &centroids);
            counts[c] += 1;
            for ch in 0..3 {
                sums[c][ch] += p[ch];
            }
        }

        let mut max_move = 0.0f64;
        for j in 0..k {
            if counts[j] == 0 {
                continue;
            }
            let inv = 1.0 / counts[j] as f64;
            let next = [sums[j][0] * inv, sums[j][1] * inv, sums[j][2] * inv];
            max_move = max_move.max(dist_sq(next, centroids[j]).sqrt());
            centroids[j] = next;
        }

        if max_move < config.tolerance {
            converged = true;
            break;
        }
    }

    KmeansResult { centroids, iterations, converged }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
