//! t-distributed stochastic neighbour embedding into two dimensions.
//!
//! Affinities come from a per-point binary search on the Gaussian precision
//! that matches the target perplexity. The 2D layout is then fitted by
//! gradient descent on the KL divergence between the input affinities and a
//! Student-t kernel, in two phases: an exaggerated exploration phase with low
//! momentum, then the main phase. Every random draw comes from a `Pcg64`
//! seeded by the caller, so equal inputs and seeds give equal outputs.
//!
//! Two gradient methods share the descent loop. Barnes-Hut keeps only the
//! `3 * perplexity` nearest neighbours of each point and approximates the
//! repulsion with a quadtree. Exact keeps one dense `n x n` affinity matrix.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::distributions::Standard;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;

use super::pca;
use super::quadtree::QuadTree;
use crate::constants::{
    PERPLEXITY_SEARCH_STEPS, PERPLEXITY_TOLERANCE, TSNE_EXPLORATION_ITERATIONS, TSNE_INIT_SCALE,
    TSNE_MAX_ITER_WITHOUT_PROGRESS, TSNE_MIN_GAIN, TSNE_MIN_GRAD_NORM,
};
use crate::types::{TsneInit, TsneMethod, TsneOptions};
use crate::{AtlasError, Result};

const OUTPUT_DIMS: usize = 2;
const CHECK_EVERY: usize = 50;
const EXPLORATION_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
/// Floor on sums that would otherwise divide by zero.
const SUM_FLOOR: f64 = 1e-8;

/// Result of a t-SNE fit.
#[derive(Debug, Clone)]
pub struct TsneFit {
    /// `n x 2` coordinates.
    pub embedding: Array2<f64>,
    pub kl_divergence: f64,
    /// Gradient steps actually taken across both phases.
    pub iterations: usize,
    pub perplexity: f64,
    pub learning_rate: f64,
    pub method: TsneMethod,
}

pub struct Tsne<'a> {
    options: &'a TsneOptions,
    seed: u64,
}

impl<'a> Tsne<'a> {
    #[must_use]
    pub fn new(options: &'a TsneOptions, seed: u64) -> Self {
        Self { options, seed }
    }

    /// Fit an `n x d` matrix. Needs `n >= 2`.
    pub fn fit(&self, data: ArrayView2<'_, f64>) -> Result<TsneFit> {
        let n = data.nrows();
        if n < 2 {
            return Err(AtlasError::InsufficientData { min: 2, got: n });
        }
        let mut rng = Pcg64::seed_from_u64(self.seed);

        let perplexity = self.options.perplexity.min((n - 1) as f64).max(1.0);
        if perplexity < self.options.perplexity {
            tracing::debug!(
                target = "pubatlas::projection",
                requested = self.options.perplexity,
                effective = perplexity,
                "perplexity clamped to corpus size"
            );
        }

        let learning_rate = self
            .options
            .learning_rate
            .unwrap_or_else(|| (n as f64 / self.options.early_exaggeration / 4.0).max(50.0));

        let method = self.options.method;
        let (y, outcome) = match method {
            TsneMethod::Exact => {
                let mut objective = ExactObjective::new(n, exact_affinities(data, perplexity));
                let mut y = self.initial_layout(data, &mut rng);
                let outcome = self.descend(&mut objective, &mut y, learning_rate);
                (y, outcome)
            }
            TsneMethod::BarnesHut => {
                let mut objective = BarnesHutObjective {
                    p: sparse_affinities(data, perplexity),
                    angle: self.options.angle,
                };
                let mut y = self.initial_layout(data, &mut rng);
                let outcome = self.descend(&mut objective, &mut y, learning_rate);
                (y, outcome)
            }
        };

        if y.iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::Projection {
                reason: "t-SNE produced non-finite coordinates".into(),
            });
        }
        Ok(TsneFit {
            embedding: y,
            kl_divergence: outcome.error,
            iterations: outcome.last_iteration + 1,
            perplexity,
            learning_rate,
            method,
        })
    }

    /// Exploration with exaggerated affinities, then the main phase.
    fn descend<O: Objective>(
        &self,
        objective: &mut O,
        y: &mut Array2<f64>,
        learning_rate: f64,
    ) -> PhaseOutcome {
        let exaggeration = self.options.early_exaggeration;
        objective.scale_affinities(exaggeration);
        let exploration = Phase {
            start: 0,
            end: TSNE_EXPLORATION_ITERATIONS.min(self.options.iterations),
            momentum: EXPLORATION_MOMENTUM,
            learning_rate,
            max_without_progress: TSNE_EXPLORATION_ITERATIONS,
        };
        let explored = exploration.run(objective, y);
        objective.scale_affinities(1.0 / exaggeration);
        tracing::debug!(
            target = "pubatlas::projection",
            kl = explored.error,
            iterations = explored.last_iteration + 1,
            "t-SNE exploration finished"
        );

        if explored.last_iteration + 1 >= self.options.iterations {
            return explored;
        }
        let main = Phase {
            start: explored.last_iteration + 1,
            end: self.options.iterations,
            momentum: FINAL_MOMENTUM,
            learning_rate,
            max_without_progress: TSNE_MAX_ITER_WITHOUT_PROGRESS,
        };
        main.run(objective, y)
    }

    fn initial_layout(&self, data: ArrayView2<'_, f64>, rng: &mut Pcg64) -> Array2<f64> {
        if self.options.init == TsneInit::Pca {
            let centered = pca::center(data);
            let components = pca::leading_components(centered.view(), OUTPUT_DIMS, rng);
            let scores = centered.dot(&components.t());
            let std = scores.column(0).std(0.0);
            if std > 0.0 && std.is_finite() {
                return scores.mapv(|v| v / std * TSNE_INIT_SCALE);
            }
            tracing::debug!(
                target = "pubatlas::projection",
                "embeddings have no spread, falling back to random init"
            );
        }
        let n = data.nrows();
        Array2::from_shape_fn((n, OUTPUT_DIMS), |_| standard_normal(rng) * TSNE_INIT_SCALE)
    }
}

/// Box-Muller draw from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.sample(Standard);
    let u2: f64 = rng.sample(Standard);
    let radius = (-2.0 * (1.0 - u1).ln()).sqrt();
    radius * (2.0 * std::f64::consts::PI * u2).cos()
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Turn one row of squared distances into a conditional distribution whose
/// perplexity is `exp(target_entropy)`, in place. Entry `skip` (the point
/// itself) gets probability zero.
fn conditional_row(row: &mut [f64], skip: Option<usize>, target_entropy: f64) {
    let nearest = row
        .iter()
        .enumerate()
        .filter(|(j, _)| Some(*j) != skip)
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);
    if !nearest.is_finite() {
        row.fill(0.0);
        return;
    }
    // Shifting by the nearest distance leaves the normalised row and its
    // entropy unchanged but keeps exp() away from underflow.
    let shifted: Vec<f64> = row.iter().map(|d| d - nearest).collect();

    let mut beta = 1.0f64;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    for _ in 0..PERPLEXITY_SEARCH_STEPS {
        let mut sum = 0.0;
        for (j, (p, d)) in row.iter_mut().zip(&shifted).enumerate() {
            *p = if Some(j) == skip { 0.0 } else { (-d * beta).exp() };
            sum += *p;
        }
        if sum == 0.0 {
            sum = SUM_FLOOR;
        }
        let mut weighted = 0.0;
        for (p, d) in row.iter_mut().zip(&shifted) {
            *p /= sum;
            weighted += d * *p;
        }
        let entropy = sum.ln() + beta * weighted;
        let diff = entropy - target_entropy;
        if diff.abs() <= PERPLEXITY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }
}

/// Dense joint affinities, row-major `n x n`, built in a single buffer.
///
/// Off-diagonal entries are floored at `f64::EPSILON`; the diagonal is zero.
fn exact_affinities(data: ArrayView2<'_, f64>, perplexity: f64) -> Vec<f64> {
    let n = data.nrows();
    let target_entropy = perplexity.ln();
    let mut p = vec![0.0f64; n * n];
    p.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        let xi = data.row(i);
        for (j, d) in row.iter_mut().enumerate() {
            *d = squared_distance(xi, data.row(j));
        }
        conditional_row(row, Some(i), target_entropy);
    });

    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let joint = p[i * n + j] + p[j * n + i];
            p[i * n + j] = joint;
            p[j * n + i] = joint;
            total += 2.0 * joint;
        }
    }
    let total = total.max(f64::EPSILON);
    p.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, v) in row.iter_mut().enumerate() {
            *v = if i == j {
                0.0
            } else {
                (*v / total).max(f64::EPSILON)
            };
        }
    });
    p
}

/// Nearest first; ties go to the lower index so neighbour sets are stable.
fn by_distance(a: &(usize, f64), b: &(usize, f64)) -> std::cmp::Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

/// Symmetric sparse joint affinities: for each point, `(neighbour, p_ij)`
/// sorted by neighbour. Entries sum to one over the whole matrix.
fn sparse_affinities(data: ArrayView2<'_, f64>, perplexity: f64) -> Vec<Vec<(usize, f64)>> {
    let n = data.nrows();
    let k = ((3.0 * perplexity + 1.0) as usize).clamp(1, n - 1);
    let target_entropy = perplexity.ln();

    let conditional: Vec<Vec<(usize, f64)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let xi = data.row(i);
            let mut neighbours: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, squared_distance(xi, data.row(j))))
                .collect();
            if k < neighbours.len() {
                neighbours.select_nth_unstable_by(k - 1, by_distance);
                neighbours.truncate(k);
            }
            neighbours.sort_unstable_by(by_distance);
            let mut row: Vec<f64> = neighbours.iter().map(|(_, d)| *d).collect();
            conditional_row(&mut row, None, target_entropy);
            neighbours
                .into_iter()
                .zip(row)
                .map(|((j, _), p)| (j, p))
                .collect()
        })
        .collect();

    let mut joint: Vec<Vec<(usize, f64)>> = vec![Vec::with_capacity(2 * k); n];
    for (i, row) in conditional.into_iter().enumerate() {
        for (j, p) in row {
            joint[i].push((j, p));
            joint[j].push((i, p));
        }
    }
    joint.par_iter_mut().for_each(|row| {
        row.sort_unstable_by_key(|entry| entry.0);
        row.dedup_by(|later, kept| {
            if later.0 == kept.0 {
                kept.1 += later.1;
                true
            } else {
                false
            }
        });
    });
    let total = joint
        .iter()
        .map(|row| row.iter().map(|(_, p)| p).sum::<f64>())
        .sum::<f64>()
        .max(f64::EPSILON);
    joint.par_iter_mut().for_each(|row| {
        for entry in row.iter_mut() {
            entry.1 /= total;
        }
    });
    tracing::debug!(
        target = "pubatlas::projection",
        points = n,
        neighbours = k,
        "sparse affinities built"
    );
    joint
}

/// KL divergence objective over a fixed set of input affinities.
trait Objective {
    /// Write the gradient at `y` into `grad` and return the KL divergence.
    fn evaluate(&self, y: &Array2<f64>, grad: &mut Array2<f64>) -> f64;

    fn scale_affinities(&mut self, factor: f64);
}

/// Dense affinities with the Student-t kernel evaluated on the fly.
struct ExactObjective {
    n: usize,
    p: Vec<f64>,
}

impl ExactObjective {
    fn new(n: usize, p: Vec<f64>) -> Self {
        Self { n, p }
    }
}

/// Student-t kernel with one degree of freedom.
fn kernel(y: &Array2<f64>, i: usize, j: usize) -> f64 {
    let dx = y[[i, 0]] - y[[j, 0]];
    let dy = y[[i, 1]] - y[[j, 1]];
    1.0 / (1.0 + dx * dx + dy * dy)
}

impl Objective for ExactObjective {
    fn evaluate(&self, y: &Array2<f64>, grad: &mut Array2<f64>) -> f64 {
        let n = self.n;
        let row_sums: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).filter(|&j| j != i).map(|j| kernel(y, i, j)).sum())
            .collect();
        let kernel_sum = row_sums.iter().sum::<f64>().max(f64::EPSILON);

        let rows: Vec<(f64, [f64; 2])> = (0..n)
            .into_par_iter()
            .map(|i| {
                let p_row = &self.p[i * n..(i + 1) * n];
                let mut error = 0.0;
                let mut force = [0.0f64; 2];
                for (j, &pij) in p_row.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let w = kernel(y, i, j);
                    let q = (w / kernel_sum).max(f64::EPSILON);
                    error += pij * (pij.max(f64::EPSILON) / q).ln();
                    let pull = (pij - q) * w;
                    force[0] += pull * (y[[i, 0]] - y[[j, 0]]);
                    force[1] += pull * (y[[i, 1]] - y[[j, 1]]);
                }
                (error, force)
            })
            .collect();

        for (i, (_, force)) in rows.iter().enumerate() {
            grad[[i, 0]] = 4.0 * force[0];
            grad[[i, 1]] = 4.0 * force[1];
        }
        rows.iter().map(|(e, _)| *e).sum()
    }

    fn scale_affinities(&mut self, factor: f64) {
        self.p.par_iter_mut().for_each(|v| *v *= factor);
    }
}

/// Sparse affinities for attraction, quadtree summaries for repulsion.
struct BarnesHutObjective {
    p: Vec<Vec<(usize, f64)>>,
    angle: f64,
}

impl Objective for BarnesHutObjective {
    fn evaluate(&self, y: &Array2<f64>, grad: &mut Array2<f64>) -> f64 {
        let n = y.nrows();
        let tree = QuadTree::build(y.view());
        let repulsion: Vec<([f64; 2], f64)> = (0..n)
            .into_par_iter()
            .map(|i| tree.repulsion(i, self.angle))
            .collect();
        let kernel_sum = repulsion
            .iter()
            .map(|(_, z)| z)
            .sum::<f64>()
            .max(f64::EPSILON);

        let attraction: Vec<(f64, [f64; 2])> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut error = 0.0;
                let mut force = [0.0f64; 2];
                for &(j, pij) in &self.p[i] {
                    let dx = y[[i, 0]] - y[[j, 0]];
                    let dy = y[[i, 1]] - y[[j, 1]];
                    let w = 1.0 / (1.0 + dx * dx + dy * dy);
                    let q = (w / kernel_sum).max(f64::EPSILON);
                    error += pij * (pij.max(f64::EPSILON) / q).ln();
                    force[0] += pij * w * dx;
                    force[1] += pij * w * dy;
                }
                (error, force)
            })
            .collect();

        for i in 0..n {
            let pull = attraction[i].1;
            let push = repulsion[i].0;
            grad[[i, 0]] = 4.0 * (pull[0] - push[0] / kernel_sum);
            grad[[i, 1]] = 4.0 * (pull[1] - push[1] / kernel_sum);
        }
        attraction.iter().map(|(e, _)| *e).sum()
    }

    fn scale_affinities(&mut self, factor: f64) {
        self.p.par_iter_mut().for_each(|row| {
            for entry in row.iter_mut() {
                entry.1 *= factor;
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct PhaseOutcome {
    error: f64,
    last_iteration: usize,
}

/// One gradient descent phase with momentum and per-coordinate gains.
struct Phase {
    start: usize,
    end: usize,
    momentum: f64,
    learning_rate: f64,
    max_without_progress: usize,
}

impl Phase {
    fn run<O: Objective>(&self, objective: &O, y: &mut Array2<f64>) -> PhaseOutcome {
        let mut update = Array2::<f64>::zeros(y.raw_dim());
        let mut gains = Array2::<f64>::ones(y.raw_dim());
        let mut grad = Array2::<f64>::zeros(y.raw_dim());
        let mut best_error = f64::INFINITY;
        let mut best_iteration = self.start;
        let mut outcome = PhaseOutcome {
            error: f64::INFINITY,
            last_iteration: self.start,
        };

        for iteration in self.start..self.end {
            let error = objective.evaluate(y, &mut grad);
            let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            outcome = PhaseOutcome {
                error,
                last_iteration: iteration,
            };

            ndarray::Zip::from(&mut gains)
                .and(&update)
                .and(&grad)
                .for_each(|gain, &u, &g| {
                    let next = if u * g < 0.0 { *gain + 0.2 } else { *gain * 0.8 };
                    *gain = next.max(TSNE_MIN_GAIN);
                });
            grad *= &gains;
            update.mapv_inplace(|u| u * self.momentum);
            update.scaled_add(-self.learning_rate, &grad);
            *y += &update;

            if (iteration + 1) % CHECK_EVERY == 0 {
                if error < best_error {
                    best_error = error;
                    best_iteration = iteration;
                } else if iteration - best_iteration > self.max_without_progress {
                    tracing::debug!(
                        target = "pubatlas::projection",
                        iteration,
                        "t-SNE stopped without progress"
                    );
                    break;
                }
                if grad_norm <= TSNE_MIN_GRAD_NORM {
                    tracing::debug!(
                        target = "pubatlas::projection",
                        iteration,
                        grad_norm,
                        "t-SNE converged"
                    );
                    break;
                }
            }
        }
        outcome
    }
}
