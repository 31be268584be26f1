//! Principal component helpers.
//!
//! [`leading_components`] serves the t-SNE initialisation on the full
//! embedding matrix; [`reorient`] is the exact 2D re-orientation applied to the
//! t-SNE output.

use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use rand::Rng;
use rand::distributions::Standard;

const POWER_ITERATIONS: usize = 500;
const POWER_TOLERANCE: f64 = 1e-12;

/// Subtract the column means.
#[must_use]
pub fn center(data: ArrayView2<'_, f64>) -> Array2<f64> {
    let mean = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()));
    &data - &mean
}

/// Top `k` principal axes of already-centered `data` by power iteration with
/// deflation, returned as rows of a `k x d` matrix.
///
/// Start vectors come from `rng`. Axes of a rank-deficient input come back as
/// zero rows. Each axis is sign-normalised so its largest-magnitude loading is
/// positive.
pub fn leading_components<R: Rng>(
    centered: ArrayView2<'_, f64>,
    k: usize,
    rng: &mut R,
) -> Array2<f64> {
    let dim = centered.ncols();
    let mut components = Array2::<f64>::zeros((k, dim));
    for c in 0..k {
        let mut v: Array1<f64> = (0..dim)
            .map(|_| rng.sample::<f64, _>(Standard) - 0.5)
            .collect();
        orthogonalize(&mut v, components.slice(s![..c, ..]));
        if !normalize(&mut v) {
            continue;
        }
        let mut converged = false;
        for _ in 0..POWER_ITERATIONS {
            let projected = centered.dot(&v);
            let mut next = centered.t().dot(&projected);
            orthogonalize(&mut next, components.slice(s![..c, ..]));
            if !normalize(&mut next) {
                break;
            }
            let delta = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if delta < POWER_TOLERANCE {
                converged = true;
                break;
            }
        }
        // Rank-deficient: the iterate collapsed onto earlier axes.
        if centered.dot(&v).mapv(|x| x * x).sum() <= f64::EPSILON {
            continue;
        }
        if !converged {
            tracing::debug!(
                target = "pubatlas::projection",
                component = c,
                "power iteration hit its step limit"
            );
        }
        flip_sign(&mut v);
        components.row_mut(c).assign(&v);
    }
    components
}

/// Exact PCA of an `n x 2` cloud onto its own principal axes.
///
/// Returns the centered points expressed in the (major, minor) axis basis and
/// the explained variance ratio of each axis. No scaling is applied, so this
/// is a rotation and possibly a reflection of the centered input.
#[must_use]
pub fn reorient(points: ArrayView2<'_, f64>) -> (Array2<f64>, [f64; 2]) {
    debug_assert_eq!(points.ncols(), 2);
    let centered = center(points);
    let denom = (centered.nrows().max(2) - 1) as f64;
    let col0 = centered.column(0);
    let col1 = centered.column(1);
    let a = col0.dot(&col0) / denom;
    let b = col0.dot(&col1) / denom;
    let c = col1.dot(&col1) / denom;

    let half_trace = (a + c) / 2.0;
    let disc = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let major_value = half_trace + disc;
    let minor_value = (half_trace - disc).max(0.0);

    let mut major = if b.abs() > f64::EPSILON * (a.abs() + c.abs()).max(f64::MIN_POSITIVE) {
        Array1::from(vec![major_value - c, b])
    } else if a >= c {
        Array1::from(vec![1.0, 0.0])
    } else {
        Array1::from(vec![0.0, 1.0])
    };
    if !normalize(&mut major) {
        major = Array1::from(vec![1.0, 0.0]);
    }
    flip_sign(&mut major);
    let mut minor = Array1::from(vec![-major[1], major[0]]);
    flip_sign(&mut minor);

    let mut basis = Array2::<f64>::zeros((2, 2));
    basis.row_mut(0).assign(&major);
    basis.row_mut(1).assign(&minor);
    let rotated = centered.dot(&basis.t());

    let total = major_value + minor_value;
    let ratio = if total > 0.0 {
        [major_value / total, minor_value / total]
    } else {
        [0.0, 0.0]
    };
    (rotated, ratio)
}

fn orthogonalize(v: &mut Array1<f64>, basis: ArrayView2<'_, f64>) {
    for axis in basis.rows() {
        let overlap = axis.dot(&*v);
        v.scaled_add(-overlap, &axis);
    }
}

fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(&*v).sqrt();
    if norm <= 1e-300 || !norm.is_finite() {
        return false;
    }
    v.mapv_inplace(|x| x / norm);
    true
}

/// Make the first largest-magnitude entry positive.
fn flip_sign(v: &mut Array1<f64>) {
    let mut pivot = 0.0f64;
    for &value in v.iter() {
        if value.abs() > pivot.abs() {
            pivot = value;
        }
    }
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
