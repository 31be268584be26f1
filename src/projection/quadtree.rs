//! Point-region quadtree over a 2D layout.
//!
//! Every cell tracks how many points it holds and their centre of mass, so a
//! distant cell can stand in for all of its points when summing t-SNE
//! repulsion (the Barnes-Hut approximation).

use ndarray::ArrayView2;

/// Cells deeper than this keep distinct points together instead of splitting.
const MAX_DEPTH: usize = 48;

#[derive(Debug, Clone)]
struct Cell {
    center: [f64; 2],
    half_width: f64,
    count: usize,
    mass_center: [f64; 2],
    first_child: Option<usize>,
    /// Representative point of a leaf.
    point: Option<usize>,
}

impl Cell {
    fn empty(center: [f64; 2], half_width: f64) -> Self {
        Self {
            center,
            half_width,
            count: 0,
            mass_center: center,
            first_child: None,
            point: None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QuadTree {
    cells: Vec<Cell>,
    points: Vec<[f64; 2]>,
    /// Leaf cell holding each point.
    leaf_of: Vec<usize>,
}

impl QuadTree {
    /// Build over the rows of an `n x 2` layout.
    pub(crate) fn build(layout: ArrayView2<'_, f64>) -> Self {
        let points: Vec<[f64; 2]> = layout.rows().into_iter().map(|r| [r[0], r[1]]).collect();
        let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
        for p in &points {
            for d in 0..2 {
                lo[d] = lo[d].min(p[d]);
                hi[d] = hi[d].max(p[d]);
            }
        }
        let (center, half_width) = if points.is_empty() {
            ([0.0, 0.0], 1.0)
        } else {
            let extent = (hi[0] - lo[0]).max(hi[1] - lo[1]);
            let center = [(lo[0] + hi[0]) / 2.0, (lo[1] + hi[1]) / 2.0];
            // Slightly oversized so points on the max edge stay inside.
            (center, extent / 2.0 * (1.0 + 1e-3) + 1e-12)
        };

        let mut tree = Self {
            cells: vec![Cell::empty(center, half_width)],
            leaf_of: vec![0; points.len()],
            points,
        };
        for index in 0..tree.points.len() {
            tree.insert(index);
        }
        for index in 0..tree.points.len() {
            tree.leaf_of[index] = tree.descend(tree.points[index]);
        }
        tree
    }

    /// Leaf reached by following `p`'s quadrants from the root.
    fn descend(&self, p: [f64; 2]) -> usize {
        let mut cell = 0;
        while let Some(first) = self.cells[cell].first_child {
            cell = first + quadrant(self.cells[cell].center, p);
        }
        cell
    }

    fn insert(&mut self, index: usize) {
        let p = self.points[index];
        let mut cell = 0;
        let mut depth = 0;
        loop {
            let (first_child, resident, center, count) = {
                let c = &self.cells[cell];
                (c.first_child, c.point, c.center, c.count)
            };
            if let Some(first) = first_child {
                self.absorb(cell, p);
                cell = first + quadrant(center, p);
                depth += 1;
                continue;
            }
            let Some(existing) = resident else {
                self.absorb(cell, p);
                self.cells[cell].point = Some(index);
                return;
            };
            let q = self.points[existing];
            if q == p || depth >= MAX_DEPTH {
                self.absorb(cell, p);
                return;
            }
            // Push the resident points one level down and retry this cell.
            // Below MAX_DEPTH a leaf only ever holds copies of one point.
            let first = self.split(cell);
            let child = first + quadrant(center, q);
            self.cells[child].point = Some(existing);
            self.cells[child].count = count;
            self.cells[child].mass_center = q;
            self.cells[cell].point = None;
        }
    }

    fn absorb(&mut self, cell: usize, p: [f64; 2]) {
        let c = &mut self.cells[cell];
        c.count += 1;
        let weight = 1.0 / c.count as f64;
        for d in 0..2 {
            c.mass_center[d] += (p[d] - c.mass_center[d]) * weight;
        }
    }

    fn split(&mut self, cell: usize) -> usize {
        let first = self.cells.len();
        let center = self.cells[cell].center;
        let half = self.cells[cell].half_width / 2.0;
        for q in 0..4 {
            let x = if q & 1 == 1 { center[0] + half } else { center[0] - half };
            let y = if q & 2 == 2 { center[1] + half } else { center[1] - half };
            self.cells.push(Cell::empty([x, y], half));
        }
        self.cells[cell].first_child = Some(first);
        first
    }

    /// Unnormalised repulsive force on point `index` and its share of the
    /// Student-t normaliser.
    ///
    /// A cell is summarised once its width is below `angle` times its distance;
    /// `angle == 0` visits every leaf and gives the exact sums.
    pub(crate) fn repulsion(&self, index: usize, angle: f64) -> ([f64; 2], f64) {
        let p = self.points[index];
        let own_leaf = self.leaf_of[index];
        let mut force = [0.0f64; 2];
        let mut normaliser = 0.0f64;
        let mut stack = Vec::with_capacity(64);
        stack.push(0usize);
        while let Some(cell) = stack.pop() {
            let c = &self.cells[cell];
            if c.count == 0 {
                continue;
            }
            let dx = p[0] - c.mass_center[0];
            let dy = p[1] - c.mass_center[1];
            let dist2 = dx * dx + dy * dy;
            match c.first_child {
                Some(first) if 2.0 * c.half_width >= angle * dist2.sqrt() => {
                    stack.extend(first..first + 4);
                }
                _ => {
                    let mut count = c.count as f64;
                    if cell == own_leaf {
                        count -= 1.0;
                    }
                    let w = 1.0 / (1.0 + dist2);
                    normaliser += count * w;
                    let pull = count * w * w;
                    force[0] += pull * dx;
                    force[1] += pull * dy;
                }
            }
        }
        (force, normaliser)
    }
}

fn quadrant(center: [f64; 2], p: [f64; 2]) -> usize {
    usize::from(p[0] >= center[0]) + 2 * usize::from(p[1] >= center[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn brute_force(layout: &Array2<f64>, i: usize) -> ([f64; 2], f64) {
        let mut force = [0.0; 2];
        let mut normaliser = 0.0;
        for j in 0..layout.nrows() {
            if i == j {
                continue;
            }
            let dx = layout[[i, 0]] - layout[[j, 0]];
            let dy = layout[[i, 1]] - layout[[j, 1]];
            let w = 1.0 / (1.0 + dx * dx + dy * dy);
            normaliser += w;
            force[0] += w * w * dx;
            force[1] += w * w * dy;
        }
        (force, normaliser)
    }

    fn scattered() -> Array2<f64> {
        let mut rng = fastrand::Rng::with_seed(11);
        Array2::from_shape_fn((40, 2), |_| rng.f64() * 10.0 - 5.0)
    }

    #[test]
    fn root_summarises_every_point() {
        let layout = scattered();
        let tree = QuadTree::build(layout.view());
        let root = &tree.cells[0];
        assert_eq!(root.count, 40);
        let mean_x = layout.column(0).mean().unwrap();
        let mean_y = layout.column(1).mean().unwrap();
        assert!((root.mass_center[0] - mean_x).abs() < 1e-9);
        assert!((root.mass_center[1] - mean_y).abs() < 1e-9);
    }

    #[test]
    fn zero_angle_matches_brute_force() {
        let layout = scattered();
        let tree = QuadTree::build(layout.view());
        for i in 0..layout.nrows() {
            let (force, z) = tree.repulsion(i, 0.0);
            let (expected, expected_z) = brute_force(&layout, i);
            assert!((z - expected_z).abs() < 1e-9);
            assert!((force[0] - expected[0]).abs() < 1e-9);
            assert!((force[1] - expected[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn wide_angle_stays_close() {
        let layout = scattered();
        let tree = QuadTree::build(layout.view());
        let (_, z) = tree.repulsion(0, 0.5);
        let (_, expected_z) = brute_force(&layout, 0);
        assert!((z - expected_z).abs() / expected_z < 0.05);
    }

    #[test]
    fn duplicates_share_a_leaf() {
        let layout = Array2::from_elem((500, 2), 0.25);
        let tree = QuadTree::build(layout.view());
        assert_eq!(tree.cells.len(), 1);
        // 499 other copies at distance zero, no force.
        let (force, z) = tree.repulsion(7, 0.5);
        assert_eq!(force, [0.0, 0.0]);
        assert!((z - 499.0).abs() < 1e-9);
    }

    #[test]
    fn near_duplicates_split_and_keep_self_excluded() {
        let layout = array![[0.0, 0.0], [1e-9, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let tree = QuadTree::build(layout.view());
        for i in 0..4 {
            let (_, z) = tree.repulsion(i, 0.0);
            let (_, expected_z) = brute_force(&layout, i);
            assert!((z - expected_z).abs() < 1e-9, "point {i}: {z} vs {expected_z}");
        }
    }
}
