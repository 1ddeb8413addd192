//! Two-dimensional HPD regions via kernel density contours.
//!
//! A bivariate Gaussian kernel density estimate is evaluated on a square
//! grid; the density level enclosing the requested mass is found from the
//! sorted cumulative grid density, and the level set is traced with
//! marching squares. The grid is padded with zeros, so every traced path
//! is a closed polygon.

use crate::stats::{quantile, standard_deviation};
use rustc_hash::FxHashMap;
use std::f64::consts::PI;

/// Grid points per axis.
const GRID_SIZE: usize = 50;

/// Fraction of the sample range added on each side of the grid.
const RANGE_EXTENSION: f64 = 0.1;

/// A closed contour polygon; the first point is repeated at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourPath {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl ContourPath {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Whether the point lies inside the polygon (even-odd rule).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.xs.len();
        let mut inside = false;
        let mut j = n.saturating_sub(1);
        for i in 0..n {
            let (xi, yi, xj, yj) = (self.xs[i], self.ys[i], self.xs[j], self.ys[j]);
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Returns the contour polygons of the HPD region holding `mass` of the
/// sample of points `(xs[k], ys[k])`.
///
/// Empty if the sample has fewer than two points, no spread on one of
/// the axes, or `mass` lies outside `(0, 1]`.
pub fn hpd_contours(xs: &[f64], ys: &[f64], mass: f64) -> Vec<ContourPath> {
    if xs.len() != ys.len() || xs.len() < 2 || !(mass > 0.0 && mass <= 1.0) {
        return Vec::new();
    }
    let (Some(x_axis), Some(y_axis)) = (Axis::for_sample(xs), Axis::for_sample(ys)) else {
        return Vec::new();
    };

    let density = Density::estimate(xs, ys, &x_axis, &y_axis);
    let level = density.level_for_mass(mass, x_axis.step * y_axis.step);
    trace_contours(&density, &x_axis, &y_axis, level)
}

/// Grid axis with the kernel bandwidth of its coordinate.
struct Axis {
    origin: f64,
    step: f64,
    bandwidth: f64,
}

impl Axis {
    fn for_sample(values: &[f64]) -> Option<Self> {
        let (lo, hi) = super::range(values)?;
        let bandwidth = normal_reference_bandwidth(values);
        if hi <= lo || bandwidth <= 0.0 {
            return None;
        }
        let extension = (hi - lo) * RANGE_EXTENSION;
        let origin = lo - extension;
        let step = (hi - lo + 2.0 * extension) / (GRID_SIZE - 1) as f64;
        Some(Axis {
            origin,
            step,
            bandwidth,
        })
    }

    /// Coordinate of grid point `i`; negative and overflowing indices
    /// address the zero padding.
    fn coordinate(&self, i: isize) -> f64 {
        self.origin + i as f64 * self.step
    }
}

/// Kernel standard deviation from the normal reference rule
/// `1.06 * min(sd, IQR / 1.34) * n^(-1/5)`.
fn normal_reference_bandwidth(values: &[f64]) -> f64 {
    let sd = standard_deviation(values);
    let iqr = match (quantile(values, 0.75), quantile(values, 0.25)) {
        (Some(upper), Some(lower)) => upper - lower,
        _ => 0.0,
    };
    let spread = if iqr > 0.0 { sd.min(iqr / 1.34) } else { sd };
    1.06 * spread * (values.len() as f64).powf(-0.2)
}

/// Density values on the grid, row-major by x.
struct Density {
    z: Vec<f64>,
}

impl Density {
    fn estimate(xs: &[f64], ys: &[f64], x_axis: &Axis, y_axis: &Axis) -> Self {
        let kernel = |axis: &Axis, i: usize, v: f64| {
            let u = (axis.coordinate(i as isize) - v) / axis.bandwidth;
            (-0.5 * u * u).exp() / ((2.0 * PI).sqrt() * axis.bandwidth)
        };
        let n = xs.len() as f64;
        // Kernel weights per grid line, shared by all cells
        let wx: Vec<Vec<f64>> = (0..GRID_SIZE)
            .map(|i| xs.iter().map(|&x| kernel(x_axis, i, x)).collect())
            .collect();
        let wy: Vec<Vec<f64>> = (0..GRID_SIZE)
            .map(|j| ys.iter().map(|&y| kernel(y_axis, j, y)).collect())
            .collect();

        let mut z = vec![0.0; GRID_SIZE * GRID_SIZE];
        for i in 0..GRID_SIZE {
            for j in 0..GRID_SIZE {
                let sum: f64 = wx[i].iter().zip(&wy[j]).map(|(a, b)| a * b).sum();
                z[i * GRID_SIZE + j] = sum / n;
            }
        }
        Density { z }
    }

    /// Value at a padded grid position; zero outside the grid.
    fn at(&self, i: isize, j: isize) -> f64 {
        if i < 0 || j < 0 || i >= GRID_SIZE as isize || j >= GRID_SIZE as isize {
            0.0
        } else {
            self.z[i as usize * GRID_SIZE + j as usize]
        }
    }

    /// Density level whose super-level set holds `mass`, interpolated
    /// linearly on the cumulative sorted density.
    fn level_for_mass(&self, mass: f64, cell_area: f64) -> f64 {
        let mut sorted = self.z.clone();
        sorted.sort_by(f64::total_cmp);
        let mut cumulative = Vec::with_capacity(sorted.len());
        let mut acc = 0.0;
        for &value in &sorted {
            acc += value * cell_area;
            cumulative.push(acc);
        }

        let target = 1.0 - mass;
        if target <= cumulative[0] {
            return sorted[0];
        }
        for k in 1..cumulative.len() {
            if cumulative[k] >= target {
                let (c0, c1) = (cumulative[k - 1], cumulative[k]);
                let t = if c1 > c0 { (target - c0) / (c1 - c0) } else { 0.0 };
                return sorted[k - 1] + t * (sorted[k] - sorted[k - 1]);
            }
        }
        sorted[sorted.len() - 1]
    }
}

// =#========================================================================#=
// MARCHING SQUARES
// =#========================================================================#=
/// Grid edge carrying a contour point: `(vertical, i, j)` where a
/// horizontal edge joins `(i, j)`-`(i+1, j)` and a vertical one
/// joins `(i, j)`-`(i, j+1)`.
type EdgeId = (bool, isize, isize);

fn trace_contours(density: &Density, x_axis: &Axis, y_axis: &Axis, level: f64) -> Vec<ContourPath> {
    let mut neighbours: FxHashMap<EdgeId, Vec<EdgeId>> = FxHashMap::default();
    let mut connect = |a: EdgeId, b: EdgeId| {
        neighbours.entry(a).or_default().push(b);
        neighbours.entry(b).or_default().push(a);
    };

    let last = GRID_SIZE as isize;
    for i in -1..last {
        for j in -1..last {
            let corners = [
                density.at(i, j),
                density.at(i + 1, j),
                density.at(i + 1, j + 1),
                density.at(i, j + 1),
            ];
            let inside = corners.map(|v| v > level);
            let bottom = (false, i, j);
            let right = (true, i + 1, j);
            let top = (false, i, j + 1);
            let left = (true, i, j);

            let case = inside
                .iter()
                .enumerate()
                .fold(0u8, |acc, (k, &b)| acc | ((b as u8) << k));
            match case {
                0 | 15 => {}
                5 | 10 => {
                    let centre_inside = corners.iter().sum::<f64>() / 4.0 > level;
                    if (case == 5) == centre_inside {
                        connect(bottom, right);
                        connect(top, left);
                    } else {
                        connect(left, bottom);
                        connect(right, top);
                    }
                }
                _ => {
                    let edges = [
                        (bottom, inside[0] != inside[1]),
                        (right, inside[1] != inside[2]),
                        (top, inside[3] != inside[2]),
                        (left, inside[0] != inside[3]),
                    ];
                    let mut crossing = edges.iter().filter(|(_, c)| *c).map(|(e, _)| *e);
                    if let (Some(a), Some(b)) = (crossing.next(), crossing.next()) {
                        connect(a, b);
                    }
                }
            }
        }
    }

    let point = |(vertical, i, j): EdgeId| -> (f64, f64) {
        let (i2, j2) = if vertical { (i, j + 1) } else { (i + 1, j) };
        let (a, b) = (density.at(i, j), density.at(i2, j2));
        let t = if b != a { (level - a) / (b - a) } else { 0.5 };
        let x = x_axis.coordinate(i) + t * (x_axis.coordinate(i2) - x_axis.coordinate(i));
        let y = y_axis.coordinate(j) + t * (y_axis.coordinate(j2) - y_axis.coordinate(j));
        (x, y)
    };

    let mut starts: Vec<EdgeId> = neighbours.keys().copied().collect();
    starts.sort_unstable();
    let mut visited: rustc_hash::FxHashSet<EdgeId> = Default::default();
    let mut paths = Vec::new();
    for start in starts {
        if !visited.insert(start) {
            continue;
        }
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let (x, y) = point(start);
        xs.push(x);
        ys.push(y);

        let mut current = start;
        loop {
            let next = neighbours[&current]
                .iter()
                .copied()
                .find(|e| !visited.contains(e));
            match next {
                Some(edge) => {
                    visited.insert(edge);
                    let (x, y) = point(edge);
                    xs.push(x);
                    ys.push(y);
                    current = edge;
                }
                None => break,
            }
        }
        xs.push(xs[0]);
        ys.push(ys[0]);
        paths.push(ContourPath { xs, ys });
    }
    paths
}
