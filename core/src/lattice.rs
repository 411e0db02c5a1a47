//! Cut lattice generation: wavy cut lines, their intersections as shared piece corners,
//! and one oriented waypoint per internal edge.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;
use crate::point::Point;
use crate::rng::{mix_seed, rand_range, rand_signed, rand_unit};
use crate::rules::ShapeSettings;

const STREAM_VERTICAL_CUTS: u32 = 0x0C07_0001;
const STREAM_HORIZONTAL_CUTS: u32 = 0x0C07_0002;
const STREAM_EDGES: u32 = 0x0ED6_E5ED;
const PARALLEL_EPS: f32 = 1e-6;
const SEGMENT_EPS: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrientation {
    /// Bulges toward the higher row (horizontal edges) or higher column (vertical edges).
    Knob,
    Dent,
}

impl EdgeOrientation {
    pub fn sign(self) -> f32 {
        match self {
            EdgeOrientation::Knob => 1.0,
            EdgeOrientation::Dent => -1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeWaypoint {
    pub point: Point,
    pub orientation: EdgeOrientation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeRequest {
    pub rows: u32,
    pub cols: u32,
    pub image_width: f32,
    pub image_height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl LatticeRequest {
    /// Derives the absolute depth range from the settings' ratios of the smaller ideal
    /// piece side.
    pub fn from_settings(
        rows: u32,
        cols: u32,
        image_width: f32,
        image_height: f32,
        settings: &ShapeSettings,
    ) -> Self {
        let settings = settings.sanitized();
        let piece_min = (image_width / cols.max(1) as f32).min(image_height / rows.max(1) as f32);
        Self {
            rows,
            cols,
            image_width,
            image_height,
            min_depth: piece_min * settings.min_depth_ratio,
            max_depth: piece_min * settings.max_depth_ratio,
        }
    }

    pub fn piece_width(&self) -> f32 {
        self.image_width / self.cols as f32
    }

    pub fn piece_height(&self) -> f32 {
        self.image_height / self.rows as f32
    }

    fn validate(&self) -> Result<(), GenerationError> {
        if self.rows < 2 || self.cols < 2 {
            return Err(GenerationError::GridTooSmall {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let dims_ok = self.image_width.is_finite()
            && self.image_height.is_finite()
            && self.image_width > 0.0
            && self.image_height > 0.0;
        if !dims_ok {
            return Err(GenerationError::InvalidImage {
                width: self.image_width,
                height: self.image_height,
            });
        }
        let depth_ok = self.min_depth.is_finite()
            && self.max_depth.is_finite()
            && self.min_depth >= 0.0
            && self.max_depth >= self.min_depth;
        if !depth_ok {
            return Err(GenerationError::InvalidDepthRange {
                min: self.min_depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lattice {
    pub rows: u32,
    pub cols: u32,
    pub corners: Vec<Vec<Point>>,
    /// `[rows - 1][cols]`: entry `[r][c]` sits on the cut between rows `r` and `r + 1`.
    pub horizontal: Vec<Vec<EdgeWaypoint>>,
    /// `[rows][cols - 1]`: entry `[r][c]` sits on the cut between columns `c` and `c + 1`.
    pub vertical: Vec<Vec<EdgeWaypoint>>,
}

impl Lattice {
    pub fn corner(&self, row: u32, col: u32) -> Point {
        self.corners[row as usize][col as usize]
    }

    pub fn internal_edge_count(&self) -> usize {
        self.horizontal.iter().map(Vec::len).sum::<usize>()
            + self.vertical.iter().map(Vec::len).sum::<usize>()
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeWaypoint> {
        self.horizontal.iter().flatten().chain(self.vertical.iter().flatten())
    }

    pub fn orientation_counts(&self) -> (usize, usize) {
        self.edges().fold((0, 0), |(knobs, dents), edge| match edge.orientation {
            EdgeOrientation::Knob => (knobs + 1, dents),
            EdgeOrientation::Dent => (knobs, dents + 1),
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct CutLine {
    start: Point,
    end: Point,
}

fn line_intersection(a: &CutLine, b: &CutLine) -> Option<Point> {
    let (x1, y1) = (a.start.x, a.start.y);
    let (x2, y2) = (a.end.x, a.end.y);
    let (x3, y3) = (b.start.x, b.start.y);
    let (x4, y4) = (b.end.x, b.end.y);
    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < PARALLEL_EPS {
        return None;
    }
    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
    let point = a.start.lerp(a.end, t);
    point.is_finite().then_some(point)
}

/// Hands out orientations so that exactly half of all edges (rounded down) are knobs.
/// Each draw is biased by how many knobs are still owed relative to the edges left.
struct OrientationBalancer {
    remaining: u32,
    knobs_needed: u32,
}

impl OrientationBalancer {
    fn new(total: u32) -> Self {
        Self {
            remaining: total,
            knobs_needed: total / 2,
        }
    }

    fn next(&mut self, roll: f32) -> EdgeOrientation {
        if self.remaining == 0 {
            return EdgeOrientation::Dent;
        }
        let chance = self.knobs_needed as f32 / self.remaining as f32;
        self.remaining -= 1;
        if self.knobs_needed > 0 && (roll < chance || self.knobs_needed > self.remaining) {
            self.knobs_needed -= 1;
            EdgeOrientation::Knob
        } else {
            EdgeOrientation::Dent
        }
    }
}

#[derive(Clone, Copy)]
enum EdgeAxis {
    Horizontal,
    Vertical,
}

struct WaypointPlacer<'a> {
    seed: u32,
    request: &'a LatticeRequest,
    settings: ShapeSettings,
    balancer: OrientationBalancer,
}

impl WaypointPlacer<'_> {
    fn place(&mut self, salt: u32, a: Point, b: Point, axis: EdgeAxis) -> EdgeWaypoint {
        let orientation = self.balancer.next(rand_unit(self.seed, salt.wrapping_mul(4)));
        let range = self.settings.waypoint_offset_range;
        let offset = rand_range(self.seed, salt.wrapping_mul(4) + 1, -range, range);
        let mut depth = rand_range(
            self.seed,
            salt.wrapping_mul(4) + 2,
            self.request.min_depth,
            self.request.max_depth,
        );
        let chord = b - a;
        let len = chord.length();
        let base = a.lerp(b, 0.5 + offset);
        if len <= SEGMENT_EPS {
            return EdgeWaypoint {
                point: base,
                orientation,
            };
        }
        if orientation == EdgeOrientation::Dent {
            let piece_min = self.request.piece_width().min(self.request.piece_height());
            depth = depth
                .min(self.settings.cavity_cap_rel * piece_min)
                .min(self.settings.cavity_cap_edge_fraction * len);
        }
        let dir = chord.scale(1.0 / len);
        let normal = match axis {
            EdgeAxis::Horizontal => Point::new(-dir.y, dir.x),
            EdgeAxis::Vertical => Point::new(dir.y, -dir.x),
        };
        EdgeWaypoint {
            point: base + normal.scale(orientation.sign() * depth),
            orientation,
        }
    }
}

pub fn generate_lattice(
    request: &LatticeRequest,
    settings: &ShapeSettings,
    seed: u32,
) -> Result<Lattice, GenerationError> {
    request.validate()?;
    let settings = settings.sanitized();
    let rows = request.rows;
    let cols = request.cols;
    let width = request.image_width;
    let height = request.image_height;
    let piece_width = request.piece_width();
    let piece_height = request.piece_height();

    let v_seed = mix_seed(seed, STREAM_VERTICAL_CUTS);
    let vertical_cuts: Vec<CutLine> = (0..=cols)
        .map(|col| {
            let ideal = col as f32 * piece_width;
            if col == 0 || col == cols {
                return CutLine {
                    start: Point::new(ideal, 0.0),
                    end: Point::new(ideal, height),
                };
            }
            let spread = piece_width * settings.cut_randomness;
            CutLine {
                start: Point::new(ideal + rand_signed(v_seed, col * 2) * spread, 0.0),
                end: Point::new(ideal + rand_signed(v_seed, col * 2 + 1) * spread, height),
            }
        })
        .collect();

    let h_seed = mix_seed(seed, STREAM_HORIZONTAL_CUTS);
    let horizontal_cuts: Vec<CutLine> = (0..=rows)
        .map(|row| {
            let ideal = row as f32 * piece_height;
            if row == 0 || row == rows {
                return CutLine {
                    start: Point::new(0.0, ideal),
                    end: Point::new(width, ideal),
                };
            }
            let spread = piece_height * settings.cut_randomness;
            CutLine {
                start: Point::new(0.0, ideal + rand_signed(h_seed, row * 2) * spread),
                end: Point::new(width, ideal + rand_signed(h_seed, row * 2 + 1) * spread),
            }
        })
        .collect();

    let mut fallbacks = 0usize;
    let corners: Vec<Vec<Point>> = horizontal_cuts
        .iter()
        .enumerate()
        .map(|(row, h_cut)| {
            vertical_cuts
                .iter()
                .enumerate()
                .map(|(col, v_cut)| {
                    line_intersection(h_cut, v_cut).unwrap_or_else(|| {
                        fallbacks += 1;
                        Point::new(col as f32 * piece_width, row as f32 * piece_height)
                    })
                })
                .collect()
        })
        .collect();

    let total_edges = (rows - 1) * cols + (cols - 1) * rows;
    let mut placer = WaypointPlacer {
        seed: mix_seed(seed, STREAM_EDGES),
        request,
        settings,
        balancer: OrientationBalancer::new(total_edges),
    };
    let mut salt = 0u32;

    let mut horizontal = Vec::with_capacity((rows - 1) as usize);
    for row in 1..rows as usize {
        let mut line = Vec::with_capacity(cols as usize);
        for col in 0..cols as usize {
            let a = corners[row][col];
            let b = corners[row][col + 1];
            line.push(placer.place(salt, a, b, EdgeAxis::Horizontal));
            salt += 1;
        }
        horizontal.push(line);
    }

    let mut vertical = Vec::with_capacity(rows as usize);
    for row in 0..rows as usize {
        let mut line = Vec::with_capacity((cols - 1) as usize);
        for col in 1..cols as usize {
            let a = corners[row][col];
            let b = corners[row + 1][col];
            line.push(placer.place(salt, a, b, EdgeAxis::Vertical));
            salt += 1;
        }
        vertical.push(line);
    }

    let lattice = Lattice {
        rows,
        cols,
        corners,
        horizontal,
        vertical,
    };
    let (knobs, dents) = lattice.orientation_counts();
    debug!(
        rows,
        cols,
        edges = total_edges,
        knobs,
        dents,
        fallbacks,
        "generated cut lattice"
    );
    Ok(lattice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(rows: u32, cols: u32) -> LatticeRequest {
        LatticeRequest::from_settings(rows, cols, 400.0, 300.0, &ShapeSettings::default())
    }

    #[test]
    fn dimensions_follow_grid() {
        let lattice = generate_lattice(&request(3, 4), &ShapeSettings::default(), 11).unwrap();
        assert_eq!(lattice.corners.len(), 4);
        assert!(lattice.corners.iter().all(|row| row.len() == 5));
        assert_eq!(lattice.horizontal.len(), 2);
        assert!(lattice.horizontal.iter().all(|row| row.len() == 4));
        assert_eq!(lattice.vertical.len(), 3);
        assert!(lattice.vertical.iter().all(|row| row.len() == 3));
        assert_eq!(lattice.internal_edge_count(), 2 * 4 + 3 * 3);
    }

    #[test]
    fn outer_corners_stay_on_image_border() {
        let lattice = generate_lattice(&request(4, 5), &ShapeSettings::default(), 3).unwrap();
        for col in 0..=5 {
            assert!(lattice.corner(0, col).y.abs() < 1e-3);
            assert!((lattice.corner(4, col).y - 300.0).abs() < 1e-3);
        }
        for row in 0..=4 {
            assert!(lattice.corner(row, 0).x.abs() < 1e-3);
            assert!((lattice.corner(row, 5).x - 400.0).abs() < 1e-3);
        }
        assert_eq!(lattice.corner(0, 0), Point::new(0.0, 0.0));
    }

    #[test]
    fn cuts_stay_near_ideal_grid() {
        let settings = ShapeSettings::default();
        let lattice = generate_lattice(&request(5, 5), &settings, 99).unwrap();
        let (pw, ph) = (80.0, 60.0);
        for row in 0..=5u32 {
            for col in 0..=5u32 {
                let corner = lattice.corner(row, col);
                assert!((corner.x - col as f32 * pw).abs() <= pw * settings.cut_randomness + 1e-3);
                assert!((corner.y - row as f32 * ph).abs() <= ph * settings.cut_randomness + 1e-3);
            }
        }
    }

    #[test]
    fn same_seed_reproduces_lattice() {
        let a = generate_lattice(&request(3, 3), &ShapeSettings::default(), 42).unwrap();
        let b = generate_lattice(&request(3, 3), &ShapeSettings::default(), 42).unwrap();
        let c = generate_lattice(&request(3, 3), &ShapeSettings::default(), 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn waypoints_are_displaced_within_depth_range() {
        let req = request(4, 4);
        let lattice = generate_lattice(&req, &ShapeSettings::default(), 5).unwrap();
        for (row, line) in lattice.horizontal.iter().enumerate() {
            for (col, edge) in line.iter().enumerate() {
                let a = lattice.corners[row + 1][col];
                let b = lattice.corners[row + 1][col + 1];
                let chord = b - a;
                let rel = edge.point - a;
                let cross = (chord.x * rel.y - chord.y * rel.x) / chord.length();
                assert!(cross.abs() <= req.max_depth + 1e-3);
                if edge.orientation == EdgeOrientation::Knob {
                    assert!(cross.abs() + 1e-3 >= req.min_depth);
                }
                assert_eq!(cross.signum(), edge.orientation.sign());
            }
        }
    }

    #[test]
    fn dent_depth_is_capped() {
        let settings = ShapeSettings {
            min_depth_ratio: 0.4,
            max_depth_ratio: 0.45,
            cavity_cap_rel: 0.1,
            ..ShapeSettings::default()
        };
        let req = LatticeRequest::from_settings(3, 3, 300.0, 300.0, &settings);
        let lattice = generate_lattice(&req, &settings, 8).unwrap();
        for (row, line) in lattice.vertical.iter().enumerate() {
            for (idx, edge) in line.iter().enumerate() {
                let a = lattice.corners[row][idx + 1];
                let b = lattice.corners[row + 1][idx + 1];
                let chord = b - a;
                let rel = edge.point - a;
                let depth = ((chord.x * rel.y - chord.y * rel.x) / chord.length()).abs();
                match edge.orientation {
                    EdgeOrientation::Dent => assert!(depth <= 10.0 + 1e-3),
                    EdgeOrientation::Knob => assert!(depth >= 40.0 - 1e-3),
                }
            }
        }
    }

    #[test]
    fn rejects_small_grids_and_bad_depths() {
        let mut req = request(1, 4);
        assert_eq!(
            generate_lattice(&req, &ShapeSettings::default(), 0),
            Err(GenerationError::GridTooSmall { rows: 1, cols: 4 })
        );
        req = request(2, 2);
        req.max_depth = req.min_depth - 1.0;
        assert!(matches!(
            generate_lattice(&req, &ShapeSettings::default(), 0),
            Err(GenerationError::InvalidDepthRange { .. })
        ));
    }

    #[test]
    fn parallel_lines_have_no_intersection() {
        let a = CutLine {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
        };
        let b = CutLine {
            start: Point::new(0.0, 5.0),
            end: Point::new(10.0, 5.0),
        };
        assert!(line_intersection(&a, &b).is_none());
    }

    proptest! {
        #[test]
        fn orientations_are_balanced(rows in 2u32..12, cols in 2u32..12, seed in any::<u32>()) {
            let lattice = generate_lattice(&request(rows, cols), &ShapeSettings::default(), seed).unwrap();
            let (knobs, dents) = lattice.orientation_counts();
            prop_assert_eq!(knobs + dents, ((rows - 1) * cols + (cols - 1) * rows) as usize);
            prop_assert!((knobs as i64 - dents as i64).abs() <= 1);
        }
    }
}
