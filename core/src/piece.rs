use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::lattice::Lattice;
use crate::point::{normalize_angle, Point};
use crate::rect::Rect;

pub type PieceId = usize;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    pub fn index(self) -> usize {
        match self {
            Side::North => 0,
            Side::East => 1,
            Side::South => 2,
            Side::West => 3,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    pub fn corner_keys(self) -> (Corner, Corner) {
        match self {
            Side::North => (Corner::Nw, Corner::Ne),
            Side::East => (Corner::Ne, Corner::Se),
            Side::South => (Corner::Se, Corner::Sw),
            Side::West => (Corner::Sw, Corner::Nw),
        }
    }

    pub fn grid_offset(self) -> (i64, i64) {
        match self {
            Side::North => (0, -1),
            Side::East => (1, 0),
            Side::South => (0, 1),
            Side::West => (-1, 0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::North => "north",
            Side::East => "east",
            Side::South => "south",
            Side::West => "west",
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Corner {
    Nw,
    Ne,
    Se,
    Sw,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::Nw, Corner::Ne, Corner::Se, Corner::Sw];
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct Corners {
    pub nw: Point,
    pub ne: Point,
    pub se: Point,
    pub sw: Point,
}

impl Corners {
    pub fn get(&self, corner: Corner) -> Point {
        match corner {
            Corner::Nw => self.nw,
            Corner::Ne => self.ne,
            Corner::Se => self.se,
            Corner::Sw => self.sw,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> {
        [self.nw, self.ne, self.se, self.sw].into_iter()
    }

    pub fn map(&self, mut f: impl FnMut(Point) -> Point) -> Corners {
        Corners {
            nw: f(self.nw),
            ne: f(self.ne),
            se: f(self.se),
            sw: f(self.sw),
        }
    }
}

/// Waypoints per side, indexed by [`Side::index`]. A border side is empty; an interior
/// side lists its waypoints in clockwise trace order.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct SidePoints(pub [Vec<Point>; 4]);

impl SidePoints {
    pub fn get(&self, side: Side) -> &[Point] {
        &self.0[side.index()]
    }

    pub fn is_border(&self, side: Side) -> bool {
        self.0[side.index()].is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &[Point])> {
        Side::ALL.into_iter().map(move |side| (side, self.get(side)))
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.0.iter().flatten().copied()
    }

    pub fn map(&self, mut f: impl FnMut(Point) -> Point) -> SidePoints {
        SidePoints(std::array::from_fn(|idx| {
            self.0[idx].iter().map(|point| f(*point)).collect()
        }))
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct GridPos {
    pub col: u32,
    pub row: u32,
}

impl GridPos {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    pub fn step(self, side: Side) -> Option<GridPos> {
        let (dc, dr) = side.grid_offset();
        let col = u32::try_from(self.col as i64 + dc).ok()?;
        let row = u32::try_from(self.row as i64 + dr).ok()?;
        Some(GridPos { col, row })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStyle {
    Straight,
    Spline,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CubicTo { ctrl1: Point, ctrl2: Point, to: Point },
    Close,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PiecePath {
    pub commands: Vec<PathCommand>,
}

fn fmt_f32(value: f32) -> String {
    format!("{:.3}", value)
}

impl PiecePath {
    pub fn vertices(&self) -> Vec<Point> {
        self.commands
            .iter()
            .filter_map(|command| match *command {
                PathCommand::MoveTo(point) | PathCommand::LineTo(point) => Some(point),
                PathCommand::CubicTo { to, .. } => Some(to),
                PathCommand::Close => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.commands.first(), Some(PathCommand::MoveTo(_)))
            && matches!(self.commands.last(), Some(PathCommand::Close))
    }

    pub fn to_svg(&self) -> String {
        let mut path = String::new();
        for command in &self.commands {
            if !path.is_empty() {
                path.push(' ');
            }
            let _ = match *command {
                PathCommand::MoveTo(p) => write!(path, "M {} {}", fmt_f32(p.x), fmt_f32(p.y)),
                PathCommand::LineTo(p) => write!(path, "L {} {}", fmt_f32(p.x), fmt_f32(p.y)),
                PathCommand::CubicTo { ctrl1, ctrl2, to } => write!(
                    path,
                    "C {} {} {} {} {} {}",
                    fmt_f32(ctrl1.x),
                    fmt_f32(ctrl1.y),
                    fmt_f32(ctrl2.x),
                    fmt_f32(ctrl2.y),
                    fmt_f32(to.x),
                    fmt_f32(to.y)
                ),
                PathCommand::Close => write!(path, "Z"),
            };
        }
        path
    }
}

/// One puzzle piece. Geometry is piece-local with the north-west corner at the origin
/// and never changes after generation; `rotation`, `scale` and `z_index` are presentation
/// state. World position and group membership live outside the piece.
#[derive(Clone, Debug, PartialEq)]
pub struct Piece {
    pub id: PieceId,
    pub grid_pos: GridPos,
    pub corners: Corners,
    pub side_points: SidePoints,
    pub image_rect: Rect,
    pub rotation: f32,
    pub scale: f32,
    pub z_index: u32,
    frame: Rect,
}

impl Piece {
    pub fn new(
        id: PieceId,
        grid_pos: GridPos,
        corners: Corners,
        side_points: SidePoints,
        image_rect: Rect,
    ) -> Self {
        let frame = bounding_frame(&corners, &side_points);
        Self {
            id,
            grid_pos,
            corners,
            side_points,
            image_rect,
            rotation: 0.0,
            scale: 1.0,
            z_index: id as u32,
            frame,
        }
    }

    pub fn bounding_frame(&self) -> Rect {
        self.frame
    }

    pub fn image_origin(&self) -> Point {
        self.image_rect.top_left() - self.frame.top_left()
    }

    /// World position (visual center) that puts this piece where it belongs in the
    /// assembled image, for an image placed at the world origin.
    pub fn solved_position(&self, scale: f32) -> Point {
        (self.image_origin() + self.frame.center()).scale(scale)
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = normalize_angle(rotation);
    }

    pub fn is_border_side(&self, side: Side) -> bool {
        self.side_points.is_border(side)
    }

    pub fn path(&self, style: EdgeStyle) -> PiecePath {
        generate_path(&self.corners, &self.side_points, style)
    }
}

pub fn bounding_frame(corners: &Corners, side_points: &SidePoints) -> Rect {
    Rect::from_points(corners.iter().chain(side_points.points())).unwrap_or(Rect::EMPTY)
}

/// Closed outline nw → north → ne → east → se → south → sw → west → nw.
pub fn generate_path(corners: &Corners, side_points: &SidePoints, style: EdgeStyle) -> PiecePath {
    let mut commands = vec![PathCommand::MoveTo(corners.nw)];
    for side in Side::ALL {
        let (start_key, end_key) = side.corner_keys();
        let start = corners.get(start_key);
        let end = corners.get(end_key);
        let waypoints = side_points.get(side);
        if waypoints.is_empty() {
            commands.push(PathCommand::LineTo(end));
            continue;
        }
        let mut through = Vec::with_capacity(waypoints.len() + 2);
        through.push(start);
        through.extend_from_slice(waypoints);
        through.push(end);
        match style {
            EdgeStyle::Straight => {
                commands.extend(through[1..].iter().map(|point| PathCommand::LineTo(*point)));
            }
            EdgeStyle::Spline => commands.extend(catmull_rom(&through)),
        }
    }
    commands.push(PathCommand::Close);
    PiecePath { commands }
}

fn catmull_rom(points: &[Point]) -> Vec<PathCommand> {
    let last = points.len() - 1;
    (0..last)
        .map(|idx| {
            let p0 = points[idx.saturating_sub(1)];
            let p1 = points[idx];
            let p2 = points[idx + 1];
            let p3 = points[(idx + 2).min(last)];
            PathCommand::CubicTo {
                ctrl1: p1 + (p2 - p0).scale(1.0 / 6.0),
                ctrl2: p2 - (p3 - p1).scale(1.0 / 6.0),
                to: p2,
            }
        })
        .collect()
}

/// Cuts the lattice into pieces, row-major, so `id = row * cols + col`.
pub fn build_pieces(lattice: &Lattice) -> Vec<Piece> {
    let rows = lattice.rows as usize;
    let cols = lattice.cols as usize;
    let mut pieces = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let origin = lattice.corners[row][col];
            let corners = Corners {
                nw: lattice.corners[row][col],
                ne: lattice.corners[row][col + 1],
                se: lattice.corners[row + 1][col + 1],
                sw: lattice.corners[row + 1][col],
            };
            let north = (row > 0).then(|| lattice.horizontal[row - 1][col].point);
            let south = (row + 1 < rows).then(|| lattice.horizontal[row][col].point);
            let west = (col > 0).then(|| lattice.vertical[row][col - 1].point);
            let east = (col + 1 < cols).then(|| lattice.vertical[row][col].point);
            let absolute = SidePoints([
                north.into_iter().collect(),
                east.into_iter().collect(),
                south.into_iter().collect(),
                west.into_iter().collect(),
            ]);
            let local_corners = corners.map(|point| point - origin);
            let local_sides = absolute.map(|point| point - origin);
            let frame = bounding_frame(&local_corners, &local_sides);
            let image_rect = frame.translate(origin);
            pieces.push(Piece::new(
                row * cols + col,
                GridPos::new(col as u32, row as u32),
                local_corners,
                local_sides,
                image_rect,
            ));
        }
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{generate_lattice, LatticeRequest};
    use crate::rules::ShapeSettings;

    fn square_corners() -> Corners {
        Corners {
            nw: Point::new(0.0, 0.0),
            ne: Point::new(10.0, 0.0),
            se: Point::new(10.0, 10.0),
            sw: Point::new(0.0, 10.0),
        }
    }

    #[test]
    fn bounding_frame_of_plain_square() {
        let frame = bounding_frame(&square_corners(), &SidePoints::default());
        assert_eq!(frame, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn bounding_frame_includes_protruding_waypoint() {
        let mut sides = SidePoints::default();
        sides.0[Side::South.index()].push(Point::new(5.0, 15.0));
        let frame = bounding_frame(&square_corners(), &sides);
        assert_eq!(frame, Rect::new(0.0, 0.0, 10.0, 15.0));
    }

    #[test]
    fn bounding_frame_of_nothing_is_empty() {
        let corners = Corners {
            nw: Point::new(f32::NAN, 0.0),
            ne: Point::new(f32::NAN, 0.0),
            se: Point::new(f32::NAN, 0.0),
            sw: Point::new(f32::NAN, 0.0),
        };
        assert_eq!(bounding_frame(&corners, &SidePoints::default()), Rect::EMPTY);
    }

    #[test]
    fn paths_are_closed_and_visit_waypoints_in_order() {
        let mut sides = SidePoints::default();
        sides.0[Side::East.index()].push(Point::new(13.0, 5.0));
        sides.0[Side::South.index()].push(Point::new(5.0, 7.0));
        for style in [EdgeStyle::Straight, EdgeStyle::Spline] {
            let path = generate_path(&square_corners(), &sides, style);
            assert!(path.is_closed());
            assert_eq!(
                path.vertices(),
                vec![
                    Point::new(0.0, 0.0),
                    Point::new(10.0, 0.0),
                    Point::new(13.0, 5.0),
                    Point::new(10.0, 10.0),
                    Point::new(5.0, 7.0),
                    Point::new(0.0, 10.0),
                    Point::new(0.0, 0.0),
                ]
            );
        }
    }

    #[test]
    fn svg_output_uses_fixed_precision() {
        let path = generate_path(&square_corners(), &SidePoints::default(), EdgeStyle::Straight);
        assert_eq!(
            path.to_svg(),
            "M 0.000 0.000 L 10.000 0.000 L 10.000 10.000 L 0.000 10.000 L 0.000 0.000 Z"
        );
    }

    #[test]
    fn neighbours_share_waypoints() {
        let request = LatticeRequest::from_settings(3, 4, 400.0, 300.0, &ShapeSettings::default());
        let lattice = generate_lattice(&request, &ShapeSettings::default(), 17).unwrap();
        let pieces = build_pieces(&lattice);
        assert_eq!(pieces.len(), 12);
        for piece in &pieces {
            for side in Side::ALL {
                let Some(next) = piece.grid_pos.step(side) else {
                    assert!(piece.is_border_side(side));
                    continue;
                };
                if next.col >= 4 || next.row >= 3 {
                    assert!(piece.is_border_side(side));
                    continue;
                }
                let other = &pieces[(next.row * 4 + next.col) as usize];
                let mine = piece.side_points.get(side)[0] + piece.image_origin();
                let theirs = other.side_points.get(side.opposite())[0] + other.image_origin();
                assert!(mine.distance(theirs) < 1e-3, "{side:?} of {}", piece.id);
                let (a, b) = side.corner_keys();
                let (c, d) = side.opposite().corner_keys();
                let mine_a = piece.corners.get(a) + piece.image_origin();
                let theirs_d = other.corners.get(d) + other.image_origin();
                let mine_b = piece.corners.get(b) + piece.image_origin();
                let theirs_c = other.corners.get(c) + other.image_origin();
                assert!(mine_a.distance(theirs_d) < 1e-3);
                assert!(mine_b.distance(theirs_c) < 1e-3);
            }
        }
    }

    #[test]
    fn local_geometry_starts_at_origin() {
        let request = LatticeRequest::from_settings(2, 2, 200.0, 200.0, &ShapeSettings::default());
        let lattice = generate_lattice(&request, &ShapeSettings::default(), 1).unwrap();
        for piece in build_pieces(&lattice) {
            assert_eq!(piece.corners.nw, Point::ZERO);
            let frame = piece.bounding_frame();
            assert_eq!(frame.width, piece.image_rect.width);
            assert!(frame.contains(piece.corners.se));
        }
    }
}
