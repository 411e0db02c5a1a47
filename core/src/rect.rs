use serde::{Deserialize, Serialize};

use crate::point::Point;

/// Axis-aligned rectangle given by its top-left corner and size.
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
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const EMPTY: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle holding every finite point, `None` when there is none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for point in points.into_iter().filter(|point| point.is_finite()) {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        if !min_x.is_finite() || !min_y.is_finite() {
            return None;
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.right(), self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.x, self.bottom())
    }

    pub fn center(&self) -> Point {
        self.top_left() + self.center_offset()
    }

    /// Offset from the top-left corner to the center.
    pub fn center_offset(&self) -> Point {
        Point::new(self.width * 0.5, self.height * 0.5)
    }

    pub fn longest_side(&self) -> f32 {
        self.width.max(self.height)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = self.right().max(other.right());
        let max_y = self.bottom().max(other.bottom());
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn translate(&self, offset: Point) -> Rect {
        Rect::new(self.x + offset.x, self.y + offset.y, self.width, self.height)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Shrinks every side by `margin`, collapsing to the center when too small.
    pub fn inset(&self, margin: f32) -> Rect {
        let width = (self.width - margin * 2.0).max(0.0);
        let height = (self.height - margin * 2.0).max(0.0);
        let center = self.center();
        Rect::new(center.x - width * 0.5, center.y - height * 0.5, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_skips_non_finite() {
        let rect = Rect::from_points([
            Point::new(2.0, 3.0),
            Point::new(f32::NAN, 0.0),
            Point::new(-1.0, 8.0),
        ])
        .unwrap();
        assert_eq!(rect, Rect::new(-1.0, 3.0, 3.0, 5.0));
        assert!(Rect::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn union_and_corners() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 10.0, 10.0);
        let merged = a.union(&b);
        assert_eq!(merged, Rect::new(0.0, -5.0, 15.0, 15.0));
        assert_eq!(merged.top_right(), Point::new(15.0, -5.0));
        assert_eq!(merged.bottom_left(), Point::new(0.0, 10.0));
        assert_eq!(merged.center(), Point::new(7.5, 2.5));
        assert_eq!(merged.center_offset(), Point::new(7.5, 7.5));
    }

    #[test]
    fn inset_collapses_to_center() {
        let rect = Rect::new(0.0, 0.0, 10.0, 4.0);
        assert_eq!(rect.inset(1.0), Rect::new(1.0, 1.0, 8.0, 2.0));
        assert_eq!(rect.inset(5.0), Rect::new(5.0, 2.0, 0.0, 0.0));
        assert!(rect.contains(Point::new(10.0, 4.0)));
    }
}
