use crate::piece::PieceId;
use crate::point::Point;

/// Single source of truth for where each piece's visual center sits in world space.
pub trait PositionStore {
    fn position(&self, id: PieceId) -> Option<Point>;
    fn set_position(&mut self, id: PieceId, position: Point) -> bool;
}

/// Dense table indexed by piece id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionTable {
    positions: Vec<Point>,
}

impl PositionTable {
    pub fn new(count: usize) -> Self {
        Self {
            positions: vec![Point::ZERO; count],
        }
    }

    pub fn from_positions(positions: Vec<Point>) -> Self {
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.positions
    }

    pub fn translate(&mut self, id: PieceId, offset: Point) -> Option<Point> {
        let slot = self.positions.get_mut(id)?;
        *slot += offset;
        Some(*slot)
    }
}

impl PositionStore for PositionTable {
    fn position(&self, id: PieceId) -> Option<Point> {
        self.positions.get(id).copied()
    }

    fn set_position(&mut self, id: PieceId, position: Point) -> bool {
        match self.positions.get_mut(id) {
            Some(slot) => {
                *slot = position;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_are_rejected() {
        let mut table = PositionTable::new(2);
        assert!(table.set_position(1, Point::new(3.0, 4.0)));
        assert!(!table.set_position(2, Point::new(3.0, 4.0)));
        assert_eq!(table.position(1), Some(Point::new(3.0, 4.0)));
        assert_eq!(table.position(7), None);
        assert_eq!(table.translate(1, Point::new(1.0, -1.0)), Some(Point::new(4.0, 3.0)));
    }
}
