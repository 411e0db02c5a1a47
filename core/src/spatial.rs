use std::collections::HashMap;

use crate::piece::PieceId;
use crate::point::Point;

pub const DEFAULT_BUCKET_SIZE: f32 = 128.0;

type BucketKey = (i32, i32);

/// Uniform-grid bucket index over piece centers. Buckets are created on demand, so
/// coordinates may be negative and bounds grow freely.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    bucket_size: f32,
    buckets: HashMap<BucketKey, Vec<PieceId>>,
    entries: HashMap<PieceId, Point>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}

impl SpatialGrid {
    pub fn new(bucket_size: f32) -> Self {
        let bucket_size = if bucket_size.is_finite() && bucket_size > 0.0 {
            bucket_size
        } else {
            DEFAULT_BUCKET_SIZE
        };
        Self {
            bucket_size,
            buckets: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    pub fn bucket_size(&self) -> f32 {
        self.bucket_size
    }

    fn key(&self, point: Point) -> BucketKey {
        (
            (point.x / self.bucket_size).floor() as i32,
            (point.y / self.bucket_size).floor() as i32,
        )
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, id: PieceId, position: Point) {
        if self.entries.contains_key(&id) {
            self.update(id, position);
            return;
        }
        let key = self.key(position);
        self.buckets.entry(key).or_default().push(id);
        self.entries.insert(id, position);
    }

    pub fn update(&mut self, id: PieceId, position: Point) {
        let Some(previous) = self.entries.get(&id).copied() else {
            self.insert(id, position);
            return;
        };
        let old_key = self.key(previous);
        let new_key = self.key(position);
        if old_key != new_key {
            self.detach_from_bucket(old_key, id);
            self.buckets.entry(new_key).or_default().push(id);
        }
        self.entries.insert(id, position);
    }

    pub fn remove(&mut self, id: PieceId) -> bool {
        let Some(previous) = self.entries.remove(&id) else {
            return false;
        };
        let key = self.key(previous);
        self.detach_from_bucket(key, id);
        true
    }

    fn detach_from_bucket(&mut self, key: BucketKey, id: PieceId) {
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.retain(|entry| *entry != id);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Ids whose stored position lies within `radius` of `center`, ascending.
    pub fn query_radius(&self, center: Point, radius: f32) -> Vec<PieceId> {
        if !center.is_finite() || radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let radius_sq = radius * radius;
        let (min_bx, min_by) = self.key(Point::new(center.x - radius, center.y - radius));
        let (max_bx, max_by) = self.key(Point::new(center.x + radius, center.y + radius));
        let mut result = Vec::new();
        let bucket_span = (max_bx as i64 - min_bx as i64 + 1) * (max_by as i64 - min_by as i64 + 1);
        if bucket_span > self.buckets.len() as i64 {
            for (id, position) in &self.entries {
                if position.distance_sq(center) <= radius_sq {
                    result.push(*id);
                }
            }
        } else {
            for by in min_by..=max_by {
                for bx in min_bx..=max_bx {
                    let Some(bucket) = self.buckets.get(&(bx, by)) else {
                        continue;
                    };
                    for id in bucket {
                        if let Some(position) = self.entries.get(id) {
                            if position.distance_sq(center) <= radius_sq {
                                result.push(*id);
                            }
                        }
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query() {
        let mut grid = SpatialGrid::new(50.0);
        grid.insert(1, Point::new(10.0, 10.0));
        grid.insert(2, Point::new(120.0, 10.0));
        grid.insert(3, Point::new(-80.0, -300.0));
        assert_eq!(grid.query_radius(Point::new(0.0, 0.0), 20.0), vec![1]);
        assert_eq!(grid.query_radius(Point::new(60.0, 10.0), 60.0), vec![1, 2]);
        assert_eq!(grid.query_radius(Point::new(-80.0, -290.0), 15.0), vec![3]);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(4, Point::new(0.0, 0.0));
        grid.update(4, Point::new(1000.0, -1000.0));
        assert!(grid.query_radius(Point::ZERO, 5.0).is_empty());
        assert_eq!(grid.query_radius(Point::new(1000.0, -1000.0), 1.0), vec![4]);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_forgets_entry() {
        let mut grid = SpatialGrid::default();
        grid.insert(9, Point::new(5.0, 5.0));
        assert!(grid.remove(9));
        assert!(!grid.remove(9));
        assert!(grid.query_radius(Point::new(5.0, 5.0), 100.0).is_empty());
        assert!(grid.is_empty());
    }

    #[test]
    fn huge_radius_falls_back_to_scan() {
        let mut grid = SpatialGrid::new(1.0);
        for id in 0..5 {
            grid.insert(id, Point::new(id as f32 * 100.0, 0.0));
        }
        assert_eq!(grid.query_radius(Point::ZERO, 1.0e6), vec![0, 1, 2, 3, 4]);
        assert!(grid.query_radius(Point::ZERO, f32::NAN).is_empty());
    }
}
