use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridChoice {
    pub target_count: u32,
    pub cols: u32,
    pub rows: u32,
    pub actual_count: u32,
}

pub const TARGET_PIECE_COUNTS: [u32; 11] = [
    50, 100, 150, 300, 500, 750, 1000, 1500, 2000, 3000, 5000,
];
pub const DEFAULT_TARGET_COUNT: u32 = 100;
pub const MAX_TARGET_COUNT: u32 = 1 << 20;
pub const GRID_MIN: u32 = 2;
pub const GRID_REL_COUNT_TOL: f32 = 0.05;
pub const GRID_PIECE_RATIO_MAX: f32 = 1.42;
pub const GRID_ROW_WIDEN: f32 = 1.5;
pub const GRID_NEIGHBOR_COLS: i32 = 3;
pub const GRID_SCORE_COUNT: f32 = 1.0;
pub const GRID_SCORE_GRID: f32 = 1.0;
pub const GRID_SCORE_PIECE: f32 = 0.5;

impl GridChoice {
    pub fn internal_edge_count(&self) -> u32 {
        let across = self.rows.saturating_sub(1).saturating_mul(self.cols);
        let down = self.cols.saturating_sub(1).saturating_mul(self.rows);
        across.saturating_add(down)
    }
}

pub fn grid_choice_label(choice: &GridChoice) -> String {
    if choice.actual_count == choice.target_count {
        format!(
            "{} pieces ({}x{})",
            choice.target_count, choice.cols, choice.rows
        )
    } else {
        format!(
            "{} pieces ({}x{}, actual {})",
            choice.target_count, choice.cols, choice.rows, choice.actual_count
        )
    }
}

/// Picks the grid for `target` pieces: the best-scoring covering grid when one fits the
/// image aspect, otherwise the plain square-ish grid grown until it covers the target.
pub fn choose_grid(width: f32, height: f32, target: u32) -> Result<GridChoice, GenerationError> {
    if target == 0 || target > MAX_TARGET_COUNT {
        return Err(GenerationError::TargetCount {
            max: MAX_TARGET_COUNT,
        });
    }
    if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
        return Err(GenerationError::InvalidImage { width, height });
    }
    Ok(best_grid_for_count(width, height, target)
        .unwrap_or_else(|| covering_grid(width, height, target)))
}

/// `rows = max(2, round(sqrt(target * h / w)))`, then columns grow until the grid covers
/// the target. Targets are clamped to `1..=MAX_TARGET_COUNT`.
pub fn covering_grid(width: f32, height: f32, target: u32) -> GridChoice {
    let target = target.clamp(1, MAX_TARGET_COUNT);
    let aspect = (height / width.max(f32::EPSILON)).max(f32::EPSILON);
    let rows = ((target as f32 * aspect).sqrt().round() as u32).clamp(GRID_MIN, target.max(GRID_MIN));
    let mut cols = ((target as f32 / rows as f32).round() as u32).max(GRID_MIN);
    while u64::from(rows) * u64::from(cols) < u64::from(target) {
        cols += 1;
    }
    GridChoice {
        target_count: target,
        cols,
        rows,
        actual_count: rows.saturating_mul(cols),
    }
}

pub fn best_grid_for_count(width: f32, height: f32, target: u32) -> Option<GridChoice> {
    if target == 0 || target > MAX_TARGET_COUNT || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let aspect = width / height;
    let piece_ratio_max = GRID_PIECE_RATIO_MAX.max(1.0);
    let piece_ratio_min = 1.0 / piece_ratio_max;
    let base = (target as f32).sqrt().ceil() as u32;
    let r_hi = (((base as f32) * GRID_ROW_WIDEN).ceil() as u32).max(GRID_MIN);
    let mut best: Option<(GridChoice, f32)> = None;
    for r in GRID_MIN..=r_hi {
        let c0 = (target as f32 / r as f32).ceil() as i32;
        for dc in 0..=GRID_NEIGHBOR_COLS {
            let c = c0 + dc;
            if c < GRID_MIN as i32 {
                continue;
            }
            let actual = r * c as u32;
            if actual < target {
                continue;
            }
            let rel_err = (actual - target) as f32 / target as f32;
            if rel_err > GRID_REL_COUNT_TOL {
                continue;
            }
            let grid_ratio = c as f32 / r as f32;
            let piece_ratio = aspect / grid_ratio;
            if piece_ratio < piece_ratio_min || piece_ratio > piece_ratio_max {
                continue;
            }
            let eps = 1e-12;
            let count_term = rel_err.powi(2);
            let grid_term = ((grid_ratio + eps) / (aspect + eps)).ln().powi(2);
            let piece_term = (piece_ratio + eps).ln().powi(2);
            let score = GRID_SCORE_COUNT * count_term
                + GRID_SCORE_GRID * grid_term
                + GRID_SCORE_PIECE * piece_term;
            let choice = GridChoice {
                target_count: target,
                cols: c as u32,
                rows: r,
                actual_count: actual,
            };
            match &best {
                Some((_, best_score)) if score >= *best_score => {}
                _ => best = Some((choice, score)),
            }
        }
    }
    best.map(|(choice, _)| choice)
}

pub fn build_grid_choices(width: f32, height: f32) -> Vec<GridChoice> {
    TARGET_PIECE_COUNTS
        .iter()
        .filter_map(|target| choose_grid(width, height, *target).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_pieces_on_square_image_is_two_by_two() {
        let choice = choose_grid(400.0, 400.0, 4).unwrap();
        assert_eq!((choice.cols, choice.rows, choice.actual_count), (2, 2, 4));
        assert_eq!(choice.internal_edge_count(), 4);
    }

    #[test]
    fn grids_always_cover_target() {
        for (width, height) in [(400.0, 400.0), (1600.0, 900.0), (300.0, 1200.0), (5000.0, 40.0)] {
            for target in [1, 2, 3, 5, 7, 50, 99, 100, 333, 1000] {
                let choice = choose_grid(width, height, target).unwrap();
                assert!(choice.rows >= GRID_MIN && choice.cols >= GRID_MIN);
                assert!(choice.actual_count >= target, "{choice:?}");
                assert_eq!(choice.actual_count, choice.rows * choice.cols);
            }
        }
    }

    #[test]
    fn covering_grid_grows_columns() {
        let choice = covering_grid(100.0, 100.0, 7);
        assert_eq!(choice.rows, 3);
        assert_eq!(choice.cols, 3);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(choose_grid(0.0, 10.0, 4), Err(GenerationError::InvalidImage { width: 0.0, height: 10.0 }));
        let rejected = Err(GenerationError::TargetCount {
            max: MAX_TARGET_COUNT,
        });
        assert_eq!(choose_grid(10.0, 10.0, 0), rejected);
        assert_eq!(choose_grid(1600.0, 1200.0, u32::MAX), rejected);
        assert_eq!(choose_grid(1600.0, 1200.0, MAX_TARGET_COUNT + 1), rejected);
    }

    #[test]
    fn largest_target_still_covers() {
        let choice = choose_grid(1600.0, 1200.0, MAX_TARGET_COUNT).unwrap();
        assert!(choice.actual_count >= MAX_TARGET_COUNT);
        let tall = covering_grid(1.0, 1e30, u32::MAX);
        assert_eq!(tall.target_count, MAX_TARGET_COUNT);
        assert!(u64::from(tall.rows) * u64::from(tall.cols) >= u64::from(MAX_TARGET_COUNT));
        assert_eq!(GridChoice { target_count: 0, cols: 0, rows: 0, actual_count: 0 }.internal_edge_count(), 0);
    }

    #[test]
    fn labels_mention_actual_count_when_different() {
        let choice = GridChoice {
            target_count: 100,
            cols: 13,
            rows: 8,
            actual_count: 104,
        };
        assert_eq!(grid_choice_label(&choice), "100 pieces (13x8, actual 104)");
    }
}
