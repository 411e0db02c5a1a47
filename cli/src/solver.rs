//! Headless player: repeatedly picks a piece with a loose grid neighbor, turns it to the
//! neighbor's rotation, and drags it next to that neighbor through the table controller.

use piecework::{EventSink, GameTable, TableAction};
use piecework_core::piece::Side;
use piecework_core::point::angle_matches;
use piecework_core::{PieceId, Point, Puzzle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

#[derive(clap::Args, Clone, Debug)]
pub(crate) struct SolverArgs {
    /// Stop after this many drags even if the puzzle is unfinished.
    #[arg(long, default_value_t = 10_000)]
    pub max_drags: usize,
    /// Pointer error at release, in world pixels.
    #[arg(long, default_value_t = 1.0)]
    pub jitter_px: f32,
    /// Intermediate pointer updates per drag.
    #[arg(long, default_value_t = 4)]
    pub steps: usize,
    #[arg(long)]
    pub bot_seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SolveSummary {
    pub drags: usize,
    pub taps: usize,
    pub complete: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Move {
    piece: PieceId,
    target: PieceId,
    side: Side,
}

/// Every `(piece, side)` whose grid neighbor sits in another group.
fn open_moves(puzzle: &Puzzle) -> Vec<Move> {
    let mut moves = Vec::new();
    for piece in puzzle.pieces() {
        for side in Side::ALL {
            let Some(target) = piece.grid_pos.step(side).and_then(|pos| puzzle.piece_at(pos)) else {
                continue;
            };
            if !puzzle.groups().same_group(piece.id, target) {
                moves.push(Move {
                    piece: piece.id,
                    target,
                    side,
                });
            }
        }
    }
    moves
}

/// Pointer travel that lays `side` of the piece against the target's opposite side.
fn alignment_delta(puzzle: &Puzzle, step: Move) -> Option<Point> {
    let moving = puzzle.world(step.piece)?;
    let target = puzzle.world(step.target)?;
    let (corner_a, _) = step.side.corner_keys();
    let (_, corner_d) = step.side.opposite().corner_keys();
    Some(target.corners.get(corner_d) - moving.corners.get(corner_a))
}

fn rotation_of(puzzle: &Puzzle, id: PieceId) -> f32 {
    puzzle.piece(id).map_or(0.0, |piece| piece.rotation)
}

pub(crate) fn run(
    table: &mut GameTable,
    args: &SolverArgs,
    sink: &mut impl EventSink,
) -> Result<SolveSummary, Box<dyn std::error::Error>> {
    let mut rng = match args.bot_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let jitter = args.jitter_px.max(0.0);
    let steps = args.steps.max(1);
    let mut summary = SolveSummary::default();

    while summary.drags < args.max_drags && !table.puzzle().is_complete() {
        let moves = open_moves(table.puzzle());
        if moves.is_empty() {
            break;
        }
        let step = moves[rng.random_range(0..moves.len())];

        let rules = *table.puzzle().rules();
        if rules.rotation_enabled && rules.rotation_step_deg > 0.0 {
            let turns = (360.0 / rules.rotation_step_deg).round() as usize;
            for _ in 0..turns {
                let puzzle = table.puzzle();
                let same =
                    angle_matches(rotation_of(puzzle, step.piece), rotation_of(puzzle, step.target), 0.5);
                if same || puzzle.groups().same_group(step.piece, step.target) {
                    break;
                }
                table.apply(TableAction::Tap { piece: step.piece }, sink);
                summary.taps += 1;
            }
        }
        if table.puzzle().groups().same_group(step.piece, step.target) {
            continue;
        }

        let Some(delta) = alignment_delta(table.puzzle(), step) else {
            continue;
        };
        let start = table.puzzle().position(step.piece).unwrap_or_default();
        let noise = Point::new(
            rng.random_range(-jitter..=jitter),
            rng.random_range(-jitter..=jitter),
        );
        let end = start + delta + noise;
        table.apply(
            TableAction::BeginDrag {
                piece: step.piece,
                pointer: start,
                detach: false,
            },
            sink,
        );
        for idx in 1..steps {
            let t = idx as f32 / steps as f32;
            table.apply(
                TableAction::DragMove {
                    pointer: start.lerp(end, t),
                },
                sink,
            );
        }
        table.apply(TableAction::DragEnd { pointer: end }, sink);
        summary.drags += 1;
        debug!(
            piece = step.piece,
            target = step.target,
            side = step.side.name(),
            groups = table.puzzle().progress().groups,
            "bot drag"
        );
    }

    summary.complete = table.puzzle().is_complete();
    Ok(summary)
}
