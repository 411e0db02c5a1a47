use piecework_core::groups::{is_connected, NeighborRelation};
use piecework_core::piece::{GridPos, Side};
use piecework_core::{choose_grid, Point, Puzzle, PuzzleRules};

fn generated_2x2() -> Puzzle {
    let mut puzzle = Puzzle::generate(400.0, 400.0, 4, PuzzleRules::default(), 0xC0FFEE).unwrap();
    puzzle.scatter(0xBEEF);
    puzzle
}

#[test]
fn two_by_two_grid_has_four_internal_edges() {
    let choice = choose_grid(400.0, 400.0, 4).unwrap();
    assert_eq!((choice.rows, choice.cols, choice.actual_count), (2, 2, 4));
    let puzzle = generated_2x2();
    let info = puzzle.info();
    assert_eq!((info.rows, info.cols), (2, 2));
    assert_eq!(info.internal_edge_count(), 4);
    assert_eq!(puzzle.pieces().len(), 4);
}

#[test]
fn dragging_east_side_onto_neighbor_snaps_and_joins() {
    let mut puzzle = generated_2x2();
    let left = puzzle.piece_at(GridPos::new(0, 0)).unwrap();
    let right = puzzle.piece_at(GridPos::new(1, 0)).unwrap();

    // line the two up the way a player would: same rotation, east side near west side
    let right_group = puzzle.group_of(right).unwrap();
    let left_group = puzzle.group_of(left).unwrap();
    let delta = puzzle.piece(left).unwrap().rotation - puzzle.piece(right).unwrap().rotation;
    puzzle.rotate_group(right_group, delta, right).unwrap();
    let east = puzzle.world(left).unwrap().side_sequence(Side::East);
    let west = puzzle.world(right).unwrap().side_sequence(Side::West);
    let gap = west[2] - east[0] + Point::new(3.0, -2.0);
    puzzle.translate_group(left_group, gap).unwrap();

    let snap = puzzle.find_candidate(left, 1.0).expect("aligned sides should match");
    assert_eq!(snap.candidate, right);
    assert_eq!(snap.moving_side, Side::East);
    assert_eq!(snap.candidate_side, Side::West);
    assert!(snap.reversed);

    puzzle.commit_match(&snap).unwrap();
    assert_eq!(puzzle.group_of(left), puzzle.group_of(right));
    let members = puzzle.groups().members_of_piece(left).unwrap().to_vec();
    assert!(is_connected(&members, &puzzle.neighbors()));

    let east = puzzle.world(left).unwrap().side_sequence(Side::East);
    let west = puzzle.world(right).unwrap().side_sequence(Side::West);
    assert!(east[0].distance(west[2]) < 1e-3);
    assert!(east[2].distance(west[0]) < 1e-3);
}

#[test]
fn every_group_stays_connected_through_play() {
    let mut puzzle = Puzzle::generate(600.0, 400.0, 12, PuzzleRules::default(), 77).unwrap();
    puzzle.solve().unwrap();
    assert!(puzzle.is_complete());
    let count = puzzle.pieces().len();
    for id in (0..count).step_by(3) {
        puzzle.detach_piece(id).unwrap();
        assert!(puzzle.invalid_groups().is_empty(), "after detaching {id}");
    }
    for id in 0..count {
        let partner = {
            let relation = puzzle.neighbors();
            (0..count).find(|other| relation.are_neighbors(id, *other))
        };
        if let Some(partner) = partner {
            let _ = puzzle.merge_groups(id, partner);
        }
        assert!(puzzle.invalid_groups().is_empty(), "after merging {id}");
    }
    assert!(puzzle.is_complete());
}

#[test]
fn detaching_piece_moved_away_keeps_it_out_of_matches() {
    let mut puzzle = Puzzle::generate(300.0, 300.0, 9, PuzzleRules::default(), 5).unwrap();
    puzzle.solve().unwrap();
    let outcome = puzzle.detach_piece(4).unwrap();
    assert!(outcome.changed());
    assert_eq!(puzzle.groups().members(outcome.piece_group), Some(&[4][..]));
    assert_eq!(puzzle.progress().groups, 2);
    let far = Point::new(5000.0, 5000.0);
    puzzle.translate_group(outcome.piece_group, far).unwrap();
    assert!(puzzle.find_candidate(4, 1.0).is_none());
}
