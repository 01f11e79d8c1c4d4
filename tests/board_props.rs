use battlebots::board::{attacked_cells, fallback_target, BoardState};
use battlebots::domain::{AttackOutcome, AttackRecord, AttackTarget};
use battlebots::{CellState, GridCell, TargetError};
use proptest::prelude::*;

const GRID: u8 = 5;

fn record(x: u8, y: u8, hit: bool) -> AttackRecord {
    AttackRecord {
        attack: AttackTarget {
            origin: GridCell::new(x, y),
            human: false,
        },
        results: vec![AttackOutcome {
            origin: GridCell::new(x, y),
            hit,
            destroyed: None,
            ship_type: None,
        }],
    }
}

fn attacks() -> impl Strategy<Value = Vec<AttackRecord>> {
    prop::collection::vec((0..GRID + 2, 0..GRID + 2, any::<bool>()), 0..40)
        .prop_map(|shots| shots.into_iter().map(|(x, y, hit)| record(x, y, hit)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn reconstruction_is_deterministic(history in attacks()) {
        let a = BoardState::from_attacks(GRID, &history);
        let b = BoardState::from_attacks(GRID, &history);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.grid_size(), GRID as usize);
        prop_assert!(a.rows().iter().all(|row| row.len() == GRID as usize));
    }

    #[test]
    fn last_result_wins(history in attacks()) {
        let board = BoardState::from_attacks(GRID, &history);
        for x in 0..GRID {
            for y in 0..GRID {
                let cell = GridCell::new(x, y);
                let expected = history
                    .iter()
                    .flat_map(|r| r.results.iter())
                    .filter(|o| o.origin == cell)
                    .last()
                    .map(|o| if o.hit { CellState::Hit } else { CellState::Miss })
                    .unwrap_or(CellState::NotPlayed);
                prop_assert_eq!(board.get(cell), Some(expected));
            }
        }
    }

    #[test]
    fn fallback_is_smallest_free_cell(history in attacks()) {
        let attacked = attacked_cells(&history);
        let smallest = (0..GRID)
            .flat_map(|x| (0..GRID).map(move |y| GridCell::new(x, y)))
            .filter(|cell| !attacked.contains(cell))
            .min();
        match fallback_target(GRID, &history) {
            Ok(cell) => {
                prop_assert_eq!(Some(cell), smallest);
                prop_assert!(cell.in_bounds(GRID));
                prop_assert!(!attacked.contains(&cell));
            }
            Err(TargetError::NoAvailableTarget) => prop_assert_eq!(smallest, None),
        }
    }
}

#[test]
fn full_board_has_no_fallback() {
    let history: Vec<_> = (0..GRID)
        .flat_map(|x| (0..GRID).map(move |y| record(x, y, false)))
        .collect();
    assert_eq!(
        fallback_target(GRID, &history),
        Err(TargetError::NoAvailableTarget)
    );
}

#[test]
fn board_serializes_as_codes() {
    let board = BoardState::from_attacks(GRID, &[record(1, 0, true), record(0, 2, false)]);
    let value = serde_json::to_value(&board).unwrap();
    assert_eq!(value[0][1], 2);
    assert_eq!(value[2][0], 1);
    assert_eq!(value[4][4], -1);
}
