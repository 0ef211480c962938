//! End-to-end rule scenarios driven through the public API only, the way
//! the session layer drives the engine: generate moves, pick one, apply it,
//! check for game over.

use checkers_core::{Board, Move, Pos, Side, Square};

// =============================================================================
// Turn flow
// =============================================================================

/// A full turn: a white man with an adjacent black man and an empty landing
/// square must produce exactly one capture move, and applying it clears the
/// victim and the source square without promoting.
#[test]
fn single_capture_turn() {
    let board = Board::from_squares(&[
        (Pos::new(5, 1), Square::WhiteMan),
        (Pos::new(4, 2), Square::BlackMan),
    ]);

    let forced = board.forced_positions(Side::White);
    assert_eq!(forced, vec![Pos::new(5, 1)]);

    let moves = board.selectable_moves(Pos::new(5, 1), Side::White);
    assert_eq!(
        moves,
        vec![Move::capture(Pos::new(5, 1), Pos::new(3, 3), Pos::new(4, 2))]
    );

    let next = board.apply(&moves[0]);
    assert_eq!(next.get(Pos::new(5, 1)).unwrap(), Square::Empty);
    assert_eq!(next.get(Pos::new(4, 2)).unwrap(), Square::Empty);
    // Row 3 is not the back rank; the man is not promoted.
    assert_eq!(next.get(Pos::new(3, 3)).unwrap(), Square::WhiteMan);

    assert!(next.is_game_over());
    assert_eq!(next.winner(), Some(Side::White));
}

/// Opening position: White has 7 quiet moves (the four men on row 5, two of
/// them edge-limited) and no captures anywhere.
#[test]
fn opening_moves() {
    let board = Board::initial();
    assert!(board.forced_positions(Side::White).is_empty());

    let mut total = 0;
    for row in 0..8 {
        for col in 0..8 {
            let moves = board.selectable_moves(Pos::new(row, col), Side::White);
            for mv in &moves {
                assert!(!mv.is_capture());
            }
            total += moves.len();
        }
    }
    assert_eq!(total, 7);
}

/// The side-wide rule: once any white piece can capture, the other white
/// pieces stop being selectable until the capture is resolved.
#[test]
fn forced_piece_blocks_the_rest() {
    let board = Board::from_squares(&[
        (Pos::new(5, 1), Square::WhiteMan),
        (Pos::new(4, 2), Square::BlackMan),
        (Pos::new(6, 6), Square::WhiteMan),
        (Pos::new(7, 3), Square::WhiteKing),
    ]);

    assert!(board.selectable_moves(Pos::new(6, 6), Side::White).is_empty());
    assert!(board.selectable_moves(Pos::new(7, 3), Side::White).is_empty());
    assert!(!board.selectable_moves(Pos::new(5, 1), Side::White).is_empty());

    // The same pieces move freely once the capture is gone.
    let resolved = board.apply(&board.selectable_moves(Pos::new(5, 1), Side::White)[0]);
    assert!(!resolved.selectable_moves(Pos::new(6, 6), Side::White).is_empty());
}

// =============================================================================
// Kings
// =============================================================================

/// A freshly promoted king slides the full diagonal on its next turn.
#[test]
fn promotion_then_flight() {
    let board = Board::from_squares(&[(Pos::new(1, 2), Square::WhiteMan)]);
    let promoting = board
        .valid_moves(Pos::new(1, 2), Side::White)
        .into_iter()
        .find(|m| m.to == Pos::new(0, 3))
        .unwrap();
    let board = board.apply(&promoting);
    assert_eq!(board.get(Pos::new(0, 3)).unwrap(), Square::WhiteKing);

    let slides = board.valid_moves(Pos::new(0, 3), Side::White);
    // Down-left to (3, 0), down-right to (4, 7).
    assert_eq!(slides.len(), 7);
    assert!(slides.contains(&Move::step(Pos::new(0, 3), Pos::new(3, 0))));
    assert!(slides.contains(&Move::step(Pos::new(0, 3), Pos::new(4, 7))));
}

/// A king two squares short of a lone man captures it from a distance and
/// may choose among every empty square beyond it; a second victim lined up
/// behind one landing square extends that branch into a chain.
#[test]
fn flying_king_chain() {
    let board = Board::from_squares(&[
        (Pos::new(7, 2), Square::WhiteKing),
        (Pos::new(5, 4), Square::BlackMan),
        (Pos::new(3, 4), Square::BlackMan),
    ]);

    let moves = board.capture_moves(Pos::new(7, 2), Side::White);
    let max_hops = moves.iter().map(Move::hops).max().unwrap();
    assert_eq!(max_hops, 2);

    let full = moves.iter().find(|m| m.hops() == 2).unwrap();
    let cleared = board.apply(full);
    assert_eq!(cleared.count(Side::Black), 0);
    assert_eq!(cleared.winner(), Some(Side::White));
}

// =============================================================================
// Wire parity
// =============================================================================

/// The serialized forms must match what the session and persistence layers
/// store and emit: string tags for squares and sides, nested move records
/// with optional fields omitted.
#[test]
fn wire_parity() {
    let board = Board::initial();
    let json = serde_json::to_string(&board).unwrap();
    assert!(json.starts_with("{\"squares\":[["));
    assert!(json.contains("\"NONE\""));
    assert!(json.contains("\"WHITE\""));
    assert!(json.contains("\"BLACK\""));
    assert!(!json.contains("KING"));

    let restored: Board = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, board);

    // A chain parsed from client-shaped JSON equals the generated value, so
    // exact-match validation works across the wire.
    let board = Board::from_squares(&[
        (Pos::new(6, 0), Square::WhiteMan),
        (Pos::new(5, 1), Square::BlackMan),
        (Pos::new(3, 3), Square::BlackMan),
    ]);
    let generated = board.valid_moves(Pos::new(6, 0), Side::White);
    let wire = r#"{
        "from": {"row": 6, "col": 0},
        "to": {"row": 4, "col": 2},
        "captured": {"row": 5, "col": 1},
        "chain": {
            "from": {"row": 4, "col": 2},
            "to": {"row": 2, "col": 4},
            "captured": {"row": 3, "col": 3}
        }
    }"#;
    let parsed: Move = serde_json::from_str(wire).unwrap();
    assert_eq!(generated, vec![parsed.clone()]);
    assert!(board.apply_validated(&parsed, Side::White).is_ok());
}
