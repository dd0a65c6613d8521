use super::*;
use engine_core::PositionHistory;

fn mv(s: &str) -> Move {
    s.parse().unwrap()
}

#[test]
fn test_startpos_has_twenty_moves() {
    let start = ChessPosition::from_fen(STARTPOS_FEN).unwrap();
    assert_eq!(start.legal_moves().len(), 20);
    assert!(!start.is_black_to_move());
    assert_eq!(start.game_ply(), 0);
    assert!(start.same_board(&ChessPosition::startpos()));
}

#[test]
fn test_black_moves_are_mirrored() {
    let start = ChessPosition::startpos();
    let after_e4 = start.apply(mv("e2e4")).unwrap();
    assert!(after_e4.is_black_to_move());

    // e7e5 seen from black's side is e2e4
    let moves = after_e4.legal_moves();
    assert!(moves.contains(&mv("e2e4")));
    assert!(!moves.contains(&mv("e7e5")));

    let after_e5 = after_e4.apply(mv("e7e5").mirror()).unwrap();
    assert!(!after_e5.is_black_to_move());
    assert_eq!(after_e5.game_ply(), 2);
}

#[test]
fn test_fifty_move_counter() {
    let fen = "4k3/8/8/8/8/8/4P3/4K2R w K - 7 30";
    let pos = ChessPosition::from_fen(fen).unwrap();
    assert_eq!(pos.rule50_ply(), 7);
    assert_eq!(pos.game_ply(), 58);

    let rook_move = pos.apply(mv("h1h2")).unwrap();
    assert_eq!(rook_move.rule50_ply(), 8);

    let pawn_move = pos.apply(mv("e2e3")).unwrap();
    assert_eq!(pawn_move.rule50_ply(), 0);
}

#[test]
fn test_illegal_move_rejected() {
    let start = ChessPosition::startpos();
    let err = start.apply(mv("e2e5")).unwrap_err();
    assert!(matches!(err, PositionError::IllegalMove { .. }));
}

#[test]
fn test_invalid_fen() {
    assert!(ChessPosition::from_fen("not a fen").is_err());
}

#[test]
fn test_transposition_has_equal_hash() {
    let start = ChessPosition::startpos();
    let a = start
        .apply(mv("g1f3"))
        .and_then(|p| p.apply(mv("g8f6").mirror()))
        .and_then(|p| p.apply(mv("b1c3")))
        .unwrap();
    let b = start
        .apply(mv("b1c3"))
        .and_then(|p| p.apply(mv("g8f6").mirror()))
        .and_then(|p| p.apply(mv("g1f3")))
        .unwrap();
    assert_eq!(a.hash(), b.hash());
    assert!(a.same_board(&b));
    assert_ne!(a.hash(), start.hash());
}

#[test]
fn test_checkmate_outcome() {
    // Fool's mate, white to move and mated
    let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
    let pos = ChessPosition::from_fen(fen).unwrap();
    assert_eq!(pos.outcome(), Some(GameResult::Loss));
    assert!(pos.legal_moves().is_empty());
    assert_eq!(ChessPosition::startpos().outcome(), None);
}

#[test]
fn test_history_tracks_positions() {
    let mut history = PositionHistory::new(ChessPosition::startpos());
    history.append(mv("d2d4")).unwrap();
    assert!(history.is_black_to_move());
    history.append(mv("d7d5").mirror()).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.last().game_ply(), 2);
    assert!(history.append(mv("d4d6")).is_err());
    assert_eq!(history.len(), 3);

    history.reset(ChessPosition::startpos());
    assert_eq!(history.len(), 1);
}
