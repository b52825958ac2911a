//! The rules oracle: legality, move application and terminal-state detection.
//!
//! The session never looks at piece placement itself; it asks the oracle.
//! [`ChessOracle`] answers using the `chess` crate.

use chess::{Board, BoardStatus, ChessMove, File, Game, MoveGen, Piece, Rank, Square};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::SessionError;
use crate::game::coords::{from_notation, to_notation, NotationSquare, Position, Side};
use crate::game::utils::{color_to_side, has_insufficient_material};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct Occupant {
    pub side: Side,
    pub kind: PieceKind,
}

/// Read-only picture of which piece stands where.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Occupancy {
    squares: [[Option<Occupant>; 8]; 8],
}

impl Occupancy {
    pub fn at(&self, pos: Position) -> Option<Occupant> {
        self.squares[pos.row() as usize][pos.col() as usize]
    }

    pub fn set(&mut self, pos: Position, occupant: Option<Occupant>) {
        self.squares[pos.row() as usize][pos.col() as usize] = occupant;
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct PositionSnapshot {
    pub fen: String,
    pub side_to_move: Side,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize)]
pub struct OracleStatus {
    pub in_check: bool,
    pub in_checkmate: bool,
    pub in_stalemate: bool,
    pub in_draw: bool,
}

impl OracleStatus {
    /// Check alone never ends a game.
    pub fn is_terminal(&self) -> bool {
        self.in_checkmate || self.in_stalemate || self.in_draw
    }
}

pub trait RulesOracle {
    /// Legal destinations for the piece on `from`; empty if there is no piece
    /// or it cannot move.
    fn legal_moves(&self, from: NotationSquare) -> Result<BTreeSet<NotationSquare>, SessionError>;

    fn apply_move(
        &mut self,
        from: NotationSquare,
        to: NotationSquare,
        promotion: Option<PieceKind>,
    ) -> Result<PositionSnapshot, SessionError>;

    fn status(&self, snapshot: &PositionSnapshot) -> Result<OracleStatus, SessionError>;

    fn occupancy(&self) -> Result<Occupancy, SessionError>;

    fn snapshot(&self) -> PositionSnapshot;
}

const FIFTY_MOVE_PLIES: u32 = 100;

pub struct ChessOracle {
    game: Game,
    /// Plies since the last capture or pawn move. `Game` drops the FEN
    /// halfmove counter, so it is carried here.
    halfmove_clock: u32,
}

impl ChessOracle {
    pub fn new() -> Self {
        Self {
            game: Game::new(),
            halfmove_clock: 0,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, SessionError> {
        let board = Board::from_str(fen)
            .map_err(|e| SessionError::OracleUnavailable(format!("bad position {fen:?}: {e:?}")))?;
        let halfmove_clock = fen
            .split_whitespace()
            .nth(4)
            .and_then(|field| field.parse().ok())
            .unwrap_or(0);
        Ok(Self {
            game: Game::new_with_board(board),
            halfmove_clock,
        })
    }

    fn board(&self) -> Board {
        self.game.current_position()
    }
}

impl Default for ChessOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn to_square(square: NotationSquare) -> Square {
    let rank = (square.rank() - 1) as usize;
    let file = (square.file() as u8 - b'a') as usize;
    Square::make_square(Rank::from_index(rank), File::from_index(file))
}

fn square_to_notation(square: Square) -> NotationSquare {
    let row = 7 - square.get_rank().to_index() as u8;
    let col = square.get_file().to_index() as u8;
    // Rank and file indices are always below 8.
    let pos = Position::new(row, col).unwrap_or_else(|| unreachable!("square index out of range"));
    to_notation(pos)
}

fn to_piece(kind: PieceKind) -> Piece {
    match kind {
        PieceKind::Pawn => Piece::Pawn,
        PieceKind::Knight => Piece::Knight,
        PieceKind::Bishop => Piece::Bishop,
        PieceKind::Rook => Piece::Rook,
        PieceKind::Queen => Piece::Queen,
        PieceKind::King => Piece::King,
    }
}

fn to_kind(piece: Piece) -> PieceKind {
    match piece {
        Piece::Pawn => PieceKind::Pawn,
        Piece::Knight => PieceKind::Knight,
        Piece::Bishop => PieceKind::Bishop,
        Piece::Rook => PieceKind::Rook,
        Piece::Queen => PieceKind::Queen,
        Piece::King => PieceKind::King,
    }
}

impl RulesOracle for ChessOracle {
    fn legal_moves(&self, from: NotationSquare) -> Result<BTreeSet<NotationSquare>, SessionError> {
        let source = to_square(from);
        let board = self.board();
        Ok(MoveGen::new_legal(&board)
            .filter(|m| m.get_source() == source)
            .map(|m| square_to_notation(m.get_dest()))
            .collect())
    }

    fn apply_move(
        &mut self,
        from: NotationSquare,
        to: NotationSquare,
        promotion: Option<PieceKind>,
    ) -> Result<PositionSnapshot, SessionError> {
        let chess_move = ChessMove::new(to_square(from), to_square(to), promotion.map(to_piece));
        let illegal = || SessionError::IllegalMove {
            from: from.to_string(),
            to: to.to_string(),
        };

        let board = self.board();
        if !board.legal(chess_move) {
            return Err(illegal());
        }
        let irreversible = board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            || board.piece_on(chess_move.get_dest()).is_some();
        if !self.game.make_move(chess_move) {
            return Err(illegal());
        }

        self.halfmove_clock = if irreversible {
            0
        } else {
            self.halfmove_clock.saturating_add(1)
        };

        debug!("Applied {} to reach {}", chess_move, self.board());
        Ok(self.snapshot())
    }

    fn status(&self, snapshot: &PositionSnapshot) -> Result<OracleStatus, SessionError> {
        let board = Board::from_str(&snapshot.fen)
            .map_err(|e| SessionError::OracleUnavailable(format!("bad snapshot: {e:?}")))?;
        let board_status = board.status();

        // Repetition and the fifty-move rule need the game history, which only
        // exists for the live position.
        let claimable = board.get_hash() == self.board().get_hash()
            && (self.game.can_declare_draw() || self.halfmove_clock >= FIFTY_MOVE_PLIES);

        Ok(OracleStatus {
            in_check: board.checkers().popcnt() > 0,
            in_checkmate: board_status == BoardStatus::Checkmate,
            in_stalemate: board_status == BoardStatus::Stalemate,
            in_draw: board_status == BoardStatus::Ongoing
                && (has_insufficient_material(&board) || claimable),
        })
    }

    fn occupancy(&self) -> Result<Occupancy, SessionError> {
        let board = self.board();
        let mut occupancy = Occupancy::default();
        for row in 0..8 {
            for col in 0..8 {
                let Some(pos) = Position::new(row, col) else {
                    continue;
                };
                let square = to_square(to_notation(pos));
                if let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) {
                    occupancy.set(
                        pos,
                        Some(Occupant {
                            side: color_to_side(color),
                            kind: to_kind(piece),
                        }),
                    );
                }
            }
        }
        Ok(occupancy)
    }

    fn snapshot(&self) -> PositionSnapshot {
        let board = self.board();
        PositionSnapshot {
            fen: board.to_string(),
            side_to_move: color_to_side(board.side_to_move()),
        }
    }
}

/// Occupant of a notation square.
pub fn occupant_at(occupancy: &Occupancy, square: NotationSquare) -> Option<Occupant> {
    occupancy.at(from_notation(square))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(text: &str) -> NotationSquare {
        text.parse().unwrap()
    }

    #[test]
    fn test_opening_knight_moves() {
        let oracle = ChessOracle::new();
        let moves = oracle.legal_moves(sq("g1")).unwrap();
        assert_eq!(moves, [sq("f3"), sq("h3")].into_iter().collect());
    }

    #[test]
    fn test_empty_square_has_no_moves() {
        let oracle = ChessOracle::new();
        assert!(oracle.legal_moves(sq("e4")).unwrap().is_empty());
    }

    #[test]
    fn test_off_turn_piece_has_no_moves() {
        let oracle = ChessOracle::new();
        assert!(oracle.legal_moves(sq("e7")).unwrap().is_empty());
    }

    #[test]
    fn test_apply_and_reject() {
        let mut oracle = ChessOracle::new();
        let snapshot = oracle.apply_move(sq("e2"), sq("e4"), None).unwrap();
        assert_eq!(snapshot.side_to_move, Side::Black);

        let err = oracle.apply_move(sq("e4"), sq("e6"), None).unwrap_err();
        assert_eq!(
            err,
            SessionError::IllegalMove {
                from: "e4".to_string(),
                to: "e6".to_string()
            }
        );
    }

    #[test]
    fn test_occupancy_start() {
        let occupancy = ChessOracle::new().occupancy().unwrap();
        assert_eq!(
            occupant_at(&occupancy, sq("e1")),
            Some(Occupant {
                side: Side::White,
                kind: PieceKind::King
            })
        );
        assert_eq!(
            occupant_at(&occupancy, sq("d8")),
            Some(Occupant {
                side: Side::Black,
                kind: PieceKind::Queen
            })
        );
        assert_eq!(occupant_at(&occupancy, sq("e4")), None);
    }

    #[test]
    fn test_checkmate_status() {
        let mut oracle = ChessOracle::new();
        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            oracle.apply_move(sq(from), sq(to), None).unwrap();
        }
        let status = oracle.status(&oracle.snapshot()).unwrap();
        assert!(status.in_check);
        assert!(status.in_checkmate);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_stalemate_status() {
        let oracle = ChessOracle::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let status = oracle.status(&oracle.snapshot()).unwrap();
        assert!(status.in_stalemate);
        assert!(!status.in_check);
    }

    #[test]
    fn test_insufficient_material_is_draw() {
        let oracle = ChessOracle::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let status = oracle.status(&oracle.snapshot()).unwrap();
        assert!(status.in_draw);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_fifty_move_rule_from_loaded_position() {
        let mut oracle = ChessOracle::from_fen("8/8/8/4k3/8/8/8/R3K3 w - - 99 60").unwrap();
        assert!(!oracle.status(&oracle.snapshot()).unwrap().in_draw);

        oracle.apply_move(sq("a1"), sq("a2"), None).unwrap();
        let status = oracle.status(&oracle.snapshot()).unwrap();
        assert!(status.in_draw);
        assert!(!status.in_checkmate);
    }

    #[test]
    fn test_pawn_move_resets_halfmove_clock() {
        let mut oracle = ChessOracle::from_fen("8/8/8/4k3/8/8/P7/R3K3 w - - 99 60").unwrap();
        oracle.apply_move(sq("a2"), sq("a3"), None).unwrap();
        assert!(!oracle.status(&oracle.snapshot()).unwrap().in_draw);
    }

    #[test]
    fn test_promotion_requires_piece() {
        let mut oracle = ChessOracle::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        assert!(oracle.apply_move(sq("a7"), sq("a8"), None).is_err());
        let snapshot = oracle
            .apply_move(sq("a7"), sq("a8"), Some(PieceKind::Queen))
            .unwrap();
        assert!(snapshot.fen.starts_with("Q7/"));
    }

    #[test]
    fn test_bad_fen() {
        assert!(matches!(
            ChessOracle::from_fen("not a position"),
            Err(SessionError::OracleUnavailable(_))
        ));
    }
}
