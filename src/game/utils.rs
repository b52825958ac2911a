use chess::{Board, Color, File, Piece, Rank, Square};

use crate::game::coords::Side;
use crate::game::session::{EndReason, GamePhase};

pub fn color_to_side(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

/// Short status string shown to clients, e.g. `white_turn` or `black_wins`.
pub fn phase_status(phase: &GamePhase, side_to_move: Side, in_check: bool) -> String {
    match phase {
        GamePhase::NotStarted => "waiting".to_string(),
        GamePhase::InProgress if in_check => "check".to_string(),
        GamePhase::InProgress => format!("{}_turn", side_to_move),
        GamePhase::Ended(reason) => match reason {
            EndReason::Checkmate { winner } => format!("{}_wins", winner),
            EndReason::Resignation { resigner } => format!("{}_wins", resigner.opposite()),
            EndReason::Timeout { loser } => format!("{}_wins", loser.opposite()),
            EndReason::Stalemate => "stalemate".to_string(),
            EndReason::Draw | EndReason::DrawAgreed => "draw".to_string(),
        },
    }
}

#[derive(Default)]
struct Material {
    minors: u32,
    majors_or_pawns: u32,
    bishop_square_colors: Vec<usize>,
}

/// Check if neither side has enough material left to deliver mate.
///
/// Covers K v K, K+minor v K and K+B v K+B with bishops on the same colour.
pub fn has_insufficient_material(board: &Board) -> bool {
    let mut white = Material::default();
    let mut black = Material::default();

    for rank in 0..8 {
        for file in 0..8 {
            let square = Square::make_square(Rank::from_index(rank), File::from_index(file));
            let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) else {
                continue;
            };
            let material = match color {
                Color::White => &mut white,
                Color::Black => &mut black,
            };
            match piece {
                Piece::King => {}
                Piece::Knight => material.minors += 1,
                Piece::Bishop => {
                    material.minors += 1;
                    material.bishop_square_colors.push((rank + file) % 2);
                }
                Piece::Pawn | Piece::Rook | Piece::Queen => material.majors_or_pawns += 1,
            }
        }
    }

    if white.majors_or_pawns > 0 || black.majors_or_pawns > 0 {
        return false;
    }

    match (white.minors, black.minors) {
        (0, 0) | (1, 0) | (0, 1) => true,
        (1, 1) => {
            // Only same-coloured bishops are a dead draw.
            white.bishop_square_colors.len() == 1
                && black.bishop_square_colors.len() == 1
                && white.bishop_square_colors[0] == black.bishop_square_colors[0]
        }
        _ => false,
    }
}
