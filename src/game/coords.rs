//! Board-relative grid positions and their file/rank notation.
//!
//! Row 0 is rank 8 and column 0 is file `a`, independent of which side is
//! drawn at the bottom. Orientation only changes [`display_order`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Row a pawn of this side promotes on.
    pub fn promotion_row(self) -> u8 {
        match self {
            Side::White => 0,
            Side::Black => 7,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => f.write_str("white"),
            Side::Black => f.write_str("black"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" | "w" => Ok(Side::White),
            "black" | "b" => Ok(Side::Black),
            _ => Err(format!("unknown side: {s}")),
        }
    }
}

/// A square on the 8x8 grid. Both coordinates are always in `0..8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    pub fn new(row: u8, col: u8) -> Option<Position> {
        if row < 8 && col < 8 {
            Some(Position { row, col })
        } else {
            None
        }
    }

    pub fn row(self) -> u8 {
        self.row
    }

    pub fn col(self) -> u8 {
        self.col
    }
}

/// A file letter plus a rank digit, e.g. `e4`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotationSquare {
    file: char,
    rank: u8,
}

impl NotationSquare {
    pub fn file(self) -> char {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl fmt::Display for NotationSquare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file, self.rank)
    }
}

impl FromStr for NotationSquare {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        match bytes {
            [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Ok(NotationSquare {
                file: *file as char,
                rank: rank - b'0',
            }),
            _ => Err(SessionError::InvalidNotation(s.to_string())),
        }
    }
}

impl TryFrom<String> for NotationSquare {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NotationSquare> for String {
    fn from(square: NotationSquare) -> Self {
        square.to_string()
    }
}

pub fn to_notation(pos: Position) -> NotationSquare {
    NotationSquare {
        file: (b'a' + pos.col) as char,
        rank: 8 - pos.row,
    }
}

pub fn from_notation(square: NotationSquare) -> Position {
    Position {
        row: 8 - square.rank,
        col: square.file as u8 - b'a',
    }
}

/// Parses and converts in one step, for squares arriving as text.
pub fn parse_position(text: &str) -> Result<Position, SessionError> {
    text.parse::<NotationSquare>().map(from_notation)
}

/// Squares in the order they are drawn, top-left to bottom-right.
///
/// With White at the bottom rank 8 is the top row and files run a to h.
/// With Black at the bottom both axes are reversed.
pub fn display_order(orientation: Side) -> Vec<Position> {
    let axis: Vec<u8> = match orientation {
        Side::White => (0..8).collect(),
        Side::Black => (0..8).rev().collect(),
    };

    axis.iter()
        .flat_map(|&row| axis.iter().map(move |&col| Position { row, col }))
        .collect()
}
