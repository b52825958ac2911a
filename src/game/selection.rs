//! Tap handling: deciding whether a tap selects, moves, reselects or clears.

use log::debug;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::SessionError;
use crate::game::coords::{from_notation, to_notation, Position, Side};
use crate::game::oracle::{Occupancy, PieceKind, RulesOracle};
use crate::game::session::GamePhase;

/// A selected piece and the squares the oracle says it can reach.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Selection {
    pub origin: Position,
    pub destinations: BTreeSet<Position>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Action {
    Ignore,
    Select {
        origin: Position,
        destinations: BTreeSet<Position>,
    },
    ClearSelection,
    CommitMove {
        from: Position,
        to: Position,
        promotion: Option<PieceKind>,
    },
}

/// Everything a tap decision depends on besides the current selection.
pub struct TapContext<'a> {
    pub occupancy: &'a Occupancy,
    pub side_to_move: Side,
    /// The side the acting player controls, or `None` when they control
    /// whichever side is to move (local play).
    pub controlled_side: Option<Side>,
    pub phase: &'a GamePhase,
    /// Piece proposed when a pawn reaches the last rank.
    pub promotion: PieceKind,
}

impl TapContext<'_> {
    fn acting_side(&self) -> Side {
        self.controlled_side.unwrap_or(self.side_to_move)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SelectionEngine {
    selection: Option<Selection>,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, origin: Position, destinations: BTreeSet<Position>) {
        self.selection = Some(Selection {
            origin,
            destinations,
        });
    }

    pub fn clear(&mut self) {
        self.selection = None;
    }

    /// Decides what a tap on `pos` means. Does not change the selection;
    /// the caller applies the returned action.
    pub fn handle_tap<O>(
        &self,
        pos: Position,
        ctx: &TapContext<'_>,
        oracle: &O,
    ) -> Result<Action, SessionError>
    where
        O: RulesOracle + ?Sized,
    {
        if *ctx.phase != GamePhase::InProgress {
            return Ok(Action::Ignore);
        }

        let acting = ctx.acting_side();
        let tapped = ctx.occupancy.at(pos);
        let owns_tapped = tapped.is_some_and(|occupant| occupant.side == acting);

        // Off-turn players may inspect their own pieces but nothing else.
        if acting != ctx.side_to_move && self.selection.is_none() && !owns_tapped {
            debug!("Ignoring off-turn tap on {}", to_notation(pos));
            return Ok(Action::Ignore);
        }

        if let Some(selection) = &self.selection {
            if selection.destinations.contains(&pos) {
                return Ok(Action::CommitMove {
                    from: selection.origin,
                    to: pos,
                    promotion: promotion_for(ctx, selection.origin, pos),
                });
            }
            if selection.origin == pos {
                return Ok(Action::ClearSelection);
            }
        }

        if !owns_tapped {
            return Ok(Action::ClearSelection);
        }

        let destinations: BTreeSet<Position> = oracle
            .legal_moves(to_notation(pos))?
            .into_iter()
            .map(from_notation)
            .collect();

        if destinations.is_empty() {
            debug!("{} has no legal moves", to_notation(pos));
            Ok(Action::ClearSelection)
        } else {
            Ok(Action::Select {
                origin: pos,
                destinations,
            })
        }
    }
}

fn promotion_for(ctx: &TapContext<'_>, from: Position, to: Position) -> Option<PieceKind> {
    let mover = ctx.occupancy.at(from)?;
    (mover.kind == PieceKind::Pawn && to.row() == mover.side.promotion_row()).then_some(ctx.promotion)
}
