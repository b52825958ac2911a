//! One game session: turn, selection, clock and result, driven by discrete
//! events (taps, ticks, resignations, draw offers).
//!
//! Every event is handled to completion before the next one. A committed
//! move updates the oracle, the clock and the phase in a single call, so no
//! tick can observe a move that is applied but not yet reflected.

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::Settings;
use crate::error::SessionError;
use crate::game::clock::{ClockEngine, ClockPhase, ClockState, TimeControl, TimeControlPolicy};
use crate::game::coords::{display_order, from_notation, to_notation, NotationSquare, Position, Side};
use crate::game::oracle::{occupant_at, Occupant, OracleStatus, PieceKind, RulesOracle};
use crate::game::selection::{Action, Selection, SelectionEngine, TapContext};
use crate::game::utils::phase_status;

pub const RETRY_NOTICE: &str = "move not applied, try again";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Local,
    Online,
    Ai,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EndReason {
    Checkmate { winner: Side },
    Draw,
    Stalemate,
    Resignation { resigner: Side },
    Timeout { loser: Side },
    DrawAgreed,
}

/// `Ended` is absorbing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "phase", content = "result", rename_all = "snake_case")]
pub enum GamePhase {
    NotStarted,
    InProgress,
    Ended(EndReason),
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub mode: GameMode,
    /// `None` plays without a clock.
    pub time_control: Option<TimeControlPolicy>,
    /// The side the local player controls in online and AI games; also the
    /// initial board orientation.
    pub player_side: Side,
    pub settings: Settings,
}

impl SessionConfig {
    pub fn new(mode: GameMode, time_control: TimeControl, player_side: Side) -> Self {
        Self {
            mode,
            time_control: time_control.policy(),
            player_side,
            settings: Settings::default(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: Option<TimeControlPolicy>) -> Self {
        self.time_control = policy;
        self
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct MoveRecord {
    pub side: Side,
    pub from: NotationSquare,
    pub to: NotationSquare,
    pub promotion: Option<PieceKind>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SelectionView {
    pub origin: NotationSquare,
    pub destinations: Vec<NotationSquare>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SquareView {
    pub square: NotationSquare,
    pub row: u8,
    pub col: u8,
    pub piece: Option<Occupant>,
    pub selected: bool,
    pub destination: bool,
}

/// Read-only snapshot handed to the UI after every event.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SessionView {
    pub mode: GameMode,
    pub phase: GamePhase,
    pub status: String,
    pub side_to_move: Side,
    pub player_side: Side,
    pub orientation: Side,
    pub fen: String,
    pub in_check: bool,
    pub selection: Option<SelectionView>,
    pub clock: Option<ClockState>,
    pub last_move: Option<MoveRecord>,
    pub draw_offer: Option<Side>,
    pub notice: Option<String>,
    pub squares: Vec<SquareView>,
}

pub struct SessionController<O: RulesOracle> {
    config: SessionConfig,
    oracle: O,
    selection: SelectionEngine,
    clock: Option<ClockEngine>,
    phase: GamePhase,
    side_to_move: Side,
    orientation: Side,
    in_check: bool,
    draw_offer: Option<Side>,
    history: Vec<MoveRecord>,
    notice: Option<String>,
    torn_down: bool,
}

impl<O: RulesOracle> SessionController<O> {
    pub fn new(config: SessionConfig, oracle: O) -> Self {
        let side_to_move = oracle.snapshot().side_to_move;
        Self {
            clock: config.time_control.map(ClockEngine::new),
            orientation: config.player_side,
            config,
            oracle,
            selection: SelectionEngine::new(),
            phase: GamePhase::NotStarted,
            side_to_move,
            in_check: false,
            draw_offer: None,
            history: Vec::new(),
            notice: None,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.selection()
    }

    pub fn clock_state(&self) -> Option<ClockState> {
        self.clock.as_ref().map(ClockEngine::state)
    }

    pub fn clock(&self) -> Option<&ClockEngine> {
        self.clock.as_ref()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn draw_offer(&self) -> Option<Side> {
        self.draw_offer
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// True while the game accepts moves, ticks and offers.
    pub fn is_live(&self) -> bool {
        self.phase == GamePhase::InProgress && !self.torn_down
    }

    /// The side the local player is acting for right now.
    pub fn acting_side(&self) -> Side {
        match self.config.mode {
            GameMode::Local => self.side_to_move,
            GameMode::Online | GameMode::Ai => self.config.player_side,
        }
    }

    fn controlled_side(&self) -> Option<Side> {
        match self.config.mode {
            GameMode::Local => None,
            GameMode::Online | GameMode::Ai => Some(self.config.player_side),
        }
    }

    pub fn start(&mut self) {
        if self.phase != GamePhase::NotStarted || self.torn_down {
            debug!("start ignored in {:?}", self.phase);
            return;
        }
        self.phase = GamePhase::InProgress;
        if let (Some(clock), Some(policy)) = (self.clock.as_mut(), self.config.time_control) {
            clock.start(policy, self.side_to_move);
        }
        info!("{:?} game started, {} to move", self.config.mode, self.side_to_move);
    }

    pub fn tap(&mut self, pos: Position) -> Action {
        self.notice = None;
        if self.torn_down {
            debug!("Tap on {:?} after teardown ignored", pos);
            return Action::Ignore;
        }

        let occupancy = match self.oracle.occupancy() {
            Ok(occupancy) => occupancy,
            Err(e) => {
                self.oracle_failed(e);
                return Action::ClearSelection;
            }
        };
        let ctx = TapContext {
            occupancy: &occupancy,
            side_to_move: self.side_to_move,
            controlled_side: self.controlled_side(),
            phase: &self.phase,
            promotion: self.config.settings.default_promotion(),
        };

        let action = match self.selection.handle_tap(pos, &ctx, &self.oracle) {
            Ok(action) => action,
            Err(e) => {
                self.oracle_failed(e);
                return Action::ClearSelection;
            }
        };

        match &action {
            Action::Ignore => {}
            Action::Select {
                origin,
                destinations,
            } => self.selection.select(*origin, destinations.clone()),
            Action::ClearSelection => self.selection.clear(),
            Action::CommitMove {
                from,
                to,
                promotion,
            } => {
                let mover = self.side_to_move;
                self.commit(*from, *to, *promotion, mover);
            }
        }
        action
    }

    /// Plays a move from the opponent's move source (remote player or engine).
    ///
    /// Only accepted in online and AI games, while it is the opponent's turn.
    pub fn apply_external_move(&mut self, from: NotationSquare, to: NotationSquare) -> bool {
        self.notice = None;
        if !self.is_live()
            || self.config.mode == GameMode::Local
            || self.side_to_move == self.config.player_side
        {
            warn!("External move {}-{} rejected in {:?}", from, to, self.phase);
            return false;
        }

        let promotion = match self.oracle.occupancy() {
            Ok(occupancy) => occupant_at(&occupancy, from).and_then(|occupant| {
                (occupant.kind == PieceKind::Pawn
                    && from_notation(to).row() == occupant.side.promotion_row())
                .then_some(self.config.settings.default_promotion())
            }),
            Err(e) => {
                self.oracle_failed(e);
                return false;
            }
        };

        let mover = self.side_to_move;
        self.commit(from_notation(from), from_notation(to), promotion, mover)
    }

    fn commit(&mut self, from: Position, to: Position, promotion: Option<PieceKind>, mover: Side) -> bool {
        let (from, to) = (to_notation(from), to_notation(to));

        let snapshot = match self.oracle.apply_move(from, to, promotion) {
            Ok(snapshot) => snapshot,
            Err(SessionError::IllegalMove { .. }) => {
                warn!("Oracle rejected {}-{} for {}", from, to, mover);
                self.selection.clear();
                return false;
            }
            Err(e) => {
                self.oracle_failed(e);
                return false;
            }
        };

        self.selection.clear();
        self.history.push(MoveRecord {
            side: mover,
            from,
            to,
            promotion,
        });
        if let Some(clock) = self.clock.as_mut() {
            clock.on_move_committed(mover);
        }
        if self.draw_offer.is_some_and(|offerer| offerer != mover) {
            debug!("Draw offer withdrawn by {}'s move", mover);
            self.draw_offer = None;
        }

        let status = self.oracle.status(&snapshot).unwrap_or_else(|e| {
            warn!("No status after {}-{}: {}", from, to, e);
            OracleStatus::default()
        });
        self.in_check = status.in_check;

        info!("{} played {}-{}", mover, from, to);

        if !status.is_terminal() {
            self.side_to_move = snapshot.side_to_move;
            return true;
        }

        let reason = if status.in_checkmate {
            EndReason::Checkmate { winner: mover }
        } else if status.in_stalemate {
            EndReason::Stalemate
        } else {
            EndReason::Draw
        };
        self.end(reason);
        true
    }

    pub fn tick(&mut self, elapsed: u64) {
        if !self.is_live() {
            return;
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        if let Some(expiry) = clock.tick(elapsed) {
            self.end(EndReason::Timeout { loser: expiry.side });
        }
    }

    pub fn resign(&mut self, side: Side) {
        if !self.is_live() {
            debug!("Resignation by {} ignored in {:?}", side, self.phase);
            return;
        }
        self.end(EndReason::Resignation { resigner: side });
    }

    pub fn offer_draw(&mut self) {
        let side = self.acting_side();
        self.offer_draw_as(side);
    }

    pub fn offer_draw_as(&mut self, side: Side) {
        if !self.is_live() {
            return;
        }
        info!("{} offers a draw", side);
        self.draw_offer = Some(side);
    }

    pub fn accept_draw(&mut self) {
        let side = self.acting_side();
        self.accept_draw_as(side);
    }

    /// Ends the game by agreement if an offer is pending. Outside local play
    /// an offer can only be accepted by the other side.
    pub fn accept_draw_as(&mut self, side: Side) {
        if !self.is_live() {
            return;
        }
        let Some(offerer) = self.draw_offer else {
            debug!("No draw offer for {} to accept", side);
            return;
        };
        if self.config.mode != GameMode::Local && offerer == side {
            debug!("{} cannot accept their own draw offer", side);
            return;
        }
        self.end(EndReason::DrawAgreed);
    }

    /// Turns the board around. Only meaningful when both players share the
    /// screen; other modes keep the player's side at the bottom.
    pub fn flip_board(&mut self) {
        if self.config.mode == GameMode::Local {
            self.orientation = self.orientation.opposite();
        }
    }

    /// Stops the clock and drops transient input state. A torn-down session
    /// refuses every later event; the phase keeps the last result for display.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        if let Some(clock) = self.clock.as_mut() {
            clock.stop();
        }
        self.selection.clear();
        self.draw_offer = None;
        info!("Session torn down in {:?}", self.phase);
    }

    fn end(&mut self, reason: EndReason) {
        // An expired clock stays expired so the timeout remains visible.
        if let Some(clock) = self.clock.as_mut() {
            if !matches!(clock.phase(), ClockPhase::Expired(_)) {
                clock.stop();
            }
        }
        self.selection.clear();
        self.draw_offer = None;
        self.phase = GamePhase::Ended(reason);
        info!("Game over: {:?}", reason);
    }

    fn oracle_failed(&mut self, error: SessionError) {
        warn!("Rules oracle failed: {}", error);
        self.selection.clear();
        self.notice = Some(RETRY_NOTICE.to_string());
    }

    pub fn view(&self) -> SessionView {
        let show_moves = self.config.settings.show_valid_moves;
        let selection = self.selection.selection();

        let selection_view = selection.map(|s| SelectionView {
            origin: to_notation(s.origin),
            destinations: if show_moves {
                s.destinations.iter().copied().map(to_notation).collect()
            } else {
                Vec::new()
            },
        });

        let squares = match self.oracle.occupancy() {
            Ok(occupancy) => display_order(self.orientation)
                .into_iter()
                .map(|pos| SquareView {
                    square: to_notation(pos),
                    row: pos.row(),
                    col: pos.col(),
                    piece: occupancy.at(pos),
                    selected: selection.is_some_and(|s| s.origin == pos),
                    destination: show_moves && selection.is_some_and(|s| s.destinations.contains(&pos)),
                })
                .collect(),
            Err(e) => {
                warn!("Board unavailable for view: {}", e);
                Vec::new()
            }
        };

        SessionView {
            mode: self.config.mode,
            phase: self.phase,
            status: phase_status(&self.phase, self.side_to_move, self.in_check),
            side_to_move: self.side_to_move,
            player_side: self.config.player_side,
            orientation: self.orientation,
            fen: self.oracle.snapshot().fen,
            in_check: self.in_check,
            selection: selection_view,
            clock: self.clock_state(),
            last_move: self.history.last().cloned(),
            draw_offer: self.draw_offer,
            notice: self.notice.clone(),
            squares,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::coords::parse_position;
    use crate::game::oracle::{ChessOracle, Occupancy, PositionSnapshot};
    use std::collections::BTreeSet;

    fn pos(text: &str) -> Position {
        parse_position(text).unwrap()
    }

    fn local(time_control: TimeControl) -> SessionController<ChessOracle> {
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Local, time_control, Side::White),
            ChessOracle::new(),
        );
        session.start();
        session
    }

    fn play(session: &mut SessionController<impl RulesOracle>, from: &str, to: &str) {
        session.tap(pos(from));
        let action = session.tap(pos(to));
        assert!(
            matches!(action, Action::CommitMove { .. }),
            "{from}-{to} should commit, got {action:?}"
        );
    }

    /// Delegates to a real board but can be told to fail or refuse.
    struct FlakyOracle {
        inner: ChessOracle,
        refuse_moves: bool,
        unavailable: bool,
    }

    impl FlakyOracle {
        fn new() -> Self {
            Self {
                inner: ChessOracle::new(),
                refuse_moves: false,
                unavailable: false,
            }
        }
    }

    impl RulesOracle for FlakyOracle {
        fn legal_moves(&self, from: NotationSquare) -> Result<BTreeSet<NotationSquare>, SessionError> {
            self.inner.legal_moves(from)
        }

        fn apply_move(
            &mut self,
            from: NotationSquare,
            to: NotationSquare,
            promotion: Option<PieceKind>,
        ) -> Result<PositionSnapshot, SessionError> {
            if self.unavailable {
                return Err(SessionError::OracleUnavailable("offline".to_string()));
            }
            if self.refuse_moves {
                return Err(SessionError::IllegalMove {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            self.inner.apply_move(from, to, promotion)
        }

        fn status(&self, snapshot: &PositionSnapshot) -> Result<OracleStatus, SessionError> {
            self.inner.status(snapshot)
        }

        fn occupancy(&self) -> Result<Occupancy, SessionError> {
            self.inner.occupancy()
        }

        fn snapshot(&self) -> PositionSnapshot {
            self.inner.snapshot()
        }
    }

    #[test]
    fn test_not_started_ignores_input() {
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Local, TimeControl::Blitz, Side::White),
            ChessOracle::new(),
        );
        assert_eq!(session.tap(pos("e2")), Action::Ignore);
        session.tick(5);
        assert_eq!(session.clock_state().unwrap().white_remaining, 180);
        session.resign(Side::White);
        assert_eq!(session.phase(), GamePhase::NotStarted);
    }

    #[test]
    fn test_move_flips_turn_and_clears_selection() {
        let mut session = local(TimeControl::None);
        play(&mut session, "e2", "e4");
        assert_eq!(session.side_to_move(), Side::Black);
        assert!(session.selection().is_none());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].to.to_string(), "e4");
    }

    #[test]
    fn test_increment_clock_on_move() {
        let mut session = local(TimeControl::Blitz);
        session.tick(4);
        play(&mut session, "e2", "e4");
        let clock = session.clock_state().unwrap();
        assert_eq!(clock.white_remaining, 179);
        assert_eq!(clock.black_remaining, 180);
        assert_eq!(clock.side_to_move, Side::Black);
    }

    #[test]
    fn test_illegal_move_rejected_without_touching_clock() {
        let mut oracle = FlakyOracle::new();
        oracle.refuse_moves = true;
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Local, TimeControl::Blitz, Side::White),
            oracle,
        );
        session.start();

        session.tap(pos("e2"));
        session.tap(pos("e4"));
        assert!(session.selection().is_none());
        assert_eq!(session.side_to_move(), Side::White);
        assert_eq!(session.clock_state().unwrap().white_remaining, 180);
        assert_eq!(session.clock_state().unwrap().side_to_move, Side::White);
        assert!(session.history().is_empty());
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn test_oracle_unavailable_sets_notice() {
        let mut oracle = FlakyOracle::new();
        oracle.unavailable = true;
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Local, TimeControl::Tempo, Side::White),
            oracle,
        );
        session.start();

        session.tap(pos("e2"));
        session.tap(pos("e4"));
        assert_eq!(session.phase(), GamePhase::InProgress);
        assert!(session.selection().is_none());
        assert_eq!(session.notice(), Some(RETRY_NOTICE));
        assert_eq!(session.view().notice.as_deref(), Some(RETRY_NOTICE));

        // Next input clears the notice.
        session.tap(pos("e2"));
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn test_resign_is_absorbing() {
        let mut session = local(TimeControl::Blitz);
        session.resign(Side::Black);
        assert_eq!(
            session.phase(),
            GamePhase::Ended(EndReason::Resignation {
                resigner: Side::Black
            })
        );
        assert!(!session.clock_state().unwrap().running);

        session.resign(Side::White);
        session.accept_draw();
        session.tick(100);
        assert_eq!(session.tap(pos("e2")), Action::Ignore);
        assert_eq!(
            session.phase(),
            GamePhase::Ended(EndReason::Resignation {
                resigner: Side::Black
            })
        );
        assert_eq!(session.clock_state().unwrap().white_remaining, 180);
    }

    #[test]
    fn test_local_draw_agreement() {
        let mut session = local(TimeControl::None);
        session.accept_draw();
        assert_eq!(session.phase(), GamePhase::InProgress);

        session.offer_draw();
        assert_eq!(session.draw_offer(), Some(Side::White));
        session.accept_draw();
        assert_eq!(session.phase(), GamePhase::Ended(EndReason::DrawAgreed));
    }

    #[test]
    fn test_draw_offer_withdrawn_by_opponent_move() {
        let mut session = local(TimeControl::None);
        session.offer_draw();
        play(&mut session, "e2", "e4");
        assert_eq!(session.draw_offer(), Some(Side::White));
        play(&mut session, "e7", "e5");
        assert_eq!(session.draw_offer(), None);
    }

    #[test]
    fn test_online_draw_needs_other_side() {
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Online, TimeControl::None, Side::White),
            ChessOracle::new(),
        );
        session.start();
        session.offer_draw();
        session.accept_draw();
        assert_eq!(session.phase(), GamePhase::InProgress);

        session.accept_draw_as(Side::Black);
        assert_eq!(session.phase(), GamePhase::Ended(EndReason::DrawAgreed));
    }

    #[test]
    fn test_flip_board_local_only() {
        let mut session = local(TimeControl::None);
        session.flip_board();
        assert_eq!(session.view().orientation, Side::Black);

        let mut online = SessionController::new(
            SessionConfig::new(GameMode::Ai, TimeControl::None, Side::Black),
            ChessOracle::new(),
        );
        online.flip_board();
        assert_eq!(online.view().orientation, Side::Black);
    }

    #[test]
    fn test_external_move_for_opponent_only() {
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Ai, TimeControl::Tempo, Side::Black),
            ChessOracle::new(),
        );
        session.start();
        let sq = |s: &str| s.parse::<NotationSquare>().unwrap();

        assert!(session.apply_external_move(sq("e2"), sq("e4")));
        assert_eq!(session.side_to_move(), Side::Black);
        assert_eq!(session.clock_state().unwrap().black_remaining, 20);

        // Black is the local player, so the engine may not move for them.
        assert!(!session.apply_external_move(sq("e7"), sq("e5")));
        play(&mut session, "e7", "e5");
        assert_eq!(session.side_to_move(), Side::White);
    }

    #[test]
    fn test_teardown_stops_clock() {
        let mut session = local(TimeControl::Blitz);
        session.tap(pos("e2"));
        session.teardown();
        assert!(session.selection().is_none());
        assert!(session.is_torn_down());
        assert!(!session.is_live());
        session.tick(10);
        assert_eq!(session.clock_state().unwrap().white_remaining, 180);
    }

    #[test]
    fn test_torn_down_session_refuses_input() {
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Ai, TimeControl::Blitz, Side::Black),
            ChessOracle::new(),
        );
        session.start();
        session.teardown();
        let sq = |s: &str| s.parse::<NotationSquare>().unwrap();

        assert_eq!(session.tap(pos("e7")), Action::Ignore);
        assert!(!session.apply_external_move(sq("e2"), sq("e4")));
        assert_eq!(session.tap(pos("e2")), Action::Ignore);
        assert_eq!(session.tap(pos("e4")), Action::Ignore);
        assert!(session.history().is_empty());
        assert_eq!(session.side_to_move(), Side::White);

        session.tick(500);
        session.offer_draw();
        assert_eq!(session.draw_offer(), None);
        session.accept_draw_as(Side::White);
        session.resign(Side::White);
        assert_eq!(session.phase(), GamePhase::InProgress);

        let clock = session.clock_state().unwrap();
        assert_eq!(clock.side_to_move, session.side_to_move());
        assert!(!clock.running);
        assert_eq!(clock.white_remaining, 180);
        assert_eq!(session.clock().unwrap().phase(), ClockPhase::Stopped);

        session.start();
        assert!(!session.is_live());
    }

    #[test]
    fn test_view_hides_destinations_when_disabled() {
        let settings = Settings {
            show_valid_moves: false,
            ..Settings::default()
        };
        let mut session = SessionController::new(
            SessionConfig::new(GameMode::Local, TimeControl::None, Side::White).with_settings(settings),
            ChessOracle::new(),
        );
        session.start();
        session.tap(pos("e2"));

        let view = session.view();
        let selection = view.selection.unwrap();
        assert_eq!(selection.origin.to_string(), "e2");
        assert!(selection.destinations.is_empty());
        assert!(view.squares.iter().all(|s| !s.destination));
        assert_eq!(view.squares.len(), 64);
        assert_eq!(view.squares[0].square.to_string(), "a8");
    }
}
