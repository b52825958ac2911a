use actix_web_actors::ws;
use log::info;

use crate::game::clock::TimeControl;
use crate::game::coords::{NotationSquare, Position, Side};
use crate::game::oracle::ChessOracle;
use crate::game::session::{GameMode, SessionConfig, SessionController};
use crate::models::ClientMessage;
use crate::websocket::handler::SessionSocket;

fn parse_mode(text: &str) -> Option<GameMode> {
    match text {
        "local" => Some(GameMode::Local),
        "online" => Some(GameMode::Online),
        "ai" => Some(GameMode::Ai),
        _ => None,
    }
}

impl SessionSocket {
    pub fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg.action.as_str() {
            "new_game" => self.handle_new_game(msg, ctx),
            "tap" => self.handle_tap(msg, ctx),
            "resign" => self.handle_resign(msg, ctx),
            "offer_draw" => {
                self.session.offer_draw();
                self.send_state(ctx);
            }
            "accept_draw" => {
                self.session.accept_draw();
                self.send_state(ctx);
            }
            "flip_board" => {
                self.session.flip_board();
                self.send_state(ctx);
            }
            "external_move" => self.handle_external_move(msg, ctx),
            "state" => self.send_state(ctx),
            other => self.send_error(format!("Unknown action: {}", other), ctx),
        }
    }

    fn handle_new_game(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let mode = match msg.mode.as_deref().map(parse_mode) {
            None => GameMode::Local,
            Some(Some(mode)) => mode,
            Some(None) => return self.send_error("Unknown game mode", ctx),
        };
        let time_control = match msg.time_control.as_deref().map(str::parse::<TimeControl>) {
            None => TimeControl::None,
            Some(Ok(time_control)) => time_control,
            Some(Err(e)) => return self.send_error(e, ctx),
        };
        let player_side = match msg.player_color.as_deref().map(str::parse::<Side>) {
            None => Side::White,
            Some(Ok(side)) => side,
            Some(Err(_)) => return self.send_error("Unknown player color", ctx),
        };

        info!(
            "Session {} starting {:?} game, {:?}, playing {}",
            self.id, mode, time_control, player_side
        );

        self.session.teardown();
        let config = SessionConfig::new(mode, time_control, player_side)
            .with_settings(self.app_state.settings.clone());
        self.session = SessionController::new(config, ChessOracle::new());
        self.session.start();
        self.send_state(ctx);
    }

    fn handle_tap(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(pos) = msg.row.zip(msg.col).and_then(|(row, col)| Position::new(row, col)) else {
            return self.send_error("Tap requires row and col in 0..8", ctx);
        };
        self.session.tap(pos);
        self.send_state(ctx);
    }

    fn handle_resign(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let side = match msg.side.as_deref().map(str::parse::<Side>) {
            None => self.session.acting_side(),
            Some(Ok(side)) => side,
            Some(Err(_)) => return self.send_error("Unknown side", ctx),
        };
        self.session.resign(side);
        self.send_state(ctx);
    }

    fn handle_external_move(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let (Some(from), Some(to)) = (msg.from, msg.to) else {
            return self.send_error("Move requires from and to positions", ctx);
        };
        let (from, to) = match (from.parse::<NotationSquare>(), to.parse::<NotationSquare>()) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return self.send_error(e.to_string(), ctx),
        };

        if !self.session.apply_external_move(from, to) {
            return self.send_error(format!("Move {}-{} not applied", from, to), ctx);
        }
        self.send_state(ctx);
    }
}
