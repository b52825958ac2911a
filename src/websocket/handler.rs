use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use std::time::Duration;
use uuid::Uuid;

use crate::game::clock::TimeControl;
use crate::game::coords::Side;
use crate::game::oracle::ChessOracle;
use crate::game::session::{GameMode, SessionConfig, SessionController};
use crate::models::{AppState, ClientMessage, ServerMessage};

/// One websocket connection, owning one game session.
///
/// Actix hands the actor one message at a time, so taps, clock ticks and
/// resignations reach the session strictly in sequence.
pub struct SessionSocket {
    pub id: String,
    pub app_state: web::Data<AppState>,
    pub session: SessionController<ChessOracle>,
}

impl SessionSocket {
    pub fn new(app_state: web::Data<AppState>) -> Self {
        let config = SessionConfig::new(GameMode::Local, TimeControl::None, Side::White)
            .with_settings(app_state.settings.clone());
        let mut session = SessionController::new(config, ChessOracle::new());
        session.start();

        Self {
            id: Uuid::new_v4().to_string(),
            app_state,
            session,
        }
    }

    fn handle_tick(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if !self.session.is_live() || self.session.clock().is_none() {
            return;
        }

        let elapsed = self.app_state.config.tick_interval_secs;
        self.session.tick(elapsed);
        debug!("Session {} ticked {}s", self.id, elapsed);
        self.send_state(ctx);
    }

    pub fn send_state(&self, ctx: &mut ws::WebsocketContext<Self>) {
        self.send(&ServerMessage::state(&self.id, self.session.view()), ctx);
    }

    pub fn send_error(&self, error: impl Into<String>, ctx: &mut ws::WebsocketContext<Self>) {
        let error = error.into();
        warn!("Session {}: {}", self.id, error);
        self.send(&ServerMessage::error(&self.id, error), ctx);
    }

    fn send(&self, message: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(message) {
            Ok(text) => ctx.text(text),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                ctx.text("{\"error\": \"Internal server error\"}");
            }
        }
    }
}

impl Actor for SessionSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        // Register the actor with the application state
        if let Ok(mut sessions) = self.app_state.sessions.lock() {
            sessions.insert(self.id.clone());
        }
        info!("WebSocket connection started: {}", self.id);
        info!("Total active sessions: {}", self.app_state.session_count());

        let interval = Duration::from_secs(self.app_state.config.tick_interval_secs);
        ctx.run_interval(interval, |act, ctx| act.handle_tick(ctx));

        self.send_state(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.session.teardown();

        if let Ok(mut sessions) = self.app_state.sessions.lock() {
            sessions.remove(&self.id);
        }
        info!("WebSocket connection closed: {}", self.id);
        info!("Total active sessions: {}", self.app_state.session_count());

        Running::Stop
    }
}

// WebSocket message handler
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for SessionSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                debug!("Received text message: {}", text);
                match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                    Ok(client_msg) => self.handle_message(client_msg, ctx),
                    Err(e) => self.send_error(format!("Invalid message format: {}", e), ctx),
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.send_error("Binary messages are not supported", ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                info!("Connection closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            _ => {
                ctx.stop();
            }
        }
    }
}

// WebSocket connection handler
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let socket = SessionSocket::new(app_state);
    info!("New WebSocket connection: {}", socket.id);
    ws::start(socket, &req, stream)
}
