use actix_web::{web, HttpResponse, Responder};

use crate::models::AppState;

/// HTTP handler for the index page
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Chess session server: connect a board client to /ws")
}

/// The settings every new session starts with
pub async fn settings(app_state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(&app_state.settings)
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(crate::websocket::ws_index)))
        .service(web::resource("/settings").route(web::get().to(settings)))
        .service(web::resource("/").route(web::get().to(index)));
}
