use actix_web::{web, App, HttpServer};
use log::{error, info};

use chess_session::config::{ServerConfig, Settings};
use chess_session::models::AppState;
use chess_session::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };
    let settings = Settings::load_or_default(config.settings_path.as_deref());
    let bind_address = config.bind_address.clone();

    info!("Starting chess session server at http://{}", bind_address);

    // Create shared application state
    let app_state = web::Data::new(AppState::new(config, settings));

    // Start HTTP server
    HttpServer::new(move || App::new().app_data(app_state.clone()).configure(configure_routes))
        .bind(bind_address)?
        .run()
        .await
}
