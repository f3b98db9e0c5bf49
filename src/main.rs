use std::sync::Arc;

use actix_web::{App, HttpServer};
use dotenv::dotenv;
use log::{info, warn};

use ticket_booking_service::{
    config::AppConfig,
    db::{init_db_pool, memory::MemoryStore, PgStore},
    service::{
        auth::TokenIssuer,
        log::{init_logger, LoggerMiddleware},
        notification::{Dispatcher, LogNotifier},
        security::{cors, security_headers},
    },
    AppState,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logger();
    let config = AppConfig::from_env()?;

    let (dispatcher, dispatcher_handle) =
        Dispatcher::start(Arc::new(LogNotifier), config.dispatcher.clone());
    let queue = Arc::new(dispatcher);
    let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl);

    let state = match &config.database_url {
        Some(db_url) => {
            let pool = init_db_pool(db_url, config.db_max_connections).await?;
            AppState::new(PgStore::new(pool), queue, tokens)
        }
        None => {
            warn!("DATABASE_URL is not set, data lives in memory and is lost on exit");
            AppState::new(MemoryStore::new(), queue, tokens)
        }
    };

    info!("listening on {}:{}", config.host, config.port);
    let origins = config.cors_allowed_origins.clone();
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(LoggerMiddleware)
            .wrap(security_headers())
            .wrap(cors(&origins))
            .configure(move |cfg| state.configure(cfg))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    dispatcher_handle.shutdown().await;
    Ok(())
}
