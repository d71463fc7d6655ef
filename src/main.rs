use std::sync::Arc;

use actix_web::{
    http::Method,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer, Responder,
};
use log::info;
use serde_json::json;

mod billing;
mod config;
mod db;
mod demo;
mod errors;
mod expenses;
mod members;
mod notices;
mod routes;
mod stats;
mod store;
mod structs;
mod utils;

use config::{Config, DataMode};
use db::SqliteStore;
use demo::DemoStore;
use errors::AppError;
use store::SocietyStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn SocietyStore>,
    config: Config,
}

async fn open_store(config: &Config) -> Result<Arc<dyn SocietyStore>, AppError> {
    match config.data_mode {
        DataMode::Live => {
            let store = SqliteStore::connect(&config.database_url).await?;
            store.migrate().await?;
            info!("Using live data at {}", config.database_url);
            Ok(Arc::new(store))
        }
        DataMode::Demo => {
            info!("Using seeded demo data; changes are not persisted");
            Ok(Arc::new(DemoStore::seeded(utils::today())))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("FATAL: {}", e);
        e
    })?;
    let store = open_store(&config).await.map_err(|e| {
        log::error!("FATAL: could not open store: {}", e);
        e
    })?;

    let state = AppState {
        store,
        config: config.clone(),
    };

    info!(
        "Starting HTTP server on http://{}:{}/",
        config.bind_addr, config.port
    );

    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> impl Responder {
    match req_method {
        Method::GET => HttpResponse::NotFound().json(json!({ "error": "Not found" })),
        _ => HttpResponse::MethodNotAllowed().json(json!({ "error": "Method not allowed" })),
    }
}
