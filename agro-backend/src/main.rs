use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod agent;
mod ai;
mod cache;
mod config;
mod controllers;
mod db;
mod knowledge;
mod locale;
mod mcp;
mod metrics;
mod models;
mod writer;

use agent::AgentPipeline;
use ai::{CerebrasClient, CompletionBackend};
use cache::CacheService;
use config::Config;
use db::Database;
use knowledge::KnowledgeBase;
use mcp::{McpClient, ToolGateway};
use metrics::RequestMetrics;
use writer::MessageWriter;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub cache: Arc<CacheService>,
    pub completion: Arc<dyn CompletionBackend>,
    pub gateway: Arc<dyn ToolGateway>,
    pub pipeline: Arc<AgentPipeline>,
    pub metrics: Arc<RequestMetrics>,
    pub writer: Arc<MessageWriter>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    log::info!(
        "Initializing caches (response TTL {}s, conversation TTL {}s)",
        config.response_cache_ttl_secs,
        config.conversation_cache_ttl_secs
    );
    match db.purge_expired_cache_entries() {
        Ok(0) => {}
        Ok(purged) => log::info!("Purged {} expired cache entries", purged),
        Err(e) => log::warn!("Failed to purge expired cache entries: {}", e),
    }
    let cache = Arc::new(CacheService::new(
        Duration::from_secs(config.response_cache_ttl_secs),
        Duration::from_secs(config.conversation_cache_ttl_secs),
        Some(db.clone()),
    ));

    let completion: Arc<dyn CompletionBackend> = Arc::new(
        CerebrasClient::new(
            &config.cerebras_api_key,
            config.cerebras_api_url.as_deref(),
            config.cerebras_model.as_deref(),
        )
        .expect("Failed to initialize Cerebras client"),
    );
    log::info!("Initialized completion backend ({})", completion.model_id());

    log::info!("Initializing MCP gateway client for {}", config.mcp_gateway_url);
    let gateway: Arc<dyn ToolGateway> = Arc::new(
        McpClient::new(&config.mcp_gateway_url, config.mcp_gateway_token.as_deref())
            .expect("Failed to initialize MCP gateway client"),
    );
    if gateway.health().await {
        log::info!("MCP gateway reachable");
    } else {
        log::warn!(
            "MCP gateway not reachable at {}; tool calls will fail until it comes up",
            config.mcp_gateway_url
        );
    }

    let knowledge = Arc::new(KnowledgeBase::new());
    let pipeline = Arc::new(AgentPipeline::new(
        completion.clone(),
        gateway.clone(),
        knowledge,
    ));
    let metrics = Arc::new(RequestMetrics::default());

    log::info!("Starting background message writer");
    let writer = Arc::new(MessageWriter::spawn(
        db.clone(),
        cache.clone(),
        config.write_queue_size,
    ));

    log::info!("Starting agro-backend server on port {}", port);

    let app_writer = writer.clone();
    let server_result = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: config.clone(),
                cache: Arc::clone(&cache),
                completion: Arc::clone(&completion),
                gateway: Arc::clone(&gateway),
                pipeline: Arc::clone(&pipeline),
                metrics: Arc::clone(&metrics),
                writer: Arc::clone(&app_writer),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::chat::config)
            .configure(controllers::conversations::config)
            .configure(controllers::metrics::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await;

    log::info!("Draining write queue before exit");
    writer.shutdown().await;
    server_result
}
