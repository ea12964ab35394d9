//! Request, writer, and cache statistics.

use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/metrics").route(web::get().to(metrics)));
}

async fn metrics(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "requests": data.metrics.snapshot(),
        "writer": data.writer.stats(),
        "cache": {
            "response_entries": data.cache.response_entries(),
            "conversation_entries": data.cache.conversation_entries(),
        },
    }))
}
