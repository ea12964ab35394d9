//! Liveness endpoint with a gateway reachability check.

use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;

use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)));
}

async fn health(data: web::Data<AppState>) -> impl Responder {
    let gateway_reachable = data.gateway.health().await;
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "status": "ok",
        "service": "agro-backend",
        "model": data.completion.model_id(),
        "gateway_reachable": gateway_reachable,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
