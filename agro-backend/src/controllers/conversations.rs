//! Conversation listing, message history, and deletion.

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    // GET takes a user id, DELETE takes a conversation id. The client API
    // grew that way and keeping both on one resource avoids a 405 shadow.
    cfg.service(
        web::resource("/api/conversations/{id}")
            .route(web::get().to(list_conversations))
            .route(web::delete().to(delete_conversation)),
    );
    cfg.service(
        web::resource("/api/conversations/{id}/messages").route(web::get().to(list_messages)),
    );
}

async fn list_conversations(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let user_id = path.into_inner();
    match data.db.list_conversations(&user_id) {
        Ok(conversations) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "conversations": conversations,
        })),
        Err(e) => {
            log::error!("Failed to list conversations for user {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": format!("Database error: {}", e),
            }))
        }
    }
}

async fn list_messages(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    match data.db.list_chat_messages(&conversation_id, &query.user_id) {
        Ok(messages) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "messages": messages,
        })),
        Err(e) => {
            log::error!(
                "Failed to list messages for conversation {}: {}",
                conversation_id,
                e
            );
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": format!("Database error: {}", e),
            }))
        }
    }
}

async fn delete_conversation(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    match data.db.delete_conversation(&conversation_id, &query.user_id) {
        Ok(0) => HttpResponse::NotFound().json(serde_json::json!({
            "success": false,
            "error": "Conversation not found",
        })),
        Ok(_) => {
            data.cache
                .invalidate_conversation(&conversation_id, &query.user_id);
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
            }))
        }
        Err(e) => {
            log::error!(
                "Failed to delete conversation {}: {}",
                conversation_id,
                e
            );
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": format!("Database error: {}", e),
            }))
        }
    }
}
