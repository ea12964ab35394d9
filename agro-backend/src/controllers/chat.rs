//! Chat endpoint: cache lookup, pipeline run, write-behind persistence.

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{ReasoningStep, StageTimings};
use crate::cache::CacheService;
use crate::locale::{self, ErrorKind, Language};
use crate::models::{CachedReply, ChatTurn, Complexity};
use crate::writer::ExchangeRecord;
use crate::AppState;

/// Very short messages ("hi", "ok") are not worth a response-cache entry.
const MIN_CACHEABLE_CHARS: usize = 10;

const DEFAULT_USER_ID: &str = "anonymous";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
}

#[derive(Debug, Default, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_steps: Option<Vec<ReasoningStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity_level: Option<Complexity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<StageTimings>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)));
}

async fn chat(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> impl Responder {
    let request = req.into_inner();
    let message = request.message.trim().to_string();
    let request_language = request.language.unwrap_or_default();

    if message.is_empty() {
        return HttpResponse::BadRequest().json(ChatResponse {
            success: false,
            message: Some(locale::error_message(ErrorKind::InvalidInput, request_language).to_string()),
            language: Some(request_language),
            error: Some(ErrorKind::InvalidInput.as_ref().to_string()),
            ..Default::default()
        });
    }

    let user_id = request
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    let conversation_id = request
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Identical question inside the TTL skips the pipeline entirely.
    let cache_key = CacheService::response_key(&user_id, &message, request_language);
    if let Some(hit) = data.cache.get_response(&cache_key) {
        log::info!("[CHAT] Response cache hit for user {}", user_id);
        data.metrics.record_cache_hit();
        return HttpResponse::Ok().json(ChatResponse {
            success: true,
            message: Some(hit.message),
            conversation_id: Some(conversation_id),
            language: Some(hit.language),
            tools_used: Some(hit.tools_used),
            reasoning_steps: Some(hit.reasoning_steps),
            complexity_level: Some(hit.complexity_level),
            confidence: Some(hit.confidence),
            cached: true,
            ..Default::default()
        });
    }

    let history = load_history(&data, &conversation_id, &user_id);

    match data.pipeline.process_message(&message, &history).await {
        Ok(outcome) => {
            let record = ExchangeRecord {
                conversation_id: conversation_id.clone(),
                user_id: user_id.clone(),
                user_message: message.clone(),
                user_language: outcome.language,
                assistant_message: outcome.message.clone(),
                assistant_language: outcome.language,
                tools_used: outcome.tools_used.clone(),
            };
            if let Err(e) = data.writer.enqueue(record) {
                log::warn!(
                    "[CHAT] Dropping persistence for conversation {}: {}",
                    conversation_id,
                    e
                );
            }

            if message.chars().count() > MIN_CACHEABLE_CHARS {
                data.cache.put_response(
                    cache_key,
                    &CachedReply {
                        message: outcome.message.clone(),
                        language: outcome.language,
                        tools_used: outcome.tools_used.clone(),
                        reasoning_steps: outcome.reasoning_steps.clone(),
                        complexity_level: outcome.complexity_level,
                        confidence: outcome.confidence,
                    },
                );
            }

            data.metrics.record_request(outcome.performance.total_duration);

            HttpResponse::Ok().json(ChatResponse {
                success: true,
                message: Some(outcome.message),
                conversation_id: Some(conversation_id),
                language: Some(outcome.language),
                tools_used: Some(outcome.tools_used),
                reasoning_steps: Some(outcome.reasoning_steps),
                complexity_level: Some(outcome.complexity_level),
                confidence: Some(outcome.confidence),
                performance: Some(outcome.performance),
                cached: false,
                error: None,
            })
        }
        Err(e) => {
            log::error!("[CHAT] Pipeline failed for user {}: {}", user_id, e);
            data.metrics.record_failure();
            // No analysis result on this path, so sniff the script instead.
            let language = locale::detect_script_language(&message);
            HttpResponse::InternalServerError().json(ChatResponse {
                success: false,
                message: Some(locale::error_message(ErrorKind::ProcessingError, language).to_string()),
                language: Some(language),
                error: Some(ErrorKind::ProcessingError.as_ref().to_string()),
                ..Default::default()
            })
        }
    }
}

/// Conversation history for the pipeline: cache first, database on a miss,
/// then warm the cache for the next turn.
fn load_history(data: &AppState, conversation_id: &str, user_id: &str) -> Vec<ChatTurn> {
    let key = CacheService::conversation_key(conversation_id, user_id);
    if let Some(turns) = data.cache.get_conversation(&key) {
        return turns;
    }
    match data
        .db
        .recent_chat_turns(conversation_id, user_id, data.config.history_limit)
    {
        Ok(turns) => {
            if !turns.is_empty() {
                data.cache.put_conversation(key, &turns);
            }
            turns
        }
        Err(e) => {
            log::warn!(
                "[CHAT] Failed to load history for conversation {}: {}",
                conversation_id,
                e
            );
            Vec::new()
        }
    }
}
