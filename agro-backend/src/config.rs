use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const CEREBRAS_API_KEY: &str = "CEREBRAS_API_KEY";
    pub const CEREBRAS_API_URL: &str = "CEREBRAS_API_URL";
    pub const CEREBRAS_MODEL: &str = "CEREBRAS_MODEL";
    pub const MCP_GATEWAY_URL: &str = "MCP_GATEWAY_URL";
    pub const MCP_GATEWAY_TOKEN: &str = "MCP_GATEWAY_TOKEN";
    // Cache and history configuration
    pub const RESPONSE_CACHE_TTL_SECS: &str = "RESPONSE_CACHE_TTL_SECS";
    pub const CONVERSATION_CACHE_TTL_SECS: &str = "CONVERSATION_CACHE_TTL_SECS";
    pub const HISTORY_LIMIT: &str = "HISTORY_LIMIT";
    pub const WRITE_QUEUE_SIZE: &str = "WRITE_QUEUE_SIZE";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/agro.db";
    pub const MCP_GATEWAY_URL: &str = "http://localhost:8811";
    pub const RESPONSE_CACHE_TTL_SECS: u64 = 180;
    pub const CONVERSATION_CACHE_TTL_SECS: u64 = 600;
    pub const HISTORY_LIMIT: u32 = 10;
    pub const WRITE_QUEUE_SIZE: usize = 256;
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub cerebras_api_key: String,
    /// Override for the chat-completions endpoint; client default otherwise.
    pub cerebras_api_url: Option<String>,
    /// Override for the model identifier; client default otherwise.
    pub cerebras_model: Option<String>,
    pub mcp_gateway_url: String,
    pub mcp_gateway_token: Option<String>,
    pub response_cache_ttl_secs: u64,
    pub conversation_cache_ttl_secs: u64,
    pub history_limit: u32,
    pub write_queue_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            cerebras_api_key: env::var(env_vars::CEREBRAS_API_KEY)
                .expect("CEREBRAS_API_KEY must be set"),
            cerebras_api_url: env::var(env_vars::CEREBRAS_API_URL).ok(),
            cerebras_model: env::var(env_vars::CEREBRAS_MODEL).ok(),
            mcp_gateway_url: env::var(env_vars::MCP_GATEWAY_URL)
                .unwrap_or_else(|_| defaults::MCP_GATEWAY_URL.to_string()),
            mcp_gateway_token: env::var(env_vars::MCP_GATEWAY_TOKEN).ok(),
            response_cache_ttl_secs: env::var(env_vars::RESPONSE_CACHE_TTL_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::RESPONSE_CACHE_TTL_SECS),
            conversation_cache_ttl_secs: env::var(env_vars::CONVERSATION_CACHE_TTL_SECS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::CONVERSATION_CACHE_TTL_SECS),
            history_limit: env::var(env_vars::HISTORY_LIMIT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::HISTORY_LIMIT),
            write_queue_size: env::var(env_vars::WRITE_QUEUE_SIZE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::WRITE_QUEUE_SIZE),
        }
    }
}
