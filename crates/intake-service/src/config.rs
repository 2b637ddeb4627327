//! Service configuration.

use chrono::NaiveTime;

use intake_core::OperatorId;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Connection pool size (default: 10).
    pub database_max_connections: u32,

    /// Operator identities that receive completed submissions.
    pub operator_ids: Vec<OperatorId>,

    /// Chat gateway base URL for outbound notifications (optional).
    pub gateway_url: Option<String>,

    /// Bearer token for the chat gateway (optional).
    pub gateway_token: Option<String>,

    /// API key the gateway must present on inbound events.
    pub gateway_api_key: Option<String>,

    /// API key for the operator administration endpoints.
    pub admin_api_key: Option<String>,

    /// Daily sweep time, UTC (default: 20:00).
    pub sweep_at: NaiveTime,

    /// Contact phone shown in the cooperation reply.
    pub contact_phone: String,

    /// Contact website shown in the cooperation reply.
    pub contact_website: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Fallback sweep time when `SWEEP_AT` is absent or malformed.
fn default_sweep_at() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).expect("literal time is valid")
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/intake".into()),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            operator_ids: std::env::var("OPERATOR_IDS")
                .map(|s| parse_operator_ids(&s))
                .unwrap_or_default(),
            gateway_url: std::env::var("GATEWAY_URL").ok(),
            gateway_token: std::env::var("GATEWAY_TOKEN").ok(),
            gateway_api_key: std::env::var("GATEWAY_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            sweep_at: std::env::var("SWEEP_AT")
                .ok()
                .and_then(|s| parse_sweep_at(&s))
                .unwrap_or_else(default_sweep_at),
            contact_phone: std::env::var("CONTACT_PHONE")
                .unwrap_or_else(|_| "+1 (555) 010-0100".into()),
            contact_website: std::env::var("CONTACT_WEBSITE")
                .unwrap_or_else(|_| "https://example.com".into()),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64 * 1024), // 64KB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "postgres://localhost/intake".into(),
            database_max_connections: 10,
            operator_ids: Vec::new(),
            gateway_url: None,
            gateway_token: None,
            gateway_api_key: None,
            admin_api_key: None,
            sweep_at: default_sweep_at(),
            contact_phone: "+1 (555) 010-0100".into(),
            contact_website: "https://example.com".into(),
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

/// Parse a comma-separated operator id list, skipping malformed entries.
fn parse_operator_ids(raw: &str) -> Vec<OperatorId> {
    raw.split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            match part.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(value = %part, "Ignoring malformed operator id");
                    None
                }
            }
        })
        .collect()
}

/// Parse an `HH:MM` sweep time.
fn parse_sweep_at(raw: &str) -> Option<NaiveTime> {
    match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            tracing::warn!(value = %raw, "Ignoring malformed SWEEP_AT, using default");
            None
        }
    }
}
