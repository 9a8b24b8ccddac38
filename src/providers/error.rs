use std::fmt;

/// Classified provider error — records *why* the Gemini call failed so the
/// caller can log the cause and pick the right user-facing message.
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 401/403 — bad API key or permissions.
    Auth,
    /// 402 — billing/quota exhausted.
    Billing,
    /// 429 — rate limited.
    RateLimit,
    /// 404 or "model not found" — bad model name.
    NotFound,
    /// 408, request timeout, or provider took too long.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504 — provider-side outage.
    ServerError,
    /// Anything else.
    Unknown,
}

impl ProviderError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            402 => ProviderErrorKind::Billing,
            404 => ProviderErrorKind::NotFound,
            408 => ProviderErrorKind::Timeout,
            429 => ProviderErrorKind::RateLimit,
            500 | 502 | 503 | 504 => ProviderErrorKind::ServerError,
            _ => ProviderErrorKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
        }
    }

    /// Short user-facing summary. Surfaced once per failed action; the
    /// caller never retries automatically.
    pub fn user_message(&self) -> String {
        match self.kind {
            ProviderErrorKind::Auth => {
                "AI service authentication failed. Check the configured API key.".to_string()
            }
            ProviderErrorKind::Billing => {
                "AI service billing error — the account quota may be exhausted.".to_string()
            }
            ProviderErrorKind::RateLimit => {
                "The AI service is rate limiting requests. Try again in a moment.".to_string()
            }
            ProviderErrorKind::NotFound => {
                "Model not found. Check the configured model names.".to_string()
            }
            ProviderErrorKind::Timeout => "The AI request timed out. Try again.".to_string(),
            ProviderErrorKind::Network => {
                "Cannot reach the AI service (network error). Try again.".to_string()
            }
            ProviderErrorKind::ServerError => {
                "The AI service is experiencing issues (server error). Try again later.".to_string()
            }
            ProviderErrorKind::Unknown => format!("AI service error: {}", self.message),
        }
    }

    /// Whether re-triggering the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
                | ProviderErrorKind::ServerError
        )
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "Provider error ({}, {:?}): {}", status, self.kind, self.message)
        } else {
            write!(f, "Provider error ({:?}): {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

fn truncate_body(body: &str) -> String {
    // Cut at a char boundary; localized error bodies are not ASCII.
    match body.char_indices().nth(300) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
