use log::{ error, warn };
use serde::Serialize;
use thiserror::Error;

use crate::llm::UpstreamError;

/// Failure classes of a room analysis. Each maps to one localized banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    RegionUnsupported,
    RateLimit,
    Parse,
    Generic,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("model is not available in this region: {0}")]
    RegionUnsupported(String),
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),
    #[error("could not parse analysis: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("analysis failed: {0}")]
    Generic(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::RegionUnsupported => "region_unsupported",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Parse => "parse",
            ErrorKind::Generic => "generic",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::Config(_) => ErrorKind::Config,
            AnalysisError::RegionUnsupported(_) => ErrorKind::RegionUnsupported,
            AnalysisError::RateLimit(_) => ErrorKind::RateLimit,
            AnalysisError::Parse(_) => ErrorKind::Parse,
            AnalysisError::Generic(_) => ErrorKind::Generic,
        }
    }
}

// Substring rules over the lowercased upstream status code and message, checked in order.
// Update these instead of matching strings at call sites.
const CLASSIFICATION_RULES: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::Config, &["api key", "api_key_invalid", "api_key"]),
    (
        ErrorKind::RegionUnsupported,
        &["location is not supported", "user location", "unsupported_country", "not available in your country"],
    ),
    (ErrorKind::RateLimit, &["resource_exhausted", "quota", "rate limit", "429"]),
];

fn match_rules(haystack: &str) -> Option<ErrorKind> {
    let haystack = haystack.to_lowercase();
    CLASSIFICATION_RULES.iter()
        .find(|(_, needles)| needles.iter().any(|n| haystack.contains(n)))
        .map(|(kind, _)| *kind)
}

fn build(kind: ErrorKind, detail: String) -> AnalysisError {
    match kind {
        ErrorKind::Config => AnalysisError::Config(detail),
        ErrorKind::RegionUnsupported => AnalysisError::RegionUnsupported(detail),
        ErrorKind::RateLimit => AnalysisError::RateLimit(detail),
        ErrorKind::Parse | ErrorKind::Generic => AnalysisError::Generic(detail),
    }
}

/// Maps a raw upstream failure onto the analysis taxonomy.
pub fn classify(err: UpstreamError) -> AnalysisError {
    let detail = err.to_string();
    let kind = match &err {
        UpstreamError::MissingCredential => Some(ErrorKind::Config),
        UpstreamError::Http { status: 429, .. } => Some(ErrorKind::RateLimit),
        UpstreamError::Http { code, message, .. } => match_rules(&format!("{} {}", code, message)),
        UpstreamError::Transport(_) | UpstreamError::Decode(_) | UpstreamError::EmptyResponse => None,
    };

    match kind {
        Some(kind) => {
            error!("Upstream error classified as {:?}: {}", kind, detail);
            build(kind, detail)
        }
        None => {
            warn!("Unclassified upstream error: {}", detail);
            AnalysisError::Generic(detail)
        }
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("chat exchange was aborted")]
    Aborted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a request of this kind is already in flight")]
    Busy,
    #[error("session is not in the {0} stage")]
    WrongStage(&'static str),
    #[error("message is empty")]
    EmptyMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, code: &str, message: &str) -> UpstreamError {
        UpstreamError::Http { status, code: code.into(), message: message.into() }
    }

    #[test]
    fn missing_credential_is_config() {
        assert_eq!(classify(UpstreamError::MissingCredential).kind(), ErrorKind::Config);
    }

    #[test]
    fn invalid_key_is_config() {
        let err = http(400, "INVALID_ARGUMENT", "API key not valid. Please pass a valid API key.");
        assert_eq!(classify(err).kind(), ErrorKind::Config);
    }

    #[test]
    fn location_is_region() {
        let err = http(400, "FAILED_PRECONDITION", "User location is not supported for the API use.");
        assert_eq!(classify(err).kind(), ErrorKind::RegionUnsupported);
    }

    #[test]
    fn quota_is_rate_limit() {
        assert_eq!(classify(http(429, "", "")).kind(), ErrorKind::RateLimit);
        let err = http(403, "RESOURCE_EXHAUSTED", "You exceeded your current quota");
        assert_eq!(classify(err).kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn unknown_is_generic() {
        assert_eq!(classify(http(500, "INTERNAL", "oops")).kind(), ErrorKind::Generic);
        assert_eq!(classify(UpstreamError::EmptyResponse).kind(), ErrorKind::Generic);
    }

    #[test]
    fn parse_failures_keep_their_own_kind() {
        let err: AnalysisError = serde_json::from_str::<serde_json::Value>("nope").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
