use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge {
        size: usize,
        limit: usize,
    },
}

/// Removes a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    let payload = payload.trim();
    if !payload.starts_with("data:") {
        return payload;
    }
    match payload.find(";base64,") {
        Some(pos) => &payload[pos + ";base64,".len()..],
        None => payload,
    }
}

/// Turns an uploaded payload into the canonical form both clients take: bare base64,
/// non-empty, decodable, and within `max_bytes` once decoded.
pub fn normalize_upload(payload: &str, max_bytes: usize) -> Result<String, ImageError> {
    let data = strip_data_url_prefix(payload);
    if data.is_empty() {
        return Err(ImageError::Empty);
    }
    let decoded = STANDARD.decode(data).map_err(|e| ImageError::InvalidBase64(e.to_string()))?;
    if decoded.is_empty() {
        return Err(ImageError::Empty);
    }
    if decoded.len() > max_bytes {
        return Err(ImageError::TooLarge { size: decoded.len(), limit: max_bytes });
    }
    Ok(data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url_prefix("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url_prefix("QUJD"), "QUJD");
        assert_eq!(strip_data_url_prefix(" QUJD\n"), "QUJD");
    }

    #[test]
    fn accepts_plain_and_prefixed_payloads() {
        assert_eq!(normalize_upload("QUJD", 1024).unwrap(), "QUJD");
        assert_eq!(normalize_upload("data:image/jpeg;base64,QUJD", 1024).unwrap(), "QUJD");
    }

    #[test]
    fn rejects_bad_payloads() {
        assert_eq!(normalize_upload("", 1024), Err(ImageError::Empty));
        assert_eq!(normalize_upload("data:image/jpeg;base64,", 1024), Err(ImageError::Empty));
        assert!(matches!(normalize_upload("not base64!", 1024), Err(ImageError::InvalidBase64(_))));
        assert_eq!(normalize_upload("QUJD", 2), Err(ImageError::TooLarge { size: 3, limit: 2 }));
    }
}
