//! Identifier generation: request IDs and context IDs.

use rand::RngCore;

/// `req-<16 hex chars>`, attached to every inbound request for log
/// correlation and echoed back in error payloads.
pub fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("req-{}", hex::encode(bytes))
}

/// `ctx_<8 hex chars>_<unix seconds>`, identifying an ingested context blob.
pub fn new_context_id() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secs = chrono::Utc::now().timestamp();
    format!("ctx_{}_{}", hex::encode(bytes), secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_has_expected_shape() {
        let id = new_request_id();
        assert!(id.starts_with("req-"));
        assert_eq!(id.len(), "req-".len() + 16);
    }

    #[test]
    fn context_id_has_expected_shape() {
        let id = new_context_id();
        assert!(id.starts_with("ctx_"));
        let rest = &id["ctx_".len()..];
        let mut parts = rest.split('_');
        let hex_part = parts.next().unwrap();
        let secs_part = parts.next().unwrap();
        assert_eq!(hex_part.len(), 8);
        assert!(secs_part.parse::<i64>().is_ok());
    }
}
