//! Token-accounting precheck/deduction: an explicit external collaborator
//! per scope (billing/token-deduction webhooks are out of scope for the
//! core). This trait exists only so Phase 2 and Phase 7 of the pipeline
//! have something real to call; the bundled implementation always
//! succeeds, which is sufficient to exercise the core's propagation
//! policy (precheck failure is fatal, deduction failure is logged only).

use async_trait::async_trait;

#[async_trait]
pub trait TokenAccountant: Send + Sync {
    /// Returns `Err(reason)` if the user has insufficient balance for
    /// `cost` tokens. Fatal to the request when it errors.
    async fn precheck(&self, user_id: &str, cost: u64) -> Result<(), String>;

    /// Fire-and-forget deduction; failures must never affect the client.
    fn deduct(&self, user_id: &str, amount: u64);
}

pub struct NoopAccountant;

#[async_trait]
impl TokenAccountant for NoopAccountant {
    async fn precheck(&self, _user_id: &str, _cost: u64) -> Result<(), String> {
        Ok(())
    }

    fn deduct(&self, _user_id: &str, _amount: u64) {}
}

/// Thin HTTP call-through to the external token-accounting service, per
/// scope ("billing/token-deduction webhooks" are an external collaborator,
/// consumed here only deeply enough to exercise Phase 2/Phase 7's
/// propagation policy: precheck failure is fatal, deduction failure is
/// logged only).
pub struct HttpAccountant {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccountant {
    pub fn new(base_url: String) -> Self {
        HttpAccountant { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl TokenAccountant for HttpAccountant {
    async fn precheck(&self, user_id: &str, cost: u64) -> Result<(), String> {
        let url = format!("{}/tokens/precheck", self.base_url.trim_end_matches('/'));
        let request = self.client.post(&url).json(&serde_json::json!({ "user_id": user_id, "cost": cost })).send();
        match tokio::time::timeout(std::time::Duration::from_secs(2), request).await {
            Ok(Ok(response)) if response.status().is_success() => Ok(()),
            Ok(Ok(response)) => Err(format!("token accounting precheck rejected: status {}", response.status())),
            Ok(Err(e)) => Err(format!("token accounting precheck request failed: {e}")),
            Err(_) => Err("token accounting precheck timed out".to_string()),
        }
    }

    fn deduct(&self, user_id: &str, amount: u64) {
        let url = format!("{}/tokens/deduct", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            let request = client.post(&url).json(&serde_json::json!({ "user_id": user_id, "amount": amount })).send();
            if let Err(e) = request.await {
                tracing::warn!(error = %e, "token deduction failed, client response unaffected");
            }
        });
    }
}
