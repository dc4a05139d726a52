//! API keys and webhook endpoints.

use std::sync::Arc;

use hostel_repo::security::{generate_api_key, generate_webhook_secret, hash_api_key};
use hostel_types::{
    ApiKey, ApiKeyCreatedResponse, ApiKeyId, ApiKeyInfo, AppError, BootstrapRequest,
    CreateApiKeyRequest, HostelRepository, Principal, RegisterWebhookRequest, WebhookEndpoint,
    WebhookResponse,
};

use super::load_hostel;

pub struct AccessService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> AccessService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Resolves a raw API key to the caller it identifies.
    pub async fn authenticate(&self, raw_key: &str) -> Result<Option<Principal>, AppError> {
        let key_hash = hash_api_key(raw_key);
        let key = self.repo.verify_api_key_hash(&key_hash).await?;
        Ok(key.map(|k| k.principal()))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // API Keys
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates the first, global API key. Refused once any key exists.
    pub async fn bootstrap(&self, req: BootstrapRequest) -> Result<ApiKeyCreatedResponse, AppError> {
        if self.repo.count_api_keys().await? > 0 {
            return Err(AppError::BadRequest(
                "Bootstrap not allowed: API keys already exist. Use an existing key to create new ones.".into(),
            ));
        }
        let created = self.issue(req.name, None).await?;
        Ok(ApiKeyCreatedResponse {
            message: "First API key created. Save this key securely - it won't be shown again!"
                .into(),
            ..created
        })
    }

    /// Creates a key. Only global keys may mint keys; the new key may be scoped.
    pub async fn create_api_key(
        &self,
        principal: &Principal,
        req: CreateApiKeyRequest,
    ) -> Result<ApiKeyCreatedResponse, AppError> {
        principal.ensure_global()?;
        if let Some(hostel_id) = req.hostel_id {
            load_hostel(self.repo.as_ref(), hostel_id).await?;
        }
        self.issue(req.name, req.hostel_id).await
    }

    async fn issue(
        &self,
        name: String,
        hostel_id: Option<hostel_types::HostelId>,
    ) -> Result<ApiKeyCreatedResponse, AppError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("API key name cannot be empty".into()));
        }

        let raw_key = generate_api_key();
        let key = ApiKey::new(name, hash_api_key(&raw_key), hostel_id);
        self.repo.create_api_key(&key).await?;
        tracing::info!(key_id = %key.id, scoped = hostel_id.is_some(), "API key created");

        Ok(ApiKeyCreatedResponse {
            id: key.id,
            api_key: raw_key,
            hostel_id,
            message: "API key created. Save this key securely - it won't be shown again!".into(),
        })
    }

    pub async fn list_api_keys(&self, principal: &Principal) -> Result<Vec<ApiKeyInfo>, AppError> {
        principal.ensure_global()?;
        let keys = self.repo.list_api_keys().await?;
        Ok(keys
            .into_iter()
            .map(|k| ApiKeyInfo {
                id: k.id,
                name: k.name,
                hostel_id: k.hostel_id,
                is_active: k.is_active,
                created_at: k.created_at,
                last_used_at: k.last_used_at,
            })
            .collect())
    }

    /// Deactivates a key.
    pub async fn delete_api_key(&self, principal: &Principal, id: ApiKeyId) -> Result<(), AppError> {
        principal.ensure_global()?;
        if self.repo.delete_api_key(id).await? {
            tracing::info!(key_id = %id, "API key deactivated");
            Ok(())
        } else {
            Err(AppError::NotFound(format!("API key {}", id)))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhooks
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registers an endpoint. The signing secret is generated here and only
    /// returned in this response.
    pub async fn register_webhook(
        &self,
        principal: &Principal,
        req: RegisterWebhookRequest,
    ) -> Result<WebhookResponse, AppError> {
        principal.ensure_global()?;
        let endpoint = WebhookEndpoint::new(req.url, generate_webhook_secret(), req.events)?;
        self.repo.create_webhook_endpoint(&endpoint).await?;
        tracing::info!(endpoint_id = %endpoint.id, url = %endpoint.url, "Webhook endpoint registered");

        Ok(WebhookResponse {
            id: endpoint.id,
            url: endpoint.url,
            secret: Some(endpoint.secret),
            events: endpoint.events,
            is_active: endpoint.is_active,
        })
    }

    pub async fn list_webhooks(&self, principal: &Principal) -> Result<Vec<WebhookResponse>, AppError> {
        principal.ensure_global()?;
        let endpoints = self.repo.list_webhook_endpoints().await?;
        Ok(endpoints
            .into_iter()
            .map(|ep| WebhookResponse {
                id: ep.id,
                url: ep.url,
                secret: None,
                events: ep.events,
                is_active: ep.is_active,
            })
            .collect())
    }
}
