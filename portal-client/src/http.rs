//! HTTP client for the vendor REST API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use shared::delivery::normalize_roster;
use shared::order::normalize_orders;
use shared::{DeliveryTeamMember, Envelope, Order, OrderStatus, VendorProfile};
use std::sync::Arc;
use std::time::Duration;

use crate::session::{StaticToken, TokenSource};
use crate::{ClientError, ClientResult, PortalConfig};

/// Vendor API operations used by the order screens.
///
/// Implemented by [`HttpClient`]; tests substitute their own.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// `GET vendor/orders`
    async fn list_orders(&self) -> ClientResult<Vec<Order>>;

    /// `PUT vendor/orders/{id}/status`
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()>;

    /// `GET vendor/delivery-boys`
    async fn list_delivery_team(&self) -> ClientResult<Vec<DeliveryTeamMember>>;

    /// `POST vendor/orders/{id}/assign-delivery`
    async fn assign_delivery_boy(&self, order_id: &str, delivery_boy_id: &str) -> ClientResult<()>;

    /// `GET vendor/profile`
    async fn vendor_profile(&self) -> ClientResult<VendorProfile>;
}

/// HTTP client for making requests to the vendor API
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: PortalConfig,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client; the token comes from `config.token` or, when unset,
    /// from the session store under `config.data_dir`.
    pub fn new(config: &PortalConfig) -> ClientResult<Self> {
        let tokens: Arc<dyn TokenSource> = match &config.token {
            Some(token) => Arc::new(StaticToken(token.clone())),
            None => Arc::new(config.session_store()),
        };
        Self::with_token_source(config, tokens)
    }

    /// Create a client reading its token from `tokens` on every request
    pub fn with_token_source(
        config: &PortalConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        let request = self.client.get(self.config.endpoint(path));
        let response = self.authorize(request).send().await?;
        Self::handle_response(response).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<B: Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<Value> {
        let request = self.client.put(self.config.endpoint(path)).json(body);
        let response = self.authorize(request).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<Value> {
        let request = self.client.post(self.config.endpoint(path)).json(body);
        let response = self.authorize(request).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    async fn handle_response(response: reqwest::Response) -> ClientResult<Value> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::FORBIDDEN => Err(ClientError::Forbidden(text)),
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(text)),
                StatusCode::BAD_REQUEST => Err(ClientError::Validation(text)),
                _ => Err(ClientError::Internal(text)),
            };
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// A mutation succeeded unless the envelope says otherwise
    fn check_ack(body: Value) -> ClientResult<()> {
        if body.is_null() {
            return Ok(());
        }
        Envelope::<Value>::from_value(body)?.into_data()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusUpdate {
    status: OrderStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignDelivery<'a> {
    delivery_boy_id: &'a str,
}

#[async_trait]
impl PortalApi for HttpClient {
    async fn list_orders(&self) -> ClientResult<Vec<Order>> {
        let body = self.get("vendor/orders").await?;
        Ok(normalize_orders(body)?)
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        tracing::info!("Updating order {} to {}", order_id, status);
        let body = self
            .put(
                &format!("vendor/orders/{}/status", order_id),
                &StatusUpdate { status },
            )
            .await?;
        Self::check_ack(body)
    }

    async fn list_delivery_team(&self) -> ClientResult<Vec<DeliveryTeamMember>> {
        let body = self.get("vendor/delivery-boys").await?;
        Ok(normalize_roster(body)?)
    }

    async fn assign_delivery_boy(&self, order_id: &str, delivery_boy_id: &str) -> ClientResult<()> {
        tracing::info!("Assigning delivery boy {} to order {}", delivery_boy_id, order_id);
        let body = self
            .post(
                &format!("vendor/orders/{}/assign-delivery", order_id),
                &AssignDelivery { delivery_boy_id },
            )
            .await?;
        Self::check_ack(body)
    }

    async fn vendor_profile(&self) -> ClientResult<VendorProfile> {
        let data = Envelope::<Value>::from_value(self.get("vendor/profile").await?)?
            .into_required()?;
        let profile = match data {
            Value::Object(mut map) if map.contains_key("vendor") => {
                map.remove("vendor").unwrap_or_default()
            }
            other => other,
        };
        Ok(serde_json::from_value(profile)?)
    }
}
