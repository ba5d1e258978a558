//! HTTP backend client
//!
//! Talks to a hosted PostgREST-style service: tables under `/rest/v1`,
//! the session user under `/auth/v1/user`. Filters use the `column=eq.value`
//! query syntax and every request carries the project api key.

use super::RemoteBackend;
use crate::config::USER_AGENT;
use crate::entity::Collection;
use crate::error::{AppError, Result};
use crate::services::settings::RemoteSettings;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Session user as returned by the auth endpoint
#[derive(Deserialize, Debug)]
struct AuthUser {
    id: String,
}

/// Backend reached over HTTPS
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestBackend {
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            access_token: settings.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }

    fn auth_user_url(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }

    /// An empty project URL means "no backend", which is an outage, not an
    /// empty account
    fn ensure_configured(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(AppError::Settings("no remote URL configured".to_string()));
        }
        Ok(())
    }

    /// Request with the api key and the best available bearer token
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);

        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Turn a non-success status into `AppError::Remote`
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|e| format!("unreadable error body: {}", e));

        Err(AppError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn current_user(&self) -> Result<Option<String>> {
        self.ensure_configured()?;
        if self.access_token.is_none() {
            return Ok(None);
        }

        let response = self
            .request(Method::GET, &self.auth_user_url())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Session token rejected, treating as signed out");
            return Ok(None);
        }

        let user: AuthUser = Self::check(response).await?.json().await?;
        Ok(Some(user.id))
    }

    async fn select(&self, collection: Collection, user_id: &str) -> Result<Vec<Value>> {
        self.ensure_configured()?;

        let response = self
            .request(Method::GET, &self.table_url(collection))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<Value> = Self::check(response).await?.json().await?;
        tracing::debug!("Fetched {} {} rows", rows.len(), collection);
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, row: Value) -> Result<()> {
        self.ensure_configured()?;

        let response = self
            .request(Method::POST, &self.table_url(collection))
            .header("Prefer", "return=minimal")
            .json(&[row])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<()> {
        self.ensure_configured()?;

        let response = self
            .request(Method::PATCH, &self.table_url(collection))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.ensure_configured()?;

        let response = self
            .request(Method::DELETE, &self.table_url(collection))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
