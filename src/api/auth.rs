//! Authentication and profile endpoints.

use reqwest::Method;
use serde_json::json;

use crate::api::models::{AuthSession, Credentials, ProfileUpdate, SignupRequest, User};
use crate::api::{into_item, into_unit, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

impl ApiClient {
    /// Log in and keep the returned token.
    pub async fn login(&self, email: &str, password: &str) -> ApiResponse<AuthSession> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .request(Method::POST, "/auth/login", Some(json!(credentials)))
            .await;
        self.start_session(into_item(response)).await
    }

    /// Register and keep the returned token.
    pub async fn signup(&self, signup: &SignupRequest) -> ApiResponse<AuthSession> {
        let response = self
            .request(Method::POST, "/auth/register", Some(json!(signup)))
            .await;
        self.start_session(into_item(response)).await
    }

    /// Notify the backend, then drop the token and every cached entry.
    ///
    /// Local state is cleared even when the backend call fails.
    pub async fn logout(&self) -> ApiResponse<()> {
        if self.token_store().get_stored_token().await.is_some() {
            let response = self.request(Method::POST, "/auth/logout", None).await;
            if !response.success {
                tracing::warn!(error = ?response.error, "Backend logout failed, clearing local session anyway");
            }
        }
        self.end_session().await;
        ApiResponse::ok(())
    }

    pub async fn current_user(&self, force_refresh: bool) -> ApiResponse<User> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_item(self.cached_request("/auth/me", CacheType::Profile, options).await)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResponse<User> {
        let response = self
            .request(Method::PUT, "/users/profile", Some(json!(update)))
            .await;
        if response.success {
            self.invalidate(&[CacheType::Profile]).await;
        }
        into_item(response)
    }

    /// Delete the account. On success the local session is cleared as in [`logout`](Self::logout).
    pub async fn delete_account(&self) -> ApiResponse<()> {
        let response = self.request(Method::DELETE, "/users/profile", None).await;
        if response.success {
            self.end_session().await;
        }
        into_unit(response)
    }

    async fn start_session(&self, response: ApiResponse<AuthSession>) -> ApiResponse<AuthSession> {
        match response.data.as_ref().map(|session| session.token.as_str()) {
            Some(token) if !token.is_empty() => {
                self.token_store().store_token(token).await;
                tracing::info!("Session started");
            }
            _ if response.success => {
                tracing::warn!("Authentication response carried no token");
            }
            _ => {}
        }
        response
    }

    async fn end_session(&self) {
        self.token_store().remove_token().await;
        self.cache().clear_all().await;
        tracing::info!("Session ended");
    }
}
