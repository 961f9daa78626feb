//! Customer subscriptions.

use reqwest::Method;
use serde_json::json;

use crate::api::models::{NewSubscription, Subscription};
use crate::api::{into_item, into_list, segment, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

/// Lifecycle actions on an existing subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionAction {
    Cancel,
    Pause,
    Resume,
}

impl SubscriptionAction {
    fn as_str(&self) -> &'static str {
        match self {
            SubscriptionAction::Cancel => "cancel",
            SubscriptionAction::Pause => "pause",
            SubscriptionAction::Resume => "resume",
        }
    }
}

impl ApiClient {
    pub async fn subscriptions(&self, force_refresh: bool) -> ApiResponse<Vec<Subscription>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(
            self.cached_request("/subscriptions", CacheType::Subscriptions, options)
                .await,
        )
    }

    /// Subscribe to a meal plan. New subscriptions generate orders, so both lists are invalidated.
    pub async fn create_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> ApiResponse<Subscription> {
        let response = self
            .request(Method::POST, "/subscriptions", Some(json!(subscription)))
            .await;
        if response.success {
            self.invalidate(&[CacheType::Subscriptions, CacheType::Orders])
                .await;
        }
        into_item(response)
    }

    pub async fn cancel_subscription(&self, id: &str) -> ApiResponse<Subscription> {
        self.subscription_action(id, SubscriptionAction::Cancel).await
    }

    pub async fn pause_subscription(&self, id: &str) -> ApiResponse<Subscription> {
        self.subscription_action(id, SubscriptionAction::Pause).await
    }

    pub async fn resume_subscription(&self, id: &str) -> ApiResponse<Subscription> {
        self.subscription_action(id, SubscriptionAction::Resume).await
    }

    async fn subscription_action(
        &self,
        id: &str,
        action: SubscriptionAction,
    ) -> ApiResponse<Subscription> {
        let endpoint = format!("/subscriptions/{}/{}", segment(id), action.as_str());
        let response = self.request(Method::PUT, &endpoint, None).await;
        if response.success {
            tracing::debug!(subscription = %id, action = action.as_str(), "Subscription updated");
            self.invalidate(&[CacheType::Subscriptions, CacheType::Orders])
                .await;
        }
        into_item(response)
    }
}
