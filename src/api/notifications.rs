use reqwest::Method;

use crate::api::models::Notification;
use crate::api::{into_list, into_unit, segment, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

impl ApiClient {
    pub async fn notifications(&self, force_refresh: bool) -> ApiResponse<Vec<Notification>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(
            self.cached_request("/notifications", CacheType::Notifications, options)
                .await,
        )
    }

    pub async fn mark_notification_read(&self, id: &str) -> ApiResponse<()> {
        let endpoint = format!("/notifications/{}/read", segment(id));
        self.notification_update(&endpoint).await
    }

    pub async fn mark_all_notifications_read(&self) -> ApiResponse<()> {
        self.notification_update("/notifications/read-all").await
    }

    async fn notification_update(&self, endpoint: &str) -> ApiResponse<()> {
        let response = self.request(Method::PUT, endpoint, None).await;
        if response.success {
            self.invalidate(&[CacheType::Notifications]).await;
        }
        into_unit(response)
    }
}
