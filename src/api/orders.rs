//! Orders, for customers and drivers.

use reqwest::Method;
use serde_json::json;

use crate::api::models::{Location, Order, OrderStatus};
use crate::api::{into_item, into_list, into_unit, segment, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

impl ApiClient {
    pub async fn orders(&self, force_refresh: bool) -> ApiResponse<Vec<Order>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(self.cached_request("/orders", CacheType::Orders, options).await)
    }

    pub async fn order(&self, id: &str) -> ApiResponse<Order> {
        let endpoint = format!("/orders/{}", segment(id));
        into_item(self.request(Method::GET, &endpoint, None).await)
    }

    /// Orders assigned to the logged-in driver.
    pub async fn driver_orders(&self, force_refresh: bool) -> ApiResponse<Vec<Order>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(
            self.cached_request("/driver/orders", CacheType::DriverOrders, options)
                .await,
        )
    }

    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> ApiResponse<Order> {
        let endpoint = format!("/orders/{}/status", segment(id));
        let response = self
            .request(Method::PUT, &endpoint, Some(json!({ "status": status })))
            .await;
        if response.success {
            self.invalidate(&[CacheType::DriverOrders, CacheType::Orders])
                .await;
        }
        into_item(response)
    }

    pub async fn update_driver_location(&self, location: Location) -> ApiResponse<()> {
        into_unit(
            self.request(Method::PUT, "/driver/location", Some(json!(location)))
                .await,
        )
    }
}
