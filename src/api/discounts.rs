use reqwest::Method;
use serde_json::json;

use crate::api::models::{Discount, DiscountValidation};
use crate::api::{into_item, into_list, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

impl ApiClient {
    pub async fn active_discounts(&self, force_refresh: bool) -> ApiResponse<Vec<Discount>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(
            self.cached_request("/discounts/active", CacheType::Discounts, options)
                .await,
        )
    }

    /// Check a code against a meal plan. Not cached: validity depends on the moment.
    pub async fn validate_discount(
        &self,
        code: &str,
        meal_plan_id: Option<&str>,
    ) -> ApiResponse<DiscountValidation> {
        let body = json!({ "code": code, "mealPlanId": meal_plan_id });
        into_item(
            self.request(Method::POST, "/discounts/validate", Some(body))
                .await,
        )
    }
}
