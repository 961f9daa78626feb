//! Meal plans and their ratings.

use reqwest::Method;
use serde_json::json;

use crate::api::models::{MealPlan, NewRating, Rating};
use crate::api::{into_item, into_list, segment, ApiClient};
use crate::cache::CacheType;
use crate::http::{ApiResponse, CacheOptions};

impl ApiClient {
    pub async fn meal_plans(&self, force_refresh: bool) -> ApiResponse<Vec<MealPlan>> {
        let options = CacheOptions::default().force_refresh(force_refresh);
        into_list(self.cached_request("/mealplans", CacheType::MealPlans, options).await)
    }

    /// One meal plan, cached per id.
    pub async fn meal_plan(&self, id: &str, force_refresh: bool) -> ApiResponse<MealPlan> {
        let endpoint = format!("/mealplans/{}", segment(id));
        let options = CacheOptions::scoped(id).force_refresh(force_refresh);
        into_item(self.cached_request(&endpoint, CacheType::MealPlan, options).await)
    }

    pub async fn meal_plan_ratings(&self, meal_plan_id: &str) -> ApiResponse<Vec<Rating>> {
        let endpoint = format!("/ratings/mealplan/{}", segment(meal_plan_id));
        into_list(self.request(Method::GET, &endpoint, None).await)
    }

    /// Rate a meal plan. Cached plans are dropped since their average changes.
    pub async fn submit_rating(&self, rating: &NewRating) -> ApiResponse<Rating> {
        let response = self.request(Method::POST, "/ratings", Some(json!(rating))).await;
        if response.success {
            self.invalidate(&[CacheType::MealPlans, CacheType::MealPlan])
                .await;
        }
        into_item(response)
    }
}
