use crate::middleware::rate_limit::RateLimit;
use crate::models::news::Article;
use crate::service::news::NewsCache;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use std::sync::Arc;

/// Recent myopia articles from PubMed; `null` until the first refresh lands
#[openapi(tag = "News")]
#[get("/")]
pub async fn get_news(cache: &State<Arc<NewsCache>>, _rate_limit: RateLimit) -> Json<Option<Vec<Article>>> {
    Json(cache.articles().await)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_news]
}
