use rocket::serde::Serialize;
use schemars::JsonSchema;

/// A PubMed article summary served from the news cache.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub journal: String,
    pub date: String,
    pub author: String,
    pub r#abstract: String,
    pub url: String,
}
