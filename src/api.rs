//! # Upstream API Client Module
//!
//! Thin reqwest wrapper over the review platform's REST API. Three GET
//! endpoints are consumed: `departments/`, `restaurants/` and `comments/`.
//! All responses are JSON; a non-2xx status is reported as
//! [`BotError::Upstream`].

use serde::{Deserialize, Serialize};

use crate::errors::BotError;

/// Upstream department reference record
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Department {
    pub id: String,
    pub name: String,
}

/// Upstream restaurant reference record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub restaurant_id: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_url: Option<String>,
}

/// Restaurant descriptor embedded in each comment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommentRestaurant {
    pub name: String,
    #[serde(default)]
    pub review_url: Option<String>,
    #[serde(default)]
    pub type_comments_loader: String,
}

/// A single review comment as returned by the upstream API
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    /// Author display name
    pub name: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    pub stars: u8,
    pub restaurant: CommentRestaurant,
}

/// One page of the `comments/` collection
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommentPage {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Comment>,
}

/// Assembled query parameters for one `comments/` request.
///
/// The serialized form doubles as the per-session cache key, so two
/// requests with identical parameters hit the cache instead of the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentQuery {
    pub department_id: String,
    pub page: u32,
    pub page_size: String,
    pub created_at_after: Option<String>,
    pub created_at_before: Option<String>,
    pub stars: Option<String>,
    pub restaurant: Option<String>,
}

impl CommentQuery {
    /// Flatten into `(key, value)` pairs in a stable order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("department_id", self.department_id.clone()),
            ("page", self.page.to_string()),
            ("page_size", self.page_size.clone()),
        ];
        if let Some(after) = &self.created_at_after {
            pairs.push(("created_at_after", after.clone()));
        }
        if let Some(before) = &self.created_at_before {
            pairs.push(("created_at_before", before.clone()));
        }
        if let Some(stars) = &self.stars {
            pairs.push(("stars", stars.clone()));
        }
        if let Some(restaurant) = &self.restaurant {
            pairs.push(("restaurant", restaurant.clone()));
        }
        pairs
    }

    /// Stable serialization used as the session cache key
    pub fn cache_key(&self) -> String {
        self.to_pairs()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Client for the upstream review API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        pairs: &[(&'static str, String)],
    ) -> Result<T, BotError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.get(&url).query(pairs).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "HTTP {} {}",
                response.status(),
                url
            )));
        }
        Ok(response.json::<T>().await?)
    }

    /// Fetch the department reference list
    pub async fn departments(&self) -> Result<Vec<Department>, BotError> {
        self.get_json("departments/", &[]).await
    }

    /// Fetch the restaurant reference list
    pub async fn restaurants(&self) -> Result<Vec<Restaurant>, BotError> {
        self.get_json("restaurants/", &[]).await
    }

    /// Fetch one page of comments matching the assembled query
    pub async fn comments(&self, query: &CommentQuery) -> Result<CommentPage, BotError> {
        self.get_json("comments/", &query.to_pairs()).await
    }
}
