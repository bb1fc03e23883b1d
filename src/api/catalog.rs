use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::Gateway;
use crate::error::{ClientError, ClientResult};
use crate::gateway::{segment, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(deserialize_with = "super::money::number_or_string")]
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub primary_photo_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl Product {
    /// Primary photo first, then the gallery, without repeats.
    pub fn gallery(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.photos.len() + 1);
        let candidates = self.primary_photo_url.iter().chain(self.photos.iter().map(|p| &p.url));
        for url in candidates {
            if !url.trim().is_empty() && !out.contains(url) {
                out.push(url.clone());
            }
        }
        out
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity.map_or(true, |n| n > 0)
    }
}

/// Create/update payload. `slug` is derived from the name on the way out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub price: f64,
    pub stock_quantity: u32,
    pub short_description: String,
    pub long_description: String,
    pub primary_photo_url: String,
    pub category_id: String,
    pub other_photos: Vec<String>,
}

impl ProductInput {
    fn payload(&self) -> ClientResult<Value> {
        if self.name.trim().is_empty() {
            return Err(ClientError::invalid("product name is required"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ClientError::invalid("product price must be a non-negative number"));
        }
        let mut v = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut v {
            map.insert("slug".into(), Value::String(slugify(&self.name)));
            if let Some(Value::Array(photos)) = map.get_mut("otherPhotos") {
                photos.retain(|p| p.as_str().is_some_and(|s| !s.trim().is_empty()));
            }
        }
        Ok(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub rating: Option<u8>,
    /// Author, timestamps and anything else the backend attaches.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct NewComment<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<u8>,
}

/// URL slug for a product name. Turkish letters fold to ASCII, whitespace runs
/// become `-`, anything else outside `[A-Za-z0-9_-]` is dropped and runs of `-`
/// collapse to one. Leading and trailing dashes are kept.
pub fn slugify(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(|c| match c {
            'ç' | 'Ç' => 'c',
            'ğ' | 'Ğ' => 'g',
            'ı' | 'İ' => 'i',
            'ö' | 'Ö' => 'o',
            'ş' | 'Ş' => 's',
            'ü' | 'Ü' => 'u',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();

    let mut dashed = String::with_capacity(folded.len());
    let mut in_space = false;
    for c in folded.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                dashed.push('-');
            }
            in_space = true;
        } else {
            in_space = false;
            dashed.push(c);
        }
    }

    let mut out = String::with_capacity(dashed.len());
    for c in dashed.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-') {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

pub struct CatalogApi {
    gateway: Gateway,
}

impl CatalogApi {
    pub fn new(gateway: Gateway) -> Self { Self { gateway } }

    pub async fn list_products(&self) -> ClientResult<Vec<Product>> {
        self.gateway.send_json(ApiRequest::get("/products")).await
    }

    pub async fn get_product(&self, id: &str) -> ClientResult<Product> {
        self.gateway.send_json(ApiRequest::get(format!("/products/{}", segment(id)))).await
    }

    /// Product pages are addressed by slug; the backend has no slug lookup.
    pub async fn find_by_slug(&self, slug: &str) -> ClientResult<Product> {
        let all = self.list_products().await?;
        all.into_iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| ClientError::NotFound { message: format!("no product with slug '{}'", slug) })
    }

    pub async fn create_product(&self, input: &ProductInput) -> ClientResult<Product> {
        let req = ApiRequest::post("/products").json(&input.payload()?)?;
        let created: Product = self.gateway.send_json(req).await?;
        debug!(target: "velovis::api", "product created id={}", created.id);
        Ok(created)
    }

    pub async fn update_product(&self, id: &str, input: &ProductInput) -> ClientResult<Product> {
        let req = ApiRequest::patch(format!("/products/{}", segment(id))).json(&input.payload()?)?;
        self.gateway.send_json(req).await
    }

    pub async fn delete_product(&self, id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::delete(format!("/products/{}", segment(id)))).await?;
        Ok(())
    }

    pub async fn list_comments(&self, product_id: &str) -> ClientResult<Vec<Comment>> {
        self.gateway.send_json(ApiRequest::get(format!("/products/{}/comments", segment(product_id)))).await
    }

    pub async fn add_comment(&self, product_id: &str, content: &str, rating: Option<u8>) -> ClientResult<Comment> {
        if content.trim().is_empty() {
            return Err(ClientError::invalid("comment must not be empty"));
        }
        if let Some(r) = rating {
            if !(1..=5).contains(&r) {
                return Err(ClientError::invalid("rating must be between 1 and 5"));
            }
        }
        let req = ApiRequest::post(format!("/products/{}/comments", segment(product_id))).json(&NewComment { content, rating })?;
        self.gateway.send_json(req).await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> ClientResult<()> {
        self.gateway.send(ApiRequest::delete(format!("/products/comments/{}", segment(comment_id)))).await?;
        Ok(())
    }

    pub async fn list_categories(&self) -> ClientResult<Vec<Category>> {
        self.gateway.send_json(ApiRequest::get("/categories")).await
    }
}
