//! Success-response envelope: `{data: {type, id, attributes}, meta?, links?}`.
//! Errors use `ApiError`'s own `IntoResponse`, never this shape.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Resource<T: Serialize> {
    #[serde(rename = "type")]
    pub resource_type: &'static str,
    pub id: String,
    pub attributes: T,
}

#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<serde_json::Value>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: None,
            links: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_links(mut self, links: serde_json::Value) -> Self {
        self.links = Some(links);
        self
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Wraps a single resource into `{data: {type, id, attributes}}`.
pub fn single<T: Serialize>(resource_type: &'static str, id: impl ToString, attributes: T) -> Envelope<Resource<T>> {
    Envelope::new(Resource {
        resource_type,
        id: id.to_string(),
        attributes,
    })
}

/// Wraps a page of resources plus pagination links.
pub fn page<T: Serialize>(
    resource_type: &'static str,
    items: Vec<(String, T)>,
    has_more: bool,
    next_cursor: Option<String>,
) -> Envelope<Vec<Resource<T>>> {
    let data = items
        .into_iter()
        .map(|(id, attributes)| Resource {
            resource_type,
            id,
            attributes,
        })
        .collect();
    let envelope = Envelope::new(data).with_meta(serde_json::json!({ "has_more": has_more }));
    match next_cursor {
        Some(cursor) => envelope.with_links(serde_json::json!({ "next": cursor })),
        None => envelope,
    }
}
