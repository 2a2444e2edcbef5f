use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::auth::verify;
use crate::config::{media_key, media_meta_key};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, path_segment, store, validate_uuid};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::MediaMeta;

/// Target crop requested for an upload. The crop itself happens outside
/// this service; the ratio is recorded with the stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Portrait,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "square" => Ok(AspectRatio::Square),
            "portrait" => Ok(AspectRatio::Portrait),
            other => Err(ApiError::Validation(format!(
                "Unknown aspect ratio: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "square",
            AspectRatio::Portrait => "portrait",
        }
    }
}

/// Accepts raw image bytes and hands back an addressable URL.
pub trait MediaProcessor {
    fn store(
        &self,
        bytes: &[u8],
        ratio: AspectRatio,
        content_type: &str,
    ) -> Result<String, ApiError>;
}

/// Media processor backed by the document store: bytes under `media:{id}`,
/// metadata alongside, addressed as `/media/{id}`.
pub struct KvMediaProcessor<'a> {
    store: &'a dyn DocumentStore,
    owner: String,
}

impl<'a> KvMediaProcessor<'a> {
    pub fn new(store: &'a dyn DocumentStore, owner: &str) -> Self {
        Self {
            store,
            owner: owner.to_string(),
        }
    }
}

impl MediaProcessor for KvMediaProcessor<'_> {
    fn store(
        &self,
        bytes: &[u8],
        ratio: AspectRatio,
        content_type: &str,
    ) -> Result<String, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::Validation("Image bytes required".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        self.store.set(&media_key(&id), bytes)?;
        self.store.set_json(
            &media_meta_key(&id),
            &MediaMeta {
                content_type: content_type.to_string(),
                ratio: ratio.as_str().to_string(),
                user_id: self.owner.clone(),
                created_at: now_iso(),
            },
        )?;

        Ok(format!("/media/{}", id))
    }
}

// === HTTP Handlers ===

pub fn handle_upload(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let params = crate::core::query_params::parse_query_params(req.uri());
    let ratio_param = crate::core::query_params::get_string(&params, "ratio", Some("square"))
        .unwrap_or_default();
    let ratio = match AspectRatio::parse(&ratio_param) {
        Ok(r) => r,
        Err(err) => return Ok(err.into()),
    };
    let content_type = req
        .header("Content-Type")
        .and_then(|h| h.as_str())
        .unwrap_or("application/octet-stream")
        .to_string();

    let processor = KvMediaProcessor::new(store.as_ref(), &actor_id);
    match processor.store(req.body(), ratio, &content_type) {
        Ok(url) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "url": url }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_serve(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let media_id = path_segment(req.path(), 1).unwrap_or_default();
    if media_id.is_empty() || !validate_uuid(media_id) {
        return Ok(ApiError::Validation("Media ID required".to_string()).into());
    }

    let meta = match store.get_json::<MediaMeta>(&media_meta_key(media_id))? {
        Some(m) => m,
        None => return Ok(ApiError::NotFound("media".to_string()).into()),
    };
    let bytes = match store.get(&media_key(media_id))? {
        Some(b) => b,
        None => return Ok(ApiError::NotFound("media".to_string()).into()),
    };

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", meta.content_type.as_str())
        .body(bytes)
        .build())
}
