use crate::error::{ProxyError, Result};
use crate::models;
use crate::translate::openai_types::{ModelList, ModelObject};
use crate::translate::response::unix_now;

use axum::extract::Path;
use axum::Json;

/// `GET /v1/models`: every known alias, all categories.
pub async fn list() -> Json<ModelList> {
    let created = unix_now();
    let data = models::catalog()
        .into_iter()
        .flat_map(|(_, aliases)| aliases)
        .map(|id| ModelObject::new(id, created))
        .collect();
    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}

/// `GET /v1/models/:model`
pub async fn retrieve(Path(model): Path<String>) -> Result<Json<ModelObject>> {
    models::find(&model)
        .map(|_| Json(ModelObject::new(&model, unix_now())))
        .ok_or_else(|| ProxyError::not_found(format!("Model '{model}'")))
}

/// `POST /v1/embeddings`
pub async fn embeddings() -> ProxyError {
    ProxyError::not_implemented("Embeddings")
}
