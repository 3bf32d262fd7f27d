//! Collection manifests (reserved)

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::api::response::ErrorResponse;

pub fn collection_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/collection/:reference", get(get_collection))
}

async fn get_collection(Path(reference): Path<String>) -> Response {
    tracing::debug!(reference = %reference, "Collection requested");
    let error = ErrorResponse::new("NOT_IMPLEMENTED", "Collections are not available yet");
    (StatusCode::NOT_IMPLEMENTED, Json(error)).into_response()
}
