use axum::{
    extract::{OriginalUri, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::queries::{AssembleManifestQuery, ManifestError};
use crate::api::response::ErrorResponse;
use crate::features::FeatureState;

const MANIFEST_SUFFIX: &str = ".manifest";

pub fn manifest_routes() -> Router<FeatureState> {
    Router::new().route("/work/:reference", get(get_manifest))
}

/// Absolute URL of the current request, query string dropped
fn request_url(state: &FeatureState, headers: &HeaderMap, path: &str) -> String {
    let base = match state.public_base_url {
        Some(ref base) => base.clone(),
        None => {
            let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok());
            let proto = header_str(header::HeaderName::from_static("x-forwarded-proto"))
                .unwrap_or("http");
            let host = header_str(header::HOST).unwrap_or("localhost");
            format!("{}://{}", proto, host)
        },
    };
    format!("{}{}", base, path)
}

/// Assembled presentation manifest for a work
///
/// GET /work/:reference.manifest
#[tracing::instrument(skip(state, headers, uri))]
async fn get_manifest(
    State(state): State<FeatureState>,
    Path(reference): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, ManifestApiError> {
    let work_id = reference
        .strip_suffix(MANIFEST_SUFFIX)
        .ok_or(ManifestApiError::NotAManifest)?;

    let query = AssembleManifestQuery {
        work_id: work_id.to_string(),
        request_url: request_url(&state, &headers, uri.path()),
    };

    let manifest = super::queries::assemble_manifest::handle(&state, query).await?;

    Ok((StatusCode::OK, Json(manifest)).into_response())
}

#[derive(Debug)]
enum ManifestApiError {
    NotAManifest,
    Assembly(ManifestError),
}

impl From<ManifestError> for ManifestApiError {
    fn from(err: ManifestError) -> Self {
        Self::Assembly(err)
    }
}

impl IntoResponse for ManifestApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotAManifest => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Manifest references must end in .manifest".to_string(),
            ),
            Self::Assembly(ref err @ ManifestError::ReferenceRequired) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
            },
            Self::Assembly(ref err @ ManifestError::WorkNotFound(_)) => {
                tracing::debug!("{}", err);
                (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            },
            Self::Assembly(ref err @ (ManifestError::Upstream(_) | ManifestError::MalformedManifest(_))) => {
                tracing::error!("Manifest assembly failed: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The asset registry did not return a usable manifest".to_string(),
                )
            },
            Self::Assembly(ref err @ ManifestError::Timeout { .. }) => {
                tracing::error!("Manifest assembly failed: {}", err);
                (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", err.to_string())
            },
            Self::Assembly(ref err @ ManifestError::Store(_)) => {
                tracing::error!("Manifest assembly failed: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
