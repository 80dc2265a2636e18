//! Log streaming handlers

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use cslogs_core::{Error, StreamKind};
use cslogs_tail::FileTailSource;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::AppState;

pub const INVALID_TYPE_MESSAGE: &str =
    "If providing the query parameter `type`, it must take either `stdout` or `stderr` as its value";

/// Query string of the container log route
#[derive(Debug, Default, Deserialize)]
pub struct ContainerLogQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ContainerLogQuery {
    /// Requested stream; absent or empty means stdout
    pub fn stream_kind(&self) -> Option<StreamKind> {
        match self.kind.as_deref() {
            None | Some("") => Some(StreamKind::Stdout),
            Some(raw) => raw.parse().ok(),
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn container_logs(
    State(state): State<AppState>,
    Path((application, container)): Path<(String, String)>,
    Query(query): Query<ContainerLogQuery>,
) -> Response {
    let Some(kind) = query.stream_kind() else {
        return (StatusCode::BAD_REQUEST, INVALID_TYPE_MESSAGE).into_response();
    };

    let path = match state.layout.container_log(&application, &container, kind) {
        Ok(path) => path,
        Err(e) => {
            debug!("Rejected container log request: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let not_found = format!(
        "No {} logs were found for container[{}] in application[{}]",
        kind, container, application
    );
    stream_log(&state, path, not_found)
}

pub async fn host_logs(State(state): State<AppState>, Path(host): Path<String>) -> Response {
    let path = state.layout.host_log();
    let not_found = format!(
        "No logs were found for host[{}] at path[{}]",
        host,
        path.display()
    );
    stream_log(&state, path, not_found)
}

/// Answer with a live tail of `path`, or 404 with `not_found` as the body
fn stream_log(state: &AppState, path: PathBuf, not_found: String) -> Response {
    let source = match FileTailSource::with_config(&path, state.tail) {
        Ok(source) => source,
        Err(Error::FileNotFound(_)) => {
            debug!("{}", not_found);
            return (StatusCode::NOT_FOUND, not_found).into_response();
        }
        Err(e) => {
            warn!("Cannot stream {}: {}", path.display(), e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    info!("Streaming {}", path.display());
    let body = Body::from_stream(source.into_stream().map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(kind: Option<&str>) -> ContainerLogQuery {
        ContainerLogQuery {
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn test_stream_kind_from_query() {
        assert_eq!(query(None).stream_kind(), Some(StreamKind::Stdout));
        assert_eq!(query(Some("")).stream_kind(), Some(StreamKind::Stdout));
        assert_eq!(query(Some("stderr")).stream_kind(), Some(StreamKind::Stderr));
        assert_eq!(query(Some("bogus")).stream_kind(), None);
    }
}
