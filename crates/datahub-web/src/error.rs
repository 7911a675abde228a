use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use datahub_core::DataHubError;

#[expect(
    clippy::needless_pass_by_value,
    reason = "handlers naturally own error values from `Result` and pass them through"
)]
pub fn datahub_error_response(err: DataHubError, operation: &str, path: Option<String>) -> Response {
    let status = status_for_error(&err);
    if status.is_server_error() {
        tracing::warn!(operation, error = %err, "request failed");
    } else {
        tracing::debug!(operation, code = err.code(), "request rejected");
    }
    let payload = err.to_payload(operation, path);
    (status, Json(payload)).into_response()
}

fn status_for_error(err: &DataHubError) -> StatusCode {
    match err {
        DataHubError::MalformedPath(_)
        | DataHubError::InvalidQuery(_)
        | DataHubError::InvalidSubscriptionId(_)
        | DataHubError::Validation(_) => StatusCode::BAD_REQUEST,
        DataHubError::OperationRestricted { .. } => StatusCode::FORBIDDEN,
        DataHubError::NotFound(_) => StatusCode::NOT_FOUND,
        DataHubError::Conflict(_) => StatusCode::CONFLICT,
        DataHubError::IncompleteKey(_)
        | DataHubError::InvalidSubPath { .. }
        | DataHubError::UnknownParentCorpus { .. }
        | DataHubError::Service { .. }
        | DataHubError::Io(_)
        | DataHubError::Json(_)
        | DataHubError::Sqlite(_)
        | DataHubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
