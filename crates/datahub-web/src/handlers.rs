use axum::{
    Json,
    body::Bytes,
    extract::{Path as AxumPath, RawQuery, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use datahub_core::{
    ControlType, DataHubError, ListOptions, Op, Path, Result, SearchRequest, User,
};

use crate::WebState;
use crate::dto::{AclStatusResponse, CreatedResponse, Params, QueuedResponse, parse_document};
use crate::error::datahub_error_response;

pub const USER_HEADER: &str = "x-datahub-user";
pub const ADMIN_HEADER: &str = "x-datahub-admin";

const ACL_RESOURCE: &str = "__acl__";
const INDEX_RESOURCE: &str = "__index__";

/// What a request path names once special trailing segments are peeled off.
enum Resource {
    Document(Path),
    Acl(Path),
    Index(Path),
}

impl Resource {
    fn resolve(path: Path) -> Self {
        match path.last().and_then(|segment| segment.name()) {
            Some(ACL_RESOURCE) => Self::Acl(path.parent()),
            Some(INDEX_RESOURCE) => Self::Index(path.parent()),
            _ => Self::Document(path),
        }
    }
}

/// Request context shared by every verb.
struct Call<'a> {
    state: &'a WebState,
    user: User,
    params: Params,
    raw_path: String,
}

pub async fn drain_matches(State(state): State<WebState>, headers: HeaderMap) -> Response {
    let user = acting_user(&headers);
    match state.hub.inbox().drain(user.effective_id()) {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => datahub_error_response(err, "matches.drain", None),
    }
}

pub async fn dispatch_root(
    State(state): State<WebState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(&state, &method, &headers, "/".to_string(), query.as_deref(), &body)
}

pub async fn dispatch_path(
    State(state): State<WebState>,
    AxumPath(path): AxumPath<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    dispatch(
        &state,
        &method,
        &headers,
        format!("/{path}"),
        query.as_deref(),
        &body,
    )
}

fn dispatch(
    state: &WebState,
    method: &Method,
    headers: &HeaderMap,
    raw_path: String,
    query: Option<&str>,
    body: &[u8],
) -> Response {
    let operation = operation_name(method);
    let path = match Path::parse(&raw_path) {
        Ok(path) => path,
        Err(err) => return datahub_error_response(err, operation, Some(raw_path)),
    };
    let list = raw_path.ends_with('/');
    let call = Call {
        state,
        user: acting_user(headers),
        params: Params::parse(query),
        raw_path,
    };

    let outcome = match (method.clone(), Resource::resolve(path)) {
        (Method::GET, Resource::Acl(path)) => call.acl_status(&path),
        (Method::PUT, Resource::Acl(path)) => call.acl_update(&path),
        (Method::GET, Resource::Index(path)) => call.index_view(&path),
        (Method::DELETE, Resource::Index(path)) => call.index_delete(&path),
        (Method::GET, Resource::Document(path)) if list => call.list(&path),
        (Method::GET, Resource::Document(path)) if call.params.has("q") => call.search(&path),
        (Method::GET, Resource::Document(path)) => call.retrieve(&path),
        (Method::POST, Resource::Document(path)) => call.create(&path, body),
        (Method::PUT, Resource::Document(path)) => call.update(&path, body),
        (Method::DELETE, Resource::Document(path)) => call.delete(&path),
        _ => {
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{method} is not supported on {}", call.raw_path),
            )
                .into_response();
        }
    };

    outcome.unwrap_or_else(|err| datahub_error_response(err, operation, Some(call.raw_path)))
}

impl Call<'_> {
    fn retrieve(&self, path: &Path) -> Result<Response> {
        let doc = self.state.hub.store_for(path)?.retrieve(path, &self.user)?;
        Ok((StatusCode::OK, Json(doc)).into_response())
    }

    fn list(&self, path: &Path) -> Result<Response> {
        let options = ListOptions {
            offset: self.params.usize_or("offset", 0)?,
            limit: self
                .params
                .usize_or("limit", self.state.hub.config().default_limit)?,
            fields: self.params.all("fields"),
            order: self.params.get("order").map(str::to_string),
        };
        let listing = self
            .state
            .hub
            .store_for(path)?
            .list(path, &options, &self.user)?;
        Ok((StatusCode::OK, Json(listing)).into_response())
    }

    fn search(&self, path: &Path) -> Result<Response> {
        let request = SearchRequest {
            query: self.params.get("q").unwrap_or_default().to_string(),
            offset: self.params.usize_or("offset", 0)?,
            limit: self
                .params
                .usize_or("limit", self.state.hub.config().default_limit)?,
            endpoint: Some(self.user.effective_id().to_string()),
            duration: self.params.i64_or("duration", -1)?,
        };
        let response = self
            .state
            .hub
            .store_for(path)?
            .search(path, &request, &self.user)?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    fn create(&self, parent: &Path, body: &[u8]) -> Result<Response> {
        let doc = parse_document(body)?;
        let created = self
            .state
            .hub
            .store_for(parent)?
            .create(parent, &doc, &self.user)?;
        let location = created.to_string();
        Ok((
            StatusCode::CREATED,
            [(header::LOCATION, location.clone())],
            Json(CreatedResponse { path: location }),
        )
            .into_response())
    }

    fn update(&self, path: &Path, body: &[u8]) -> Result<Response> {
        let doc = parse_document(body)?;
        self.state
            .hub
            .store_for(path)?
            .update(path, &doc, &self.user)?;
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    fn delete(&self, path: &Path) -> Result<Response> {
        self.state
            .hub
            .store_for(path)?
            .delete(&self.user, std::slice::from_ref(path))?;
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// With `op`, whether `user` (default: the caller) may perform it here.
    /// Without, the raw record stored at this path, for admins only.
    fn acl_status(&self, path: &Path) -> Result<Response> {
        let acl = self.state.hub.acl();
        if !self.params.has("op") {
            self.require_admin(path, Op::Read)?;
            let record = acl.get_acl(path)?.unwrap_or_default();
            return Ok((StatusCode::OK, Json(record)).into_response());
        }

        let op = self.params.op()?;
        let subject = self
            .params
            .get("user")
            .map_or_else(|| self.user.clone(), User::new);
        let status = if acl.is_restricted(path, &subject, op)? {
            "restricted"
        } else {
            "allowed"
        };
        Ok((
            StatusCode::OK,
            Json(AclStatusResponse {
                path: path.to_string(),
                user: subject.effective_id().to_string(),
                op,
                status,
            }),
        )
            .into_response())
    }

    fn acl_update(&self, path: &Path) -> Result<Response> {
        self.require_admin(path, Op::Update)?;
        let op = self.params.op()?;
        let subject = self
            .params
            .get("user")
            .ok_or_else(|| DataHubError::Validation("missing parameter: user".to_string()))?;
        let control = match self.params.get("control") {
            None | Some("allow") => ControlType::Allow,
            Some("restrict") => ControlType::Restrict,
            Some(other) => {
                return Err(DataHubError::Validation(format!(
                    "unknown control type: {other}"
                )));
            }
        };

        let acl = self.state.hub.acl();
        match (control, self.params.has("clear")) {
            (ControlType::Allow, false) => acl.set_allowed(path, subject, op)?,
            (ControlType::Allow, true) => acl.clear_allowed(path, subject, op)?,
            (ControlType::Restrict, false) => acl.set_restricted(path, subject, op)?,
            (ControlType::Restrict, true) => acl.clear_restricted(path, subject, op)?,
        }
        tracing::info!(
            path = %path,
            user = subject,
            op = %op,
            by = self.user.effective_id(),
            "acl updated"
        );
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    fn index_view(&self, path: &Path) -> Result<Response> {
        let store = self.state.hub.store_for(path)?;
        if self.params.has("queries") {
            let limit = self
                .params
                .usize_or("limit", self.state.hub.config().default_limit)?;
            let expires_before = self.params.time("expiresBefore")?;
            let queries = store.retrieve_queries(&self.user, path, limit, expires_before)?;
            return Ok((StatusCode::OK, Json(queries)).into_response());
        }
        let map = store.get_index_map(path, &self.user)?;
        Ok((StatusCode::OK, Json(map)).into_response())
    }

    fn index_delete(&self, path: &Path) -> Result<Response> {
        let store = self.state.hub.store_for(path)?;
        let ids = self.params.all("queryId");
        if !ids.is_empty() {
            store.delete_queries(&self.user, path, &ids)?;
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
        let batches = store.delete_indexes(path, &self.user)?;
        Ok((StatusCode::ACCEPTED, Json(QueuedResponse { batches })).into_response())
    }

    fn require_admin(&self, path: &Path, op: Op) -> Result<()> {
        if self.user.is_admin() {
            return Ok(());
        }
        Err(DataHubError::OperationRestricted {
            path: path.to_string(),
            user: self.user.effective_id().to_string(),
            op,
        })
    }
}

fn acting_user(headers: &HeaderMap) -> User {
    let id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let admin = headers
        .get(ADMIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
    match (id, admin) {
        (Some(id), true) => User::admin(id),
        (Some(id), false) => User::new(id),
        (None, true) => User::admin(datahub_core::user::ANONYMOUS_USER),
        (None, false) => User::anonymous(),
    }
}

fn operation_name(method: &Method) -> &'static str {
    match *method {
        Method::GET => "document.read",
        Method::POST => "document.create",
        Method::PUT => "document.update",
        Method::DELETE => "document.delete",
        _ => "document.unsupported",
    }
}
