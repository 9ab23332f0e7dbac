use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::JsonRejection,
        DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use bytes::{Bytes, BytesMut};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use profitboard_shared::leaderboard::{compute_rankings, Period};
use profitboard_shared::submission::{StatusChange, SubmissionInput};
use profitboard_shared::{FieldError, NewSubmission, Role, SubmissionStatus};
use profitboard_store::{Database, ProfileUpdate, StoreError};

use crate::auth::{require_admin, require_identity, resolve_identity};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::identity::IdentityProvider;
use crate::proof_store::{proof_key, ObjectStore};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub proofs: Arc<dyn ObjectStore>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    // Room for the proof image plus the JSON payload and multipart framing.
    let body_limit = state.config.max_proof_size + 1024 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/submissions", get(list_submissions).post(create_submission))
        .route(
            "/submissions/:id",
            patch(update_submission_status).delete(delete_submission),
        )
        .route("/users", get(list_users))
        .route("/users/:id/role", patch(update_user_role))
        .route("/leaderboard", get(leaderboard))
        .route("/me", get(get_me).put(save_me))
        .route("/notifications", post(notify))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

#[derive(Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
struct RoleBody {
    role: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    name: Option<String>,
    discord: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct NotificationBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Serialize)]
struct RoleChangeUser {
    id: Uuid,
    name: String,
    role: Role,
}

/// A proof file taken from a multipart submission.
struct ProofUpload {
    filename: Option<String>,
    content_type: String,
    bytes: Bytes,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn parse_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("Invalid id: {raw}")))
}

/// `?status=` and `?period=` mean the default, same as leaving them out.
fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    body.map(|Json(value)| value)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

// ─── Submissions ───

async fn list_submissions(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ServerError> {
    require_admin(&state, &headers).await?;

    let status = match non_blank(query.status.as_deref()) {
        Some(raw) => raw.parse::<SubmissionStatus>()?,
        None => SubmissionStatus::Pending,
    };

    let submissions = state.db.lock().await.list_submissions_with_owner(status)?;
    Ok(Json(json!({ "submissions": submissions })))
}

/// Accepts either a JSON body or `multipart/form-data` with a `payload`
/// JSON part and an optional `proof` file part.
async fn create_submission(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, ServerError> {
    let identity = require_identity(&state, request.headers()).await?;
    let (input, proof) = read_submission_body(&state, request).await?;

    let now = Utc::now();
    let mut details = input.validate(now).map_err(ServerError::Validation)?;

    if state.db.lock().await.find_profile(identity.id)?.is_none() {
        return Err(ServerError::BadRequest("Profile required".into()));
    }

    if let Some(proof) = proof.filter(|p| !p.bytes.is_empty()) {
        details.proof_url = upload_proof(&state, identity.id, proof).await;
    }

    let new = NewSubmission::new(identity.id, details, now);
    let submission = state.db.lock().await.insert_submission(&new)?;
    Ok(Json(json!({ "submission": submission })))
}

/// `payload` must precede `proof`. Once the payload is parsed, an oversized
/// or unreadable proof is dropped and the rest of the body is ignored.
async fn read_submission_body(
    state: &AppState,
    request: Request,
) -> Result<(SubmissionInput, Option<ProofUpload>), ServerError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let input = json_body(Json::<SubmissionInput>::from_request(request, state).await)?;
        return Ok((input, None));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let max_size = state.config.max_proof_size;
    let mut input: Option<SubmissionInput> = None;
    let mut proof = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if input.is_some() => {
                warn!(error = %e, "multipart body cut short, keeping the payload");
                break;
            }
            Err(e) => return Err(ServerError::BadRequest(format!("Multipart error: {}", e))),
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "payload" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                let parsed = serde_json::from_str::<SubmissionInput>(&text)
                    .map_err(|e| ServerError::BadRequest(format!("Invalid payload: {}", e)))?;
                input = Some(parsed);
            }
            "proof" => {
                let have_payload = input.is_some();
                match read_proof(field, max_size, !have_payload).await {
                    Ok(ProofRead::Complete(upload)) => proof = Some(upload),
                    Ok(ProofRead::TooLarge) => {
                        warn!(max = max_size, "proof too large, continuing without it");
                        proof = None;
                        if have_payload {
                            break;
                        }
                    }
                    Err(e) if have_payload => {
                        warn!(error = %e, "proof unreadable, continuing without it");
                        proof = None;
                        break;
                    }
                    Err(e) => {
                        let message = format!("Failed to read field: {e}");
                        return Err(ServerError::BadRequest(message));
                    }
                }
            }
            _ => {}
        }
    }

    let input = input.ok_or_else(|| {
        ServerError::BadRequest("Missing 'payload' field in multipart form".to_string())
    })?;
    Ok((input, proof))
}

enum ProofRead {
    Complete(ProofUpload),
    TooLarge,
}

/// Buffers at most `max_size` bytes. Past that the field is drained only
/// when `drain` is set, since later parts still have to be reached.
async fn read_proof(
    mut field: Field<'_>,
    max_size: usize,
    drain: bool,
) -> Result<ProofRead, MultipartError> {
    let filename = field.file_name().map(str::to_string);
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > max_size {
            if drain {
                while field.chunk().await?.is_some() {}
            }
            return Ok(ProofRead::TooLarge);
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(ProofRead::Complete(ProofUpload {
        filename,
        content_type,
        bytes: buf.freeze(),
    }))
}

/// Upload failures never fail the submission; they only drop the proof.
async fn upload_proof(state: &AppState, user_id: Uuid, proof: ProofUpload) -> Option<String> {
    let key = proof_key(user_id, proof.filename.as_deref());
    match state.proofs.put(&key, proof.bytes, &proof.content_type).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(
                user = %user_id,
                error = %e,
                "proof upload failed, continuing without it"
            );
            None
        }
    }
}

async fn update_submission_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let id = parse_id(&id)?;
    let change: StatusChange = json_body(body)?.status.parse()?;

    let submission = state
        .db
        .lock()
        .await
        .apply_status_change(id, change, Utc::now())
        .map_err(|e| match e {
            StoreError::NotFound => ServerError::NotFound("Submission not found".into()),
            other => other.into(),
        })?;

    info!(
        id = %id,
        status = %change.target(),
        by = ?admin.identity.as_ref().map(|i| i.id),
        via = ?admin.source,
        "submission reviewed"
    );
    Ok(Json(json!({ "submission": submission })))
}

async fn delete_submission(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let id = parse_id(&id)?;

    if !state.db.lock().await.delete_submission(id)? {
        return Err(ServerError::NotFound("Submission not found".into()));
    }

    info!(
        id = %id,
        by = ?admin.identity.as_ref().map(|i| i.id),
        via = ?admin.source,
        "submission removed by admin"
    );
    Ok(Json(json!({ "message": "Submission deleted successfully" })))
}

// ─── Users ───

async fn list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    require_admin(&state, &headers).await?;
    let users = state.db.lock().await.list_profiles_with_approved_counts()?;
    Ok(Json(json!({ "users": users })))
}

async fn update_user_role(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RoleBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let admin = require_admin(&state, &headers).await?;
    let id = parse_id(&id)?;
    let role: Role = json_body(body)?.role.parse()?;

    let is_self = admin.identity.as_ref().is_some_and(|i| i.id == id);
    if is_self && role != Role::Admin {
        return Err(ServerError::BadRequest(
            "You cannot remove your own admin privileges".into(),
        ));
    }

    let profile = state
        .db
        .lock()
        .await
        .set_role(id, role)
        .map_err(|e| match e {
            StoreError::NotFound => ServerError::NotFound("User not found".into()),
            other => other.into(),
        })?;

    info!(
        user = %id,
        role = %role,
        by = ?admin.identity.as_ref().map(|i| i.id),
        via = ?admin.source,
        "role updated"
    );
    Ok(Json(json!({
        "message": format!("User role updated to {role}"),
        "user": RoleChangeUser {
            id: profile.id,
            name: profile.name,
            role: profile.role,
        },
    })))
}

// ─── Leaderboard ───

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, ServerError> {
    let period = match non_blank(query.period.as_deref()) {
        Some(raw) => raw.parse::<Period>()?,
        None => Period::default(),
    };

    let (submissions, profiles) = {
        let db = state.db.lock().await;
        (
            db.list_submissions_by_status(SubmissionStatus::Approved)?,
            db.list_profiles()?,
        )
    };

    let rows = compute_rankings(&submissions, &profiles, period.window_start(&Local::now()));
    Ok(Json(json!({ "rows": rows })))
}

// ─── Current user ───

async fn get_me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    let Some(identity) = resolve_identity(&state, &headers).await else {
        return Ok(Json(json!({ "user": null, "profile": null })));
    };
    let profile = state.db.lock().await.find_profile(identity.id)?;
    Ok(Json(json!({ "user": identity, "profile": profile })))
}

async fn save_me(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Result<Json<ProfileBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let identity = require_identity(&state, &headers).await?;
    let body = json_body(body)?;

    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let Some(name) = trimmed(body.name) else {
        return Err(ServerError::Validation(vec![FieldError::new(
            "name",
            "is required",
        )]));
    };

    let update = ProfileUpdate {
        name,
        discord: trimmed(body.discord).unwrap_or_default(),
        avatar_url: trimmed(body.avatar_url),
    };
    let profile = state
        .db
        .lock()
        .await
        .upsert_profile(identity.id, &update, Utc::now())?;
    Ok(Json(json!({ "profile": profile })))
}

// ─── Notifications ───

async fn notify(
    body: Result<Json<NotificationBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let body = json_body(body)?;
    info!(
        kind = %body.kind.to_uppercase(),
        message = %body.message,
        data = ?body.data,
        "notification received"
    );
    Ok(Json(json!({
        "success": true,
        "message": "Notification sent successfully",
    })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
