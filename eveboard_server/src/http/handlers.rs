use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use eveboard_app::{AppRuntime, DashboardOverview};
use eveboard_core::{
    ids::{CharacterId, GroupId, SyncJobId, TypeId},
    jobs::SyncJob,
    records::{AssetRecord, IndustryJobRecord, ResourceKind},
    sde::{SdeGroup, SdeType},
    time::Timestamp,
};
use eveboard_esi::{TokenSummary, TokenVerification};
use eveboard_store::Page;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::ApiError;

const DEFAULT_PAGE_LIMIT: u32 = 100;
const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    limit: Option<u32>,
    offset: Option<u32>,
}

impl PageParams {
    fn page(&self) -> Page {
        Page::new(
            self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT),
            self.offset.unwrap_or(0),
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct AssetsBody {
    assets: Vec<AssetRecord>,
    total_records: u64,
    synced_at: Option<Timestamp>,
}

#[derive(Serialize)]
pub(crate) struct IndustryJobsBody {
    jobs: Vec<IndustryJobRecord>,
    total_records: u64,
    synced_at: Option<Timestamp>,
}

pub(crate) async fn root() -> Json<Value> {
    Json(json!({ "message": "eveboard backend running" }))
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn login(State(runtime): State<AppRuntime>) -> Result<Response, ApiError> {
    let login = runtime.begin_login()?;
    Ok(Redirect::to(&login.authorization_url).into_response())
}

pub(crate) async fn callback(
    State(runtime): State<AppRuntime>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, ApiError> {
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err(ApiError::BadRequest(
            "callback requires code and state query parameters".to_owned(),
        ));
    };

    let token = runtime.complete_login(code.trim(), state.trim()).await?;
    Ok(Json(json!({
        "status": "ok",
        "token_id": token.character_id,
        "character_name": token.character_name,
    })))
}

pub(crate) async fn verify_token(
    State(runtime): State<AppRuntime>,
    Path(token_id): Path<u64>,
) -> Result<Json<TokenVerification>, ApiError> {
    Ok(Json(runtime.verify_token(CharacterId(token_id)).await?))
}

pub(crate) async fn refresh_token(
    State(runtime): State<AppRuntime>,
    Path(token_id): Path<u64>,
) -> Result<Json<TokenSummary>, ApiError> {
    Ok(Json(runtime.refresh_token(CharacterId(token_id)).await?))
}

pub(crate) async fn enqueue_assets(
    State(runtime): State<AppRuntime>,
    Path(token_id): Path<u64>,
) -> Result<Json<SyncJob>, ApiError> {
    let job = runtime
        .enqueue_sync(CharacterId(token_id), ResourceKind::Assets)
        .await?;
    Ok(Json(job))
}

pub(crate) async fn enqueue_industry_jobs(
    State(runtime): State<AppRuntime>,
    Path(token_id): Path<u64>,
) -> Result<Json<SyncJob>, ApiError> {
    let job = runtime
        .enqueue_sync(CharacterId(token_id), ResourceKind::IndustryJobs)
        .await?;
    Ok(Json(job))
}

pub(crate) async fn job_status(
    State(runtime): State<AppRuntime>,
    Path(job_id): Path<String>,
) -> Result<Json<SyncJob>, ApiError> {
    let job_id: SyncJobId = job_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("'{job_id}' is not a sync job id")))?;
    Ok(Json(runtime.job_status(job_id).await?))
}

pub(crate) async fn overview(
    State(runtime): State<AppRuntime>,
) -> Result<Json<DashboardOverview>, ApiError> {
    Ok(Json(runtime.overview().await?))
}

pub(crate) async fn assets(
    State(runtime): State<AppRuntime>,
    Path(character_id): Path<u64>,
    Query(params): Query<PageParams>,
) -> Result<Json<AssetsBody>, ApiError> {
    let cached = runtime
        .assets(CharacterId(character_id), params.page())
        .await?;
    Ok(Json(AssetsBody {
        assets: cached.records,
        total_records: cached.total_records,
        synced_at: cached.synced_at,
    }))
}

pub(crate) async fn industry_jobs(
    State(runtime): State<AppRuntime>,
    Path(character_id): Path<u64>,
    Query(params): Query<PageParams>,
) -> Result<Json<IndustryJobsBody>, ApiError> {
    let cached = runtime
        .industry_jobs(CharacterId(character_id), params.page())
        .await?;
    Ok(Json(IndustryJobsBody {
        jobs: cached.records,
        total_records: cached.total_records,
        synced_at: cached.synced_at,
    }))
}

pub(crate) async fn sde_type(
    State(runtime): State<AppRuntime>,
    Path(type_id): Path<i32>,
) -> Result<Json<SdeType>, ApiError> {
    Ok(Json(runtime.sde_type(TypeId(type_id))?))
}

pub(crate) async fn sde_group(
    State(runtime): State<AppRuntime>,
    Path(group_id): Path<i32>,
) -> Result<Json<SdeGroup>, ApiError> {
    Ok(Json(runtime.sde_group(GroupId(group_id))?))
}
