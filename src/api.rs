//! HTTP API for Flocktrack.
//!
//! Handlers are thin: deserialize, call the service or a repository,
//! map the domain error into a response. Collection routes are nested
//! under their parent (`/farms/:farm_id/flocks`, `/flocks/:flock_id/...`)
//! and return 404 before touching children when the parent id is unknown.
//! Record-by-id routes are flat (`/health-records/:id` and friends).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::model::{
    AgeGroup, EnvironmentRecord, FamilyTreeNode, Farm, FeedConsumptionRecord, Flock, GrowthRecord,
    HealthRecord, MortalityTrend, ProductionRecord, RecordType,
};
use crate::repository::farm::{FarmUpdate, NewFarm};
use crate::repository::flock::{FlockUpdate, NewFlock};
use crate::repository::tracking::{
    DEFAULT_DISEASE_MIN_INCIDENTS, DEFAULT_DISEASE_PERIOD_DAYS, DEFAULT_MORTALITY_PERIOD_DAYS,
    DEFAULT_MORTALITY_THRESHOLD_DEATHS, EnvironmentRecordUpdate, FeedRecordUpdate,
    GrowthRecordUpdate, HealthRecordUpdate, NewEnvironmentRecord, NewFeedRecord, NewGrowthRecord,
    NewHealthRecord, NewProductionRecord, ProductionRecordUpdate,
};
use crate::service::FarmService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: FarmService,
}

/// Build the full route tree.
pub fn router(service: FarmService) -> Router {
    let state = AppState { service };
    Router::new()
        .route("/farms", get(list_farms).post(create_farm))
        .route(
            "/farms/:farm_id",
            get(get_farm).put(update_farm).delete(delete_farm),
        )
        .route(
            "/farms/:farm_id/flocks",
            get(list_farm_flocks).post(create_flock),
        )
        .route(
            "/flocks/:flock_id",
            get(get_flock).put(update_flock).delete(delete_flock),
        )
        .route("/flocks/:flock_id/family_tree", get(get_family_tree))
        .route(
            "/flocks/:flock_id/health",
            get(list_health_records).post(create_health_record),
        )
        .route(
            "/flocks/:flock_id/health/alerts/mortality",
            get(get_mortality_alert),
        )
        .route(
            "/flocks/:flock_id/health/alerts/disease",
            get(get_disease_alert),
        )
        .route(
            "/flocks/:flock_id/health/mortality-trend",
            get(get_mortality_trend),
        )
        .route(
            "/health-records/:record_id",
            get(get_health_record)
                .put(update_health_record)
                .delete(delete_health_record),
        )
        .route(
            "/flocks/:flock_id/production",
            get(list_production_records).post(create_production_record),
        )
        .route(
            "/production-records/:record_id",
            get(get_production_record)
                .put(update_production_record)
                .delete(delete_production_record),
        )
        .route(
            "/flocks/:flock_id/feed",
            get(list_feed_records).post(create_feed_record),
        )
        .route(
            "/feed-records/:record_id",
            get(get_feed_record)
                .put(update_feed_record)
                .delete(delete_feed_record),
        )
        .route(
            "/flocks/:flock_id/growth",
            get(list_growth_records).post(create_growth_record),
        )
        .route(
            "/growth-records/:record_id",
            get(get_growth_record)
                .put(update_growth_record)
                .delete(delete_growth_record),
        )
        .route(
            "/flocks/:flock_id/environment",
            get(list_environment_records).post(create_environment_record),
        )
        .route(
            "/environment-records/:record_id",
            get(get_environment_record)
                .put(update_environment_record)
                .delete(delete_environment_record),
        )
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Farms ---

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[instrument(skip(state, new))]
async fn create_farm(
    State(state): State<AppState>,
    Json(new): Json<NewFarm>,
) -> Result<(StatusCode, Json<Farm>)> {
    let farm = state.service.farms.add(new)?;
    Ok((StatusCode::CREATED, Json(farm)))
}

async fn list_farms(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Farm>> {
    let farms = match query.q.as_deref() {
        Some(term) => state.service.farms.search(term),
        None => state.service.farms.list(),
    };
    Json(farms)
}

async fn get_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> Result<Json<Farm>> {
    Ok(Json(state.service.farms.get(&farm_id)?))
}

#[instrument(skip(state, update))]
async fn update_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    Json(update): Json<FarmUpdate>,
) -> Result<Json<Farm>> {
    Ok(Json(state.service.farms.update(&farm_id, update)?))
}

#[instrument(skip(state))]
async fn delete_farm(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
) -> Result<StatusCode> {
    state.service.delete_farm(&farm_id)?;
    info!(farm_id = %farm_id, "Farm deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Flocks ---

#[instrument(skip(state, new))]
async fn create_flock(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    Json(new): Json<NewFlock>,
) -> Result<(StatusCode, Json<Flock>)> {
    let flock = state.service.create_flock(&farm_id, new)?;
    Ok((StatusCode::CREATED, Json(flock)))
}

async fn list_farm_flocks(
    State(state): State<AppState>,
    Path(farm_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Flock>>> {
    state.service.require_farm(&farm_id)?;
    let flocks = match query.q.as_deref() {
        Some(term) => state.service.flocks.search(Some(&farm_id), term),
        None => state.service.flocks.flocks_for_farm(&farm_id),
    };
    Ok(Json(flocks))
}

/// Flock plus its derived age group, for read endpoints.
#[derive(Debug, Serialize)]
struct FlockView {
    #[serde(flatten)]
    flock: Flock,
    age_group: AgeGroup,
}

impl FlockView {
    fn now(flock: Flock) -> Self {
        let age_group = flock.age_group(Utc::now().date_naive());
        FlockView { flock, age_group }
    }
}

async fn get_flock(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
) -> Result<Json<FlockView>> {
    let flock = state.service.flocks.get(&flock_id)?;
    Ok(Json(FlockView::now(flock)))
}

#[instrument(skip(state, update))]
async fn update_flock(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(update): Json<FlockUpdate>,
) -> Result<Json<Flock>> {
    Ok(Json(state.service.flocks.update(&flock_id, update)?))
}

#[instrument(skip(state))]
async fn delete_flock(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
) -> Result<StatusCode> {
    state.service.delete_flock(&flock_id)?;
    info!(flock_id = %flock_id, "Flock deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct FamilyTreeQuery {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    3
}

async fn get_family_tree(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(query): Query<FamilyTreeQuery>,
) -> Result<Json<FamilyTreeNode>> {
    let tree = state.service.flocks.family_tree(&flock_id, query.max_depth)?;
    Ok(Json(tree))
}

// --- Health records ---

#[derive(Debug, Deserialize)]
pub struct HealthListQuery {
    pub record_type: Option<RecordType>,
}

#[instrument(skip(state, new))]
async fn create_health_record(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(new): Json<NewHealthRecord>,
) -> Result<(StatusCode, Json<HealthRecord>)> {
    let record = state.service.add_health_record(&flock_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_health_records(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(query): Query<HealthListQuery>,
) -> Result<Json<Vec<HealthRecord>>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(
        state
            .service
            .tracking
            .health_records_for_flock(&flock_id, query.record_type),
    ))
}

async fn get_health_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<HealthRecord>> {
    Ok(Json(state.service.tracking.get_health_record(&record_id)?))
}

#[instrument(skip(state, update))]
async fn update_health_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(update): Json<HealthRecordUpdate>,
) -> Result<Json<HealthRecord>> {
    Ok(Json(state.service.update_health_record(&record_id, update)?))
}

#[instrument(skip(state))]
async fn delete_health_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode> {
    state.service.delete_health_record(&record_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Alerts ---

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub alert: bool,
    pub message: String,
}

impl AlertResponse {
    fn from_check(result: Option<String>, quiet: &str) -> Self {
        match result {
            Some(message) => AlertResponse {
                alert: true,
                message,
            },
            None => AlertResponse {
                alert: false,
                message: quiet.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MortalityAlertQuery {
    #[serde(default = "default_mortality_period")]
    pub period_days: i64,
    #[serde(default = "default_mortality_threshold")]
    pub threshold_deaths: u32,
}

fn default_mortality_period() -> i64 {
    DEFAULT_MORTALITY_PERIOD_DAYS
}

fn default_mortality_threshold() -> u32 {
    DEFAULT_MORTALITY_THRESHOLD_DEATHS
}

#[instrument(skip(state))]
async fn get_mortality_alert(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(query): Query<MortalityAlertQuery>,
) -> Result<Json<AlertResponse>> {
    let result = state.service.mortality_alert(
        &flock_id,
        query.period_days,
        query.threshold_deaths,
        Utc::now(),
    )?;
    Ok(Json(AlertResponse::from_check(
        result,
        "No high mortality events detected.",
    )))
}

#[derive(Debug, Deserialize)]
pub struct DiseaseAlertQuery {
    pub disease_name: Option<String>,
    #[serde(default = "default_disease_period")]
    pub period_days: i64,
    #[serde(default = "default_disease_min_incidents")]
    pub min_incidents: u32,
}

fn default_disease_period() -> i64 {
    DEFAULT_DISEASE_PERIOD_DAYS
}

fn default_disease_min_incidents() -> u32 {
    DEFAULT_DISEASE_MIN_INCIDENTS
}

#[instrument(skip(state))]
async fn get_disease_alert(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(query): Query<DiseaseAlertQuery>,
) -> Result<Json<AlertResponse>> {
    let disease_name = query
        .disease_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::validation("disease_name query parameter is required."))?;

    let result = state.service.disease_alert(
        &flock_id,
        query.period_days,
        disease_name,
        query.min_incidents,
        Utc::now(),
    )?;
    Ok(Json(AlertResponse::from_check(
        result,
        "No disease outbreak detected.",
    )))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    #[serde(default = "default_mortality_period")]
    pub days: i64,
}

async fn get_mortality_trend(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<MortalityTrend>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(state.service.tracking.recent_mortality_trend(
        &flock_id,
        query.days,
        Utc::now(),
    )))
}

// --- Production records ---

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[instrument(skip(state, new))]
async fn create_production_record(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(new): Json<NewProductionRecord>,
) -> Result<(StatusCode, Json<ProductionRecord>)> {
    state.service.require_flock(&flock_id)?;
    let record = state.service.tracking.add_production_record(&flock_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_production_records(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<ProductionRecord>>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(state.service.tracking.production_records_for_flock(
        &flock_id,
        range.start_date,
        range.end_date,
    )))
}

async fn get_production_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<ProductionRecord>> {
    Ok(Json(state.service.tracking.get_production_record(&record_id)?))
}

#[instrument(skip(state, update))]
async fn update_production_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(update): Json<ProductionRecordUpdate>,
) -> Result<Json<ProductionRecord>> {
    Ok(Json(
        state
            .service
            .tracking
            .update_production_record(&record_id, update)?,
    ))
}

#[instrument(skip(state))]
async fn delete_production_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode> {
    if !state.service.tracking.delete_production_record(&record_id)? {
        return Err(Error::not_found("Production record", record_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Feed records ---

#[instrument(skip(state, new))]
async fn create_feed_record(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(new): Json<NewFeedRecord>,
) -> Result<(StatusCode, Json<FeedConsumptionRecord>)> {
    state.service.require_flock(&flock_id)?;
    let record = state.service.tracking.add_feed_record(&flock_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_feed_records(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<FeedConsumptionRecord>>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(state.service.tracking.feed_records_for_flock(
        &flock_id,
        range.start_date,
        range.end_date,
    )))
}

async fn get_feed_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<FeedConsumptionRecord>> {
    Ok(Json(state.service.tracking.get_feed_record(&record_id)?))
}

#[instrument(skip(state, update))]
async fn update_feed_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(update): Json<FeedRecordUpdate>,
) -> Result<Json<FeedConsumptionRecord>> {
    Ok(Json(
        state.service.tracking.update_feed_record(&record_id, update)?,
    ))
}

#[instrument(skip(state))]
async fn delete_feed_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode> {
    if !state.service.tracking.delete_feed_record(&record_id)? {
        return Err(Error::not_found("Feed record", record_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Growth records ---

#[instrument(skip(state, new))]
async fn create_growth_record(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(new): Json<NewGrowthRecord>,
) -> Result<(StatusCode, Json<GrowthRecord>)> {
    state.service.require_flock(&flock_id)?;
    let record = state.service.tracking.add_growth_record(&flock_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_growth_records(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<GrowthRecord>>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(state.service.tracking.growth_records_for_flock(
        &flock_id,
        range.start_date,
        range.end_date,
    )))
}

async fn get_growth_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<GrowthRecord>> {
    Ok(Json(state.service.tracking.get_growth_record(&record_id)?))
}

#[instrument(skip(state, update))]
async fn update_growth_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(update): Json<GrowthRecordUpdate>,
) -> Result<Json<GrowthRecord>> {
    Ok(Json(
        state
            .service
            .tracking
            .update_growth_record(&record_id, update)?,
    ))
}

#[instrument(skip(state))]
async fn delete_growth_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode> {
    if !state.service.tracking.delete_growth_record(&record_id)? {
        return Err(Error::not_found("Growth record", record_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Environment records ---

#[instrument(skip(state, new))]
async fn create_environment_record(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Json(new): Json<NewEnvironmentRecord>,
) -> Result<(StatusCode, Json<EnvironmentRecord>)> {
    state.service.require_flock(&flock_id)?;
    let record = state
        .service
        .tracking
        .add_environment_record(&flock_id, new)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_environment_records(
    State(state): State<AppState>,
    Path(flock_id): Path<String>,
    Query(range): Query<DateRangeQuery>,
) -> Result<Json<Vec<EnvironmentRecord>>> {
    state.service.require_flock(&flock_id)?;
    Ok(Json(state.service.tracking.environment_records_for_flock(
        &flock_id,
        range.start_date,
        range.end_date,
    )))
}

async fn get_environment_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<EnvironmentRecord>> {
    Ok(Json(
        state.service.tracking.get_environment_record(&record_id)?,
    ))
}

#[instrument(skip(state, update))]
async fn update_environment_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(update): Json<EnvironmentRecordUpdate>,
) -> Result<Json<EnvironmentRecord>> {
    Ok(Json(
        state
            .service
            .tracking
            .update_environment_record(&record_id, update)?,
    ))
}

#[instrument(skip(state))]
async fn delete_environment_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<StatusCode> {
    if !state.service.tracking.delete_environment_record(&record_id)? {
        return Err(Error::not_found("Environment record", record_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health - liveness probe.
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
