use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{ComplaintType, Department, NewWorkRequest, WorkRequest};
use crate::schema::{complaint_types, departments, work_requests};
use crate::state::AppState;
use crate::utils::json::{coerce_int_array, coerce_int_or_null, coerce_uuid_array, coerce_uuid_or_null};

use super::to_iso;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_REJECTED: &str = "rejected";

const KNOWN_STATUSES: &[&str] = &[
    STATUS_PENDING,
    STATUS_IN_PROGRESS,
    STATUS_COMPLETED,
    STATUS_REJECTED,
];

#[derive(Serialize)]
pub struct WorkRequestResponse {
    pub id: Uuid,
    pub request_number: String,
    pub description: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub department_id: i32,
    pub complaint_type_id: Option<i32>,
    pub complaint_subtype_id: Option<i32>,
    pub town_id: Option<i32>,
    pub subtown_id: Option<i32>,
    pub division_id: Option<i32>,
    pub subtown_ids: Value,
    pub assigned_sm_agents: Value,
    pub executive_engineer_id: Option<Uuid>,
    pub contractor_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WorkRequest> for WorkRequestResponse {
    fn from(row: WorkRequest) -> Self {
        Self {
            id: row.id,
            request_number: row.request_number,
            description: row.description,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            department_id: row.department_id,
            complaint_type_id: row.complaint_type_id,
            complaint_subtype_id: row.complaint_subtype_id,
            town_id: row.town_id,
            subtown_id: row.subtown_id,
            division_id: row.division_id,
            subtown_ids: row.subtown_ids,
            assigned_sm_agents: row.assigned_sm_agents,
            executive_engineer_id: row.executive_engineer_id,
            contractor_id: row.contractor_id,
            status: row.status,
            created_by: row.created_by,
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct RequestListQuery {
    pub department_id: Option<i32>,
    pub status: Option<String>,
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<Vec<WorkRequestResponse>>> {
    let mut conn = state.db()?;
    let mut list_query = work_requests::table
        .order(work_requests::created_at.desc())
        .into_boxed();
    if let Some(department_id) = query.department_id {
        list_query = list_query.filter(work_requests::department_id.eq(department_id));
    }
    if let Some(status) = query.status {
        list_query = list_query.filter(work_requests::status.eq(status));
    }
    let rows: Vec<WorkRequest> = list_query.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(WorkRequestResponse::from).collect()))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<WorkRequestResponse>> {
    let mut conn = state.db()?;
    let row: WorkRequest = work_requests::table.find(request_id).first(&mut conn)?;
    Ok(Json(WorkRequestResponse::from(row)))
}

/// Intake accepts the form payload as loose JSON: selects submit numbers,
/// numeric strings or empty strings interchangeably, and multi-selects carry
/// null holes. Everything is normalized before validation so the
/// division-based / town-based rules run on clean values.
pub async fn create_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<WorkRequestResponse>)> {
    let description = body
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("description is required"))?
        .to_string();

    let department_id = coerce_int_or_null("department_id", body.get("department_id"))
        .map_err(AppError::bad_request)?
        .ok_or_else(|| AppError::bad_request("department_id is required"))?;

    let complaint_type_id = coerce_int_or_null("complaint_type_id", body.get("complaint_type_id"))
        .map_err(AppError::bad_request)?;
    let complaint_subtype_id =
        coerce_int_or_null("complaint_subtype_id", body.get("complaint_subtype_id"))
            .map_err(AppError::bad_request)?;
    let town_id =
        coerce_int_or_null("town_id", body.get("town_id")).map_err(AppError::bad_request)?;
    let subtown_id =
        coerce_int_or_null("subtown_id", body.get("subtown_id")).map_err(AppError::bad_request)?;
    let division_id = coerce_int_or_null("division_id", body.get("division_id"))
        .map_err(AppError::bad_request)?;
    let subtown_ids =
        coerce_int_array("subtown_ids", body.get("subtown_ids")).map_err(AppError::bad_request)?;
    let assigned_sm_agents = coerce_uuid_array("assigned_sm_agents", body.get("assigned_sm_agents"))
        .map_err(AppError::bad_request)?;
    let executive_engineer_id =
        coerce_uuid_or_null("executive_engineer_id", body.get("executive_engineer_id"))
            .map_err(AppError::bad_request)?;
    let contractor_id = coerce_uuid_or_null("contractor_id", body.get("contractor_id"))
        .map_err(AppError::bad_request)?;

    let address = body
        .get("address")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let latitude = body.get("latitude").and_then(Value::as_f64);
    let longitude = body.get("longitude").and_then(Value::as_f64);

    let mut conn = state.db()?;

    let department: Department = departments::table
        .find(department_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("unknown department"))?;

    let complaint_type: Option<ComplaintType> = match complaint_type_id {
        Some(id) => complaint_types::table.find(id).first(&mut conn).optional()?,
        None => None,
    };

    // A department with a division attached is division-based: division
    // selection replaces the town/subtown fields entirely.
    let division_based = department.division_id.is_some();

    let (town_id, subtown_id, subtown_ids, division_id) = if division_based {
        let division_id = division_id
            .or_else(|| complaint_type.as_ref().and_then(|ct| ct.default_division_id))
            .or(department.division_id);
        let division_id = division_id
            .ok_or_else(|| AppError::bad_request("division_id is required for this department"))?;
        (None, None, Vec::new(), Some(division_id))
    } else {
        let town_id = town_id
            .ok_or_else(|| AppError::bad_request("town_id is required for this department"))?;
        (Some(town_id), subtown_id, subtown_ids, None)
    };

    let now = Utc::now();
    let new_request = NewWorkRequest {
        id: Uuid::new_v4(),
        request_number: generate_request_number(now.year()),
        description,
        address,
        latitude,
        longitude,
        department_id,
        complaint_type_id,
        complaint_subtype_id,
        town_id,
        subtown_id,
        division_id,
        subtown_ids: json!(subtown_ids),
        assigned_sm_agents: json!(assigned_sm_agents),
        executive_engineer_id,
        contractor_id,
        status: STATUS_PENDING.to_string(),
        created_by: user.user_id,
    };

    diesel::insert_into(work_requests::table)
        .values(&new_request)
        .execute(&mut conn)?;

    let row: WorkRequest = work_requests::table.find(new_request.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(WorkRequestResponse::from(row))))
}

#[derive(Deserialize)]
pub struct UpdateRequestBody {
    pub status: Option<String>,
    pub description: Option<String>,
}

pub async fn update_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<UpdateRequestBody>,
) -> AppResult<Json<WorkRequestResponse>> {
    let mut conn = state.db()?;
    let existing: WorkRequest = work_requests::table.find(request_id).first(&mut conn)?;

    let mut status = existing.status.clone();
    if let Some(requested) = payload.status {
        let normalized = requested.trim().to_lowercase();
        if !KNOWN_STATUSES.contains(&normalized.as_str()) {
            return Err(AppError::bad_request(format!(
                "unknown status '{normalized}'. Allowed: {}",
                KNOWN_STATUSES.join(", ")
            )));
        }
        status = normalized;
    }

    let mut description = existing.description.clone();
    if let Some(requested) = payload.description {
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("description must not be empty"));
        }
        description = trimmed.to_string();
    }

    diesel::update(work_requests::table.find(request_id))
        .set((
            work_requests::status.eq(&status),
            work_requests::description.eq(&description),
            work_requests::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let row: WorkRequest = work_requests::table.find(request_id).first(&mut conn)?;
    Ok(Json(WorkRequestResponse::from(row)))
}

fn generate_request_number(year: i32) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("WR-{year}-{}", suffix[..8].to_uppercase())
}
