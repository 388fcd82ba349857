use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use diesel::dsl::exists;
use diesel::{prelude::*, select, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::jobs::{schedule_at, JOB_SLA_SWEEP};
use crate::models::{
    Attachment, Comment, DocumentPage, EfilingFile, FileMovement, NewDocumentPage, NewEfilingFile,
    NewFileMovement, Signature, User,
};
use crate::schema::{
    attachments, comments, departments, document_pages, file_movements, files, signatures, users,
};
use crate::state::AppState;
use crate::timeline::{assemble_timeline, TimelineEvent};
use crate::workflow::{
    resolve_permissions, role_rank, PermissionSet, ResolveInput, WorkflowState,
};
use crate::workers::sla::{SLA_ACTIVE, SLA_COMPLETED};

use super::to_iso;

pub const PAGE_TYPE_MAIN: &str = "MAIN";
pub const PRIORITY_NORMAL: &str = "normal";
pub const FILE_STATUS_OPEN: &str = "open";

#[derive(Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub file_number: String,
    pub subject: String,
    pub department_id: i32,
    pub category_id: Option<i32>,
    pub priority: String,
    pub status: String,
    pub workflow_state: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub work_request_id: Option<Uuid>,
    pub sla_deadline: Option<String>,
    pub sla_status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<EfilingFile> for FileResponse {
    fn from(file: EfilingFile) -> Self {
        Self {
            id: file.id,
            file_number: file.file_number,
            subject: file.subject,
            department_id: file.department_id,
            category_id: file.category_id,
            priority: file.priority,
            status: file.status,
            workflow_state: file.workflow_state,
            created_by: file.created_by,
            assigned_to: file.assigned_to,
            work_request_id: file.work_request_id,
            sla_deadline: file.sla_deadline.map(to_iso),
            sla_status: file.sla_status,
            created_at: to_iso(file.created_at),
            updated_at: to_iso(file.updated_at),
        }
    }
}

pub(super) fn load_file(conn: &mut PgConnection, file_id: Uuid) -> AppResult<EfilingFile> {
    Ok(files::table.find(file_id).first(conn)?)
}

/// Gathers everything the pure resolver needs for one (file, user) pair.
/// All reads, no writes; callers treat a failure as a denial.
pub(super) fn resolve_for(
    conn: &mut PgConnection,
    file: &EfilingFile,
    user: &AuthenticatedUser,
) -> AppResult<PermissionSet> {
    let state = WorkflowState::parse(&file.workflow_state)
        .ok_or_else(|| AppError::internal(format!("bad workflow state {}", file.workflow_state)))?;

    let requester: User = users::table.find(user.user_id).first(conn)?;
    let creator: User = users::table.find(file.created_by).first(conn)?;

    let holder_department = match file.assigned_to {
        Some(holder_id) if holder_id != file.created_by => {
            let holder: User = users::table.find(holder_id).first(conn)?;
            holder.department_id
        }
        _ => creator.department_id,
    };

    let returned_by_rank = if state == WorkflowState::ReturnedToCreator {
        let last_return: Option<FileMovement> = file_movements::table
            .filter(file_movements::file_id.eq(file.id))
            .filter(file_movements::returned.eq(true))
            .order(file_movements::created_at.desc())
            .first(conn)
            .optional()?;
        match last_return {
            Some(movement) => {
                let issuer: User = users::table.find(movement.from_user).first(conn)?;
                Some(role_rank(&issuer.role))
            }
            None => None,
        }
    } else {
        None
    };

    let has_active_signature: bool = select(exists(
        signatures::table
            .filter(signatures::file_id.eq(file.id))
            .filter(signatures::user_id.eq(user.user_id))
            .filter(signatures::is_active.eq(true)),
    ))
    .get_result(conn)?;

    Ok(resolve_permissions(&ResolveInput {
        file_created_by: file.created_by,
        file_assigned_to: file.assigned_to,
        state,
        requester_id: user.user_id,
        requester_role: requester.role,
        requester_department: requester.department_id,
        holder_department,
        returned_by_rank,
        creator_rank: role_rank(&creator.role),
        has_active_signature,
    }))
}

#[derive(Deserialize)]
pub struct FileListQuery {
    pub department_id: Option<i32>,
    pub status: Option<String>,
    #[serde(default)]
    pub assigned_to_me: bool,
    #[serde(default)]
    pub created_by_me: bool,
}

pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<FileResponse>>> {
    let mut conn = state.db()?;
    let mut list_query = files::table.order(files::updated_at.desc()).into_boxed();

    if let Some(department_id) = query.department_id {
        list_query = list_query.filter(files::department_id.eq(department_id));
    }
    if let Some(status) = query.status {
        list_query = list_query.filter(files::status.eq(status));
    }
    if query.assigned_to_me {
        list_query = list_query.filter(files::assigned_to.eq(user.user_id));
    }
    if query.created_by_me {
        list_query = list_query.filter(files::created_by.eq(user.user_id));
    }

    let rows: Vec<EfilingFile> = list_query.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(FileResponse::from).collect()))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<FileResponse>> {
    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;
    Ok(Json(FileResponse::from(file)))
}

#[derive(Deserialize)]
pub struct CreateFileRequest {
    pub subject: String,
    pub department_id: i32,
    pub category_id: Option<i32>,
    pub priority: Option<String>,
    pub work_request_id: Option<Uuid>,
    pub sla_hours: Option<i64>,
}

pub async fn create_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateFileRequest>,
) -> AppResult<(StatusCode, Json<FileResponse>)> {
    let subject = payload.subject.trim();
    if subject.is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }

    let mut conn = state.db()?;

    let department_exists: bool = select(exists(
        departments::table.filter(departments::id.eq(payload.department_id)),
    ))
    .get_result(&mut conn)?;
    if !department_exists {
        return Err(AppError::bad_request("unknown department"));
    }

    let now = Utc::now();
    let sla_deadline = payload
        .sla_hours
        .filter(|hours| *hours > 0)
        .map(|hours| (now + ChronoDuration::hours(hours)).naive_utc());

    let new_file = NewEfilingFile {
        id: Uuid::new_v4(),
        file_number: generate_file_number(now.year()),
        subject: subject.to_string(),
        department_id: payload.department_id,
        category_id: payload.category_id,
        priority: payload
            .priority
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| PRIORITY_NORMAL.to_string()),
        status: FILE_STATUS_OPEN.to_string(),
        workflow_state: WorkflowState::Draft.as_str().to_string(),
        created_by: user.user_id,
        assigned_to: Some(user.user_id),
        work_request_id: payload.work_request_id,
        sla_deadline,
        sla_status: SLA_ACTIVE.to_string(),
    };

    let file_id = new_file.id;
    conn.transaction::<_, AppError, _>(|conn| {
        diesel::insert_into(files::table)
            .values(&new_file)
            .execute(conn)?;

        // Every file starts with a main page, keeping the at-least-one-page
        // invariant from the moment of creation.
        let first_page = NewDocumentPage {
            id: Uuid::new_v4(),
            file_id,
            page_number: 1,
            title: "Noting".to_string(),
            content: json!({
                "title": "",
                "subject": new_file.subject,
                "date": now.format("%Y-%m-%d").to_string(),
                "matter": "",
                "footer": "",
            }),
            page_type: PAGE_TYPE_MAIN.to_string(),
        };
        diesel::insert_into(document_pages::table)
            .values(&first_page)
            .execute(conn)?;

        if let Some(deadline) = new_file.sla_deadline {
            schedule_at(conn, JOB_SLA_SWEEP, json!({ "file_id": file_id }), deadline)
                .map_err(|err| AppError::internal(format!("failed to schedule sla sweep: {err}")))?;
        }

        Ok(())
    })?;

    let file: EfilingFile = files::table.find(file_id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(FileResponse::from(file))))
}

/// Permission lookups fail closed: any resolution error degrades to the
/// most restrictive set instead of surfacing a server error the client
/// might misread as "allowed".
pub async fn get_permissions(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<PermissionSet>> {
    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = match resolve_for(&mut conn, &file, &user) {
        Ok(permissions) => permissions,
        Err(err) => {
            warn!(file_id = %file_id, user_id = %user.user_id, error = ?err,
                "permission resolution failed, returning denied set");
            let state = WorkflowState::parse(&file.workflow_state).unwrap_or(WorkflowState::Draft);
            PermissionSet::denied(state)
        }
    };

    Ok(Json(permissions))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<Vec<TimelineEvent>>> {
    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let pages: Vec<DocumentPage> = document_pages::table
        .filter(document_pages::file_id.eq(file_id))
        .order(document_pages::page_number.asc())
        .load(&mut conn)?;
    let sigs: Vec<Signature> = signatures::table
        .filter(signatures::file_id.eq(file_id))
        .order(signatures::created_at.asc())
        .load(&mut conn)?;
    let notes: Vec<Comment> = comments::table
        .filter(comments::file_id.eq(file_id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;
    let uploads: Vec<Attachment> = attachments::table
        .filter(attachments::file_id.eq(file_id))
        .order(attachments::uploaded_at.asc())
        .load(&mut conn)?;
    let movements: Vec<FileMovement> = file_movements::table
        .filter(file_movements::file_id.eq(file_id))
        .order(file_movements::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(assemble_timeline(
        &file, &pages, &sigs, &notes, &uploads, &movements,
    )))
}

#[derive(Deserialize)]
pub struct MarkToRequest {
    pub recipient_ids: Vec<Uuid>,
    pub remarks: Option<String>,
}

#[derive(Serialize)]
pub struct MarkToResponse {
    pub file: FileResponse,
    pub movements: usize,
}

pub async fn mark_to(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<MarkToRequest>,
) -> AppResult<Json<MarkToResponse>> {
    if payload.recipient_ids.is_empty() {
        return Err(AppError::bad_request("recipient_ids must not be empty"));
    }

    let remarks = payload
        .remarks
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let mut conn = state.db()?;

    let moved = conn.transaction::<usize, AppError, _>(|conn| {
        let file = load_file(conn, file_id)?;

        // Only the current holder routes a file onward.
        if file.assigned_to != Some(user.user_id) {
            return Err(AppError::forbidden(
                "only the current holder may mark this file forward",
            ));
        }

        let mut recipients = Vec::with_capacity(payload.recipient_ids.len());
        for recipient_id in &payload.recipient_ids {
            if *recipient_id == user.user_id {
                return Err(AppError::bad_request("cannot mark a file to yourself"));
            }
            let recipient: User = users::table
                .find(recipient_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| AppError::bad_request("unknown recipient"))?;
            recipients.push(recipient);
        }

        let sender: User = users::table.find(user.user_id).first(conn)?;

        // Forwarding to the creator alone is a return; forwarding across
        // departments sends the file EXTERNAL.
        let is_return =
            recipients.len() == 1 && recipients[0].id == file.created_by;
        let next_state = if is_return {
            WorkflowState::ReturnedToCreator
        } else if recipients
            .iter()
            .any(|r| r.department_id != sender.department_id)
        {
            WorkflowState::External
        } else {
            WorkflowState::InReview
        };

        for recipient in &recipients {
            let movement = NewFileMovement {
                id: Uuid::new_v4(),
                file_id,
                from_user: user.user_id,
                to_user: recipient.id,
                remarks: remarks.clone(),
                returned: is_return,
            };
            diesel::insert_into(file_movements::table)
                .values(&movement)
                .execute(conn)?;
        }

        diesel::update(files::table.find(file_id))
            .set((
                files::assigned_to.eq(Some(recipients[0].id)),
                files::workflow_state.eq(next_state.as_str()),
                files::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        Ok(recipients.len())
    })?;

    let file: EfilingFile = files::table.find(file_id).first(&mut conn)?;
    Ok(Json(MarkToResponse {
        file: FileResponse::from(file),
        movements: moved,
    }))
}

pub async fn close_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<FileResponse>> {
    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    if file.assigned_to != Some(user.user_id) && file.created_by != user.user_id {
        return Err(AppError::forbidden("only the holder or creator may archive"));
    }

    diesel::update(files::table.find(file_id))
        .set((
            files::status.eq("closed"),
            files::workflow_state.eq(WorkflowState::Archived.as_str()),
            files::sla_status.eq(SLA_COMPLETED),
            files::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let file: EfilingFile = files::table.find(file_id).first(&mut conn)?;
    Ok(Json(FileResponse::from(file)))
}

fn generate_file_number(year: i32) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("EF-{year}-{}", suffix[..8].to_uppercase())
}
