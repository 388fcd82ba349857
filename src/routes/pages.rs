use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{DocumentPage, NewDocumentPage, Signature};
use crate::schema::{document_pages, files, signatures};
use crate::state::AppState;

use super::files::{load_file, resolve_for, FileResponse, PAGE_TYPE_MAIN};
use super::to_iso;

pub const PAGE_TYPE_ATTACHMENT: &str = "ATTACHMENT";

#[derive(Serialize)]
pub struct PageResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub page_number: i32,
    pub title: String,
    pub content: Value,
    pub page_type: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocumentPage> for PageResponse {
    fn from(page: DocumentPage) -> Self {
        Self {
            id: page.id,
            file_id: page.file_id,
            page_number: page.page_number,
            title: page.title,
            content: page.content,
            page_type: page.page_type,
            created_at: to_iso(page.created_at),
            updated_at: to_iso(page.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct SignatureSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_role: String,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl From<Signature> for SignatureSummary {
    fn from(sig: Signature) -> Self {
        Self {
            id: sig.id,
            user_id: sig.user_id,
            user_role: sig.user_role,
            sig_type: sig.sig_type,
            content: sig.content,
            font: sig.font,
            color: sig.color,
            is_active: sig.is_active,
            created_at: to_iso(sig.created_at),
        }
    }
}

/// Everything a client needs to render the file in one round trip: the
/// file header, ordered pages and the signatures to stamp onto them.
#[derive(Serialize)]
pub struct DocumentResponse {
    pub file: FileResponse,
    pub pages: Vec<PageResponse>,
    pub signatures: Vec<SignatureSummary>,
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<DocumentResponse>> {
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

    Ok(Json(DocumentResponse {
        file: FileResponse::from(file),
        pages: pages.into_iter().map(PageResponse::from).collect(),
        signatures: sigs.into_iter().map(SignatureSummary::from).collect(),
    }))
}

pub async fn list_pages(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<Vec<PageResponse>>> {
    let mut conn = state.db()?;
    load_file(&mut conn, file_id)?;

    let pages: Vec<DocumentPage> = document_pages::table
        .filter(document_pages::file_id.eq(file_id))
        .order(document_pages::page_number.asc())
        .load(&mut conn)?;
    Ok(Json(pages.into_iter().map(PageResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct AppendPageRequest {
    pub title: Option<String>,
    pub content: Value,
    pub page_type: Option<String>,
}

pub async fn append_page(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AppendPageRequest>,
) -> AppResult<(StatusCode, Json<PageResponse>)> {
    if !payload.content.is_object() {
        return Err(AppError::bad_request("content must be a JSON object"));
    }

    let page_type = match payload.page_type.as_deref() {
        None => PAGE_TYPE_MAIN,
        Some(PAGE_TYPE_MAIN) => PAGE_TYPE_MAIN,
        Some(PAGE_TYPE_ATTACHMENT) => PAGE_TYPE_ATTACHMENT,
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "unknown page type '{other}'"
            )))
        }
    };

    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_add_page {
        return Err(AppError::forbidden("not allowed to add pages to this file"));
    }

    let page_id = Uuid::new_v4();
    conn.transaction::<_, AppError, _>(|conn| {
        let next_number: i32 = document_pages::table
            .filter(document_pages::file_id.eq(file_id))
            .select(diesel::dsl::max(document_pages::page_number))
            .first::<Option<i32>>(conn)?
            .unwrap_or(0)
            + 1;

        let new_page = NewDocumentPage {
            id: page_id,
            file_id,
            page_number: next_number,
            title: payload
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("Noting")
                .to_string(),
            content: payload.content.clone(),
            page_type: page_type.to_string(),
        };
        diesel::insert_into(document_pages::table)
            .values(&new_page)
            .execute(conn)?;

        diesel::update(files::table.find(file_id))
            .set(files::updated_at.eq(Utc::now().naive_utc()))
            .execute(conn)?;

        Ok(())
    })?;

    let page: DocumentPage = document_pages::table.find(page_id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(PageResponse::from(page))))
}

#[derive(Deserialize)]
pub struct ReplacePageRequest {
    pub title: Option<String>,
    pub content: Value,
}

pub async fn replace_page(
    State(state): State<AppState>,
    Path((file_id, page_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<ReplacePageRequest>,
) -> AppResult<Json<PageResponse>> {
    if !payload.content.is_object() {
        return Err(AppError::bad_request("content must be a JSON object"));
    }

    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_edit {
        return Err(AppError::forbidden("not allowed to edit this file"));
    }

    let page: DocumentPage = document_pages::table
        .find(page_id)
        .first(&mut conn)
        .optional()?
        .filter(|p: &DocumentPage| p.file_id == file_id)
        .ok_or_else(|| AppError::not_found("page not found"))?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or(page.title);

    let now = Utc::now().naive_utc();
    conn.transaction::<_, AppError, _>(|conn| {
        diesel::update(document_pages::table.find(page_id))
            .set((
                document_pages::title.eq(&title),
                document_pages::content.eq(&payload.content),
                document_pages::updated_at.eq(now),
            ))
            .execute(conn)?;
        diesel::update(files::table.find(file_id))
            .set(files::updated_at.eq(now))
            .execute(conn)?;
        Ok(())
    })?;

    let page: DocumentPage = document_pages::table.find(page_id).first(&mut conn)?;
    Ok(Json(PageResponse::from(page)))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Path((file_id, page_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_edit {
        return Err(AppError::forbidden("not allowed to edit this file"));
    }

    conn.transaction::<_, AppError, _>(|conn| {
        let pages: Vec<DocumentPage> = document_pages::table
            .filter(document_pages::file_id.eq(file_id))
            .order(document_pages::page_number.asc())
            .load(conn)?;

        if !pages.iter().any(|p| p.id == page_id) {
            return Err(AppError::not_found("page not found"));
        }
        // A file never goes below one page.
        if pages.len() == 1 {
            return Err(AppError::bad_request("cannot delete the last page"));
        }

        diesel::delete(document_pages::table.find(page_id)).execute(conn)?;

        // Renumber what remains so page numbers stay dense.
        let mut next = 1;
        for page in pages.iter().filter(|p| p.id != page_id) {
            if page.page_number != next {
                diesel::update(document_pages::table.find(page.id))
                    .set(document_pages::page_number.eq(next))
                    .execute(conn)?;
            }
            next += 1;
        }

        diesel::update(files::table.find(file_id))
            .set(files::updated_at.eq(Utc::now().naive_utc()))
            .execute(conn)?;

        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
