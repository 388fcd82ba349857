use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{DocTemplate, NewDocTemplate};
use crate::schema::doc_templates;
use crate::state::AppState;
use crate::utils::html::{html_to_paragraph_text, text_to_html_paragraphs};

use super::to_iso;

#[derive(Serialize)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub subject: String,
    pub main_content: String,
    pub usage_count: i32,
    pub created_by: Uuid,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocTemplate> for TemplateResponse {
    fn from(row: DocTemplate) -> Self {
        Self {
            id: row.id,
            name: row.name,
            title: row.title,
            subject: row.subject,
            main_content: row.main_content,
            usage_count: row.usage_count,
            created_by: row.created_by,
            created_at: to_iso(row.created_at),
            updated_at: to_iso(row.updated_at),
        }
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TemplateResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<DocTemplate> = doc_templates::table
        .order(doc_templates::usage_count.desc())
        .then_order_by(doc_templates::name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(TemplateResponse::from).collect()))
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> AppResult<Json<TemplateResponse>> {
    let mut conn = state.db()?;
    let row: DocTemplate = doc_templates::table.find(template_id).first(&mut conn)?;
    Ok(Json(TemplateResponse::from(row)))
}

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub main_content: String,
}

pub async fn create_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("template name must not be empty"));
    }
    if payload.main_content.trim().is_empty() {
        return Err(AppError::bad_request("template content must not be empty"));
    }

    let mut conn = state.db()?;
    let new_template = NewDocTemplate {
        id: Uuid::new_v4(),
        name: name.to_string(),
        title: payload.title.unwrap_or_default().trim().to_string(),
        subject: payload.subject.unwrap_or_default().trim().to_string(),
        main_content: payload.main_content,
        created_by: user.user_id,
    };
    diesel::insert_into(doc_templates::table)
        .values(&new_template)
        .execute(&mut conn)?;

    let row: DocTemplate = doc_templates::table.find(new_template.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(TemplateResponse::from(row))))
}

#[derive(Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub main_content: Option<String>,
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> AppResult<Json<TemplateResponse>> {
    let mut conn = state.db()?;
    let existing: DocTemplate = doc_templates::table.find(template_id).first(&mut conn)?;

    let name = match payload.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::bad_request("template name must not be empty"))
        }
        Some(name) => name.trim().to_string(),
        None => existing.name,
    };
    let main_content = match payload.main_content {
        Some(content) if content.trim().is_empty() => {
            return Err(AppError::bad_request("template content must not be empty"))
        }
        Some(content) => content,
        None => existing.main_content,
    };

    diesel::update(doc_templates::table.find(template_id))
        .set((
            doc_templates::name.eq(name),
            doc_templates::title.eq(payload.title.unwrap_or(existing.title)),
            doc_templates::subject.eq(payload.subject.unwrap_or(existing.subject)),
            doc_templates::main_content.eq(main_content),
            doc_templates::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let row: DocTemplate = doc_templates::table.find(template_id).first(&mut conn)?;
    Ok(Json(TemplateResponse::from(row)))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let deleted = diesel::delete(doc_templates::table.find(template_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("template not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct UseTemplateResponse {
    pub template_id: Uuid,
    pub usage_count: i32,
    /// Ready-to-insert page content; the matter is paragraph HTML, the plain
    /// text variant is kept alongside for clients that re-flow it.
    pub page_content: serde_json::Value,
}

pub async fn use_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> AppResult<Json<UseTemplateResponse>> {
    let mut conn = state.db()?;

    let row = conn.transaction::<DocTemplate, AppError, _>(|conn| {
        let existing: DocTemplate = doc_templates::table.find(template_id).first(conn)?;
        diesel::update(doc_templates::table.find(template_id))
            .set(doc_templates::usage_count.eq(existing.usage_count + 1))
            .execute(conn)?;
        doc_templates::table.find(template_id).first(conn).map_err(AppError::from)
    })?;

    // Stored matter may be plain text or editor HTML; either way the blank
    // line structure has to survive into the generated paragraphs.
    let matter_text = html_to_paragraph_text(&row.main_content);
    let matter_html = text_to_html_paragraphs(&matter_text);
    let page_content = json!({
        "title": row.title,
        "subject": row.subject,
        "date": Utc::now().format("%Y-%m-%d").to_string(),
        "matter": matter_html,
        "matter_text": matter_text,
        "footer": "",
    });

    Ok(Json(UseTemplateResponse {
        template_id,
        usage_count: row.usage_count,
        page_content,
    }))
}
