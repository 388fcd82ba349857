use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Comment, NewComment};
use crate::schema::comments;
use crate::state::AppState;
use crate::workflow::COMMENT_MODERATOR_ROLES;

use super::files::{load_file, resolve_for};
use super::to_iso;

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_role: String,
    pub body: String,
    pub edited: bool,
    pub edited_at: Option<String>,
    pub created_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(row: Comment) -> Self {
        Self {
            id: row.id,
            file_id: row.file_id,
            user_id: row.user_id,
            user_name: row.user_name,
            user_role: row.user_role,
            body: row.body,
            edited: row.edited,
            edited_at: row.edited_at.map(to_iso),
            created_at: to_iso(row.created_at),
        }
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    let mut conn = state.db()?;
    load_file(&mut conn, file_id)?;

    let rows: Vec<Comment> = comments::table
        .filter(comments::file_id.eq(file_id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CommentResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<AddCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body must not be empty"));
    }

    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_comment {
        return Err(AppError::forbidden("not allowed to comment on this file"));
    }

    let new_comment = NewComment {
        id: Uuid::new_v4(),
        file_id,
        user_id: user.user_id,
        user_name: user.full_name.clone(),
        user_role: user.role.clone(),
        body: body.to_string(),
    };
    diesel::insert_into(comments::table)
        .values(&new_comment)
        .execute(&mut conn)?;

    let row: Comment = comments::table.find(new_comment.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(row))))
}

#[derive(Deserialize)]
pub struct EditCommentRequest {
    pub body: String,
}

/// Authors and the senior moderator roles may rewrite a comment; the edit
/// is flagged so readers can tell the text changed after the fact.
pub async fn edit_comment(
    State(state): State<AppState>,
    Path((file_id, comment_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
    Json(payload): Json<EditCommentRequest>,
) -> AppResult<Json<CommentResponse>> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body must not be empty"));
    }

    let mut conn = state.db()?;
    let existing: Comment = comments::table
        .find(comment_id)
        .first(&mut conn)
        .optional()?
        .filter(|c: &Comment| c.file_id == file_id)
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    let is_author = existing.user_id == user.user_id;
    let is_moderator = COMMENT_MODERATOR_ROLES.contains(&user.role.as_str());
    if !is_author && !is_moderator {
        return Err(AppError::forbidden(
            "only the author or a senior officer may edit a comment",
        ));
    }

    diesel::update(comments::table.find(comment_id))
        .set((
            comments::body.eq(body),
            comments::edited.eq(true),
            comments::edited_at.eq(Some(Utc::now().naive_utc())),
        ))
        .execute(&mut conn)?;

    let row: Comment = comments::table.find(comment_id).first(&mut conn)?;
    Ok(Json(CommentResponse::from(row)))
}

/// Deletion is the author's right, plus the senior moderator roles.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path((file_id, comment_id)): Path<(Uuid, Uuid)>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let existing: Comment = comments::table
        .find(comment_id)
        .first(&mut conn)
        .optional()?
        .filter(|c: &Comment| c.file_id == file_id)
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    let is_author = existing.user_id == user.user_id;
    let is_moderator = COMMENT_MODERATOR_ROLES.contains(&user.role.as_str());
    if !is_author && !is_moderator {
        return Err(AppError::forbidden(
            "only the author or a senior officer may delete a comment",
        ));
    }

    diesel::delete(comments::table.find(comment_id)).execute(&mut conn)?;
    Ok(StatusCode::NO_CONTENT)
}
