use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Attachment, NewAttachment};
use crate::schema::{attachments, files};
use crate::state::AppState;
use crate::storage::attachment_key;

use super::files::{load_file, resolve_for};
use super::to_iso;

const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(10 * 60);

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Serialize)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub uploaded_at: String,
}

impl From<Attachment> for AttachmentResponse {
    fn from(row: Attachment) -> Self {
        Self {
            id: row.id,
            file_id: row.file_id,
            file_name: row.file_name,
            content_type: row.content_type,
            size_bytes: row.size_bytes,
            uploaded_by: row.uploaded_by,
            uploaded_at: to_iso(row.uploaded_at),
        }
    }
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<Vec<AttachmentResponse>>> {
    let mut conn = state.db()?;
    load_file(&mut conn, file_id)?;

    let rows: Vec<Attachment> = attachments::table
        .filter(attachments::file_id.eq(file_id))
        .order(attachments::uploaded_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(AttachmentResponse::from).collect()))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<AttachmentResponse>)> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("invalid multipart payload"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::bad_request("attachment must have a file name"))?;

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });

        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::payload_too_large("attachment exceeds the 5 MB limit"))?;

        upload = Some((file_name, content_type, bytes.to_vec()));
        break;
    }

    let (file_name, content_type, bytes) =
        upload.ok_or_else(|| AppError::bad_request("missing file field"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("attachment is empty"));
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(AppError::payload_too_large("attachment exceeds the 5 MB limit"));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::bad_request(format!(
            "unsupported attachment type '{content_type}'"
        )));
    }

    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_add_attachment {
        return Err(AppError::forbidden(
            "not allowed to attach documents to this file",
        ));
    }

    let attachment_id = Uuid::new_v4();
    let storage_key = attachment_key(file_id, attachment_id, &file_name);

    state
        .storage
        .put_object(
            &storage_key,
            bytes.clone(),
            Some(content_type.clone()),
            Some(inline_content_disposition(&file_name)),
        )
        .await
        .map_err(|err| AppError::internal(format!("failed to store attachment: {err}")))?;

    let new_attachment = NewAttachment {
        id: attachment_id,
        file_id,
        file_name,
        storage_key,
        content_type,
        size_bytes: bytes.len() as i64,
        uploaded_by: user.user_id,
    };
    diesel::insert_into(attachments::table)
        .values(&new_attachment)
        .execute(&mut conn)?;

    diesel::update(files::table.find(file_id))
        .set(files::updated_at.eq(Utc::now().naive_utc()))
        .execute(&mut conn)?;

    let row: Attachment = attachments::table.find(attachment_id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(AttachmentResponse::from(row))))
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path((file_id, attachment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DownloadResponse>> {
    let mut conn = state.db()?;
    load_file(&mut conn, file_id)?;

    let attachment: Attachment = attachments::table
        .find(attachment_id)
        .first(&mut conn)
        .optional()?
        .filter(|a: &Attachment| a.file_id == file_id)
        .ok_or_else(|| AppError::not_found("attachment not found"))?;

    let url = state
        .storage
        .presign_get_object(&attachment.storage_key, DOWNLOAD_URL_TTL)
        .await
        .map_err(|err| AppError::internal(format!("failed to presign download: {err}")))?;

    Ok(Json(DownloadResponse {
        url,
        expires_in_seconds: DOWNLOAD_URL_TTL.as_secs(),
    }))
}

fn inline_content_disposition(file_name: &str) -> String {
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC).to_string();
    format!("inline; filename*=UTF-8''{encoded}")
}
