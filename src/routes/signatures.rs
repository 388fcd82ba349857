use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    NewSignature, NewSignatureTemplate, NewStagedSignature, Signature, SignatureTemplate,
    StagedSignature,
};
use crate::schema::{files, signature_templates, signatures, staged_signatures};
use crate::state::AppState;
use crate::storage::signature_image_key;

use super::files::{load_file, resolve_for};
use super::pages::SignatureSummary;
use super::to_iso;

pub const SIG_TYPE_DRAWN: &str = "drawn";
pub const SIG_TYPE_TYPED: &str = "typed";
pub const SIG_TYPE_UPLOADED: &str = "uploaded";

const KNOWN_SIG_TYPES: &[&str] = &[SIG_TYPE_DRAWN, SIG_TYPE_TYPED, SIG_TYPE_UPLOADED];

const MAX_SIGNATURE_TEMPLATES: i64 = 3;
const MAX_SIGNATURE_IMAGE_BYTES: usize = 2 * 1024 * 1024;

const DRAWN_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Drawn strokes arrive inline as a PNG data url; pull the raw bytes out so
/// the stage can check they actually render.
fn decode_drawn_signature(content: &str) -> AppResult<Vec<u8>> {
    let encoded = content
        .strip_prefix(DRAWN_DATA_URL_PREFIX)
        .ok_or_else(|| AppError::bad_request("drawn signature must be a png data url"))?;
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| AppError::bad_request("drawn signature is not valid base64"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("drawn signature is empty"));
    }
    if bytes.len() > MAX_SIGNATURE_IMAGE_BYTES {
        return Err(AppError::payload_too_large("signature image exceeds 2 MB"));
    }
    Ok(bytes)
}

pub async fn list_signatures(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> AppResult<Json<Vec<SignatureSummary>>> {
    let mut conn = state.db()?;
    load_file(&mut conn, file_id)?;

    let rows: Vec<Signature> = signatures::table
        .filter(signatures::file_id.eq(file_id))
        .order(signatures::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(SignatureSummary::from).collect()))
}

#[derive(Deserialize)]
pub struct StageSignatureRequest {
    pub file_id: Uuid,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct StageSignatureResponse {
    pub staged_id: Uuid,
    pub expires_at: String,
    pub verification_required: bool,
}

/// First half of the two-phase sign. The signature payload is parked
/// server-side and nothing touches the ledger until the caller comes back
/// with a verification token minted by a successful identity re-check.
pub async fn stage_signature(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<StageSignatureRequest>,
) -> AppResult<(StatusCode, Json<StageSignatureResponse>)> {
    if !KNOWN_SIG_TYPES.contains(&payload.sig_type.as_str()) {
        return Err(AppError::bad_request(format!(
            "unknown signature type '{}'",
            payload.sig_type
        )));
    }
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("signature content must not be empty"));
    }
    if payload.sig_type == SIG_TYPE_DRAWN {
        let bytes = decode_drawn_signature(&payload.content)?;
        image::load_from_memory(&bytes)
            .map_err(|_| AppError::bad_request("drawn signature is not a decodable image"))?;
    }

    let mut conn = state.db()?;
    let file = load_file(&mut conn, payload.file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_sign {
        return Err(AppError::forbidden("not allowed to sign this file"));
    }

    let expires_at = (Utc::now()
        + ChronoDuration::minutes(state.config.signature_stage_expiry_minutes))
    .naive_utc();

    let staged = NewStagedSignature {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        payload: json!({
            "file_id": payload.file_id,
            "sig_type": payload.sig_type,
            "content": payload.content,
            "font": payload.font,
            "color": payload.color,
        }),
        expires_at,
    };
    diesel::insert_into(staged_signatures::table)
        .values(&staged)
        .execute(&mut conn)?;

    Ok((
        StatusCode::CREATED,
        Json(StageSignatureResponse {
            staged_id: staged.id,
            expires_at: to_iso(expires_at),
            verification_required: true,
        }),
    ))
}

#[derive(Deserialize)]
pub struct CommitSignatureRequest {
    pub staged_id: Uuid,
    pub verification_token: String,
}

/// Second half of the two-phase sign: a valid verification token plus the
/// staged payload become a ledger entry. The staged row is consumed so the
/// same token/stage pair cannot sign twice.
pub async fn commit_signature(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<CommitSignatureRequest>,
) -> AppResult<(StatusCode, Json<SignatureSummary>)> {
    let claims = state
        .jwt
        .verify_verification_token(&payload.verification_token)
        .map_err(|_| AppError::unauthorized())?;
    if claims.sub != user.user_id {
        return Err(AppError::forbidden(
            "verification token belongs to a different user",
        ));
    }

    let mut conn = state.db()?;
    let file = load_file(&mut conn, file_id)?;

    let permissions = resolve_for(&mut conn, &file, &user)?;
    if !permissions.can_sign {
        return Err(AppError::forbidden("not allowed to sign this file"));
    }

    let signature_id = Uuid::new_v4();
    conn.transaction::<_, AppError, _>(|conn| {
        let staged: StagedSignature = staged_signatures::table
            .find(payload.staged_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("staged signature not found"))?;

        if staged.user_id != user.user_id {
            return Err(AppError::forbidden(
                "staged signature belongs to a different user",
            ));
        }
        if staged.consumed_at.is_some() {
            return Err(AppError::bad_request("staged signature already used"));
        }
        if staged.expires_at < Utc::now().naive_utc() {
            return Err(AppError::bad_request("staged signature expired"));
        }

        let staged_file_id = staged
            .payload
            .get("file_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::internal("staged payload missing file_id"))?;
        if staged_file_id != file_id {
            return Err(AppError::bad_request(
                "staged signature was prepared for a different file",
            ));
        }

        let sig_type = staged
            .payload
            .get("sig_type")
            .and_then(|v| v.as_str())
            .unwrap_or(SIG_TYPE_TYPED)
            .to_string();
        let content = staged
            .payload
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::internal("staged payload missing content"))?
            .to_string();
        let font = staged
            .payload
            .get("font")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let color = staged
            .payload
            .get("color")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // Re-signing after a mark-back supersedes the earlier entry; the old
        // row stays in the ledger, just no longer active.
        diesel::update(
            signatures::table
                .filter(signatures::file_id.eq(file_id))
                .filter(signatures::user_id.eq(user.user_id))
                .filter(signatures::is_active.eq(true)),
        )
        .set(signatures::is_active.eq(false))
        .execute(conn)?;

        let new_signature = NewSignature {
            id: signature_id,
            file_id,
            user_id: user.user_id,
            user_role: user.role.clone(),
            sig_type,
            content,
            font,
            color,
            is_active: true,
        };
        diesel::insert_into(signatures::table)
            .values(&new_signature)
            .execute(conn)?;

        diesel::update(staged_signatures::table.find(staged.id))
            .set(staged_signatures::consumed_at.eq(Some(Utc::now().naive_utc())))
            .execute(conn)?;

        diesel::update(files::table.find(file_id))
            .set(files::updated_at.eq(Utc::now().naive_utc()))
            .execute(conn)?;

        Ok(())
    })?;

    let signature: Signature = signatures::table.find(signature_id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(SignatureSummary::from(signature))))
}

#[derive(Serialize)]
pub struct SignatureImageResponse {
    pub image_id: Uuid,
    pub storage_key: String,
}

/// Stores a hand-signed image as-is (re-encoded to PNG so the stored bytes
/// are always a well-formed raster).
pub async fn upload_signature_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SignatureImageResponse>)> {
    let bytes = read_image_field(multipart).await?;
    let img = image::load_from_memory(&bytes)
        .map_err(|_| AppError::bad_request("could not decode signature image"))?;

    store_signature_png(&state, user.user_id, img).await
}

/// Scanned paper signatures carry the page background with them; knock out
/// light pixels so the stroke composes cleanly over a document.
pub async fn scan_signature_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<SignatureImageResponse>)> {
    let bytes = read_image_field(multipart).await?;
    let img = image::load_from_memory(&bytes)
        .map_err(|_| AppError::bad_request("could not decode signature image"))?;

    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let luminance =
            0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        if luminance > 200.0 {
            pixel.0[3] = 0;
        }
    }

    store_signature_png(&state, user.user_id, image::DynamicImage::ImageRgba8(rgba)).await
}

async fn read_image_field(mut multipart: Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::bad_request("invalid multipart payload"))?
    {
        if field.name() == Some("image") || field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("failed to read image field"))?;
            if bytes.is_empty() {
                return Err(AppError::bad_request("image field is empty"));
            }
            if bytes.len() > MAX_SIGNATURE_IMAGE_BYTES {
                return Err(AppError::payload_too_large("signature image exceeds 2 MB"));
            }
            return Ok(bytes.to_vec());
        }
    }
    Err(AppError::bad_request("missing image field"))
}

async fn store_signature_png(
    state: &AppState,
    user_id: Uuid,
    img: image::DynamicImage,
) -> AppResult<(StatusCode, Json<SignatureImageResponse>)> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| AppError::internal(format!("failed to encode signature image: {err}")))?;

    let image_id = Uuid::new_v4();
    let storage_key = signature_image_key(user_id, image_id);
    state
        .storage
        .put_object(&storage_key, png, Some("image/png".to_string()), None)
        .await
        .map_err(|err| AppError::internal(format!("failed to store signature image: {err}")))?;

    Ok((
        StatusCode::CREATED,
        Json(SignatureImageResponse {
            image_id,
            storage_key,
        }),
    ))
}

#[derive(Serialize)]
pub struct SignatureTemplateResponse {
    pub id: Uuid,
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl From<SignatureTemplate> for SignatureTemplateResponse {
    fn from(row: SignatureTemplate) -> Self {
        Self {
            id: row.id,
            sig_type: row.sig_type,
            content: row.content,
            font: row.font,
            color: row.color,
            is_active: row.is_active,
            created_at: to_iso(row.created_at),
        }
    }
}

pub async fn list_signature_templates(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<SignatureTemplateResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<SignatureTemplate> = signature_templates::table
        .filter(signature_templates::user_id.eq(user.user_id))
        .order(signature_templates::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(
        rows.into_iter()
            .map(SignatureTemplateResponse::from)
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct CreateSignatureTemplateRequest {
    pub sig_type: String,
    pub content: String,
    pub font: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

pub async fn create_signature_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateSignatureTemplateRequest>,
) -> AppResult<(StatusCode, Json<SignatureTemplateResponse>)> {
    if !KNOWN_SIG_TYPES.contains(&payload.sig_type.as_str()) {
        return Err(AppError::bad_request(format!(
            "unknown signature type '{}'",
            payload.sig_type
        )));
    }
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("signature content must not be empty"));
    }

    let mut conn = state.db()?;
    let template_id = Uuid::new_v4();

    conn.transaction::<_, AppError, _>(|conn| {
        let count: i64 = signature_templates::table
            .filter(signature_templates::user_id.eq(user.user_id))
            .count()
            .get_result(conn)?;
        if count >= MAX_SIGNATURE_TEMPLATES {
            return Err(AppError::bad_request(format!(
                "at most {MAX_SIGNATURE_TEMPLATES} saved signatures per user"
            )));
        }

        // First saved signature becomes the active one automatically.
        let make_active = payload.is_active || count == 0;
        if make_active {
            diesel::update(
                signature_templates::table
                    .filter(signature_templates::user_id.eq(user.user_id)),
            )
            .set(signature_templates::is_active.eq(false))
            .execute(conn)?;
        }

        let new_template = NewSignatureTemplate {
            id: template_id,
            user_id: user.user_id,
            sig_type: payload.sig_type.clone(),
            content: payload.content.clone(),
            font: payload.font.clone(),
            color: payload.color.clone(),
            is_active: make_active,
        };
        diesel::insert_into(signature_templates::table)
            .values(&new_template)
            .execute(conn)?;
        Ok(())
    })?;

    let row: SignatureTemplate = signature_templates::table
        .find(template_id)
        .first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(SignatureTemplateResponse::from(row)),
    ))
}

#[derive(Deserialize)]
pub struct UpdateSignatureTemplateRequest {
    pub content: Option<String>,
    pub font: Option<String>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_signature_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateSignatureTemplateRequest>,
) -> AppResult<Json<SignatureTemplateResponse>> {
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let existing: SignatureTemplate = signature_templates::table
            .find(template_id)
            .first(conn)
            .optional()?
            .filter(|t: &SignatureTemplate| t.user_id == user.user_id)
            .ok_or_else(|| AppError::not_found("saved signature not found"))?;

        let content = match payload.content {
            Some(content) if content.trim().is_empty() => {
                return Err(AppError::bad_request("signature content must not be empty"))
            }
            Some(content) => content,
            None => existing.content,
        };

        if payload.is_active == Some(true) {
            diesel::update(
                signature_templates::table
                    .filter(signature_templates::user_id.eq(user.user_id)),
            )
            .set(signature_templates::is_active.eq(false))
            .execute(conn)?;
        }

        diesel::update(signature_templates::table.find(template_id))
            .set((
                signature_templates::content.eq(content),
                signature_templates::font.eq(payload.font.or(existing.font)),
                signature_templates::color.eq(payload.color.or(existing.color)),
                signature_templates::is_active
                    .eq(payload.is_active.unwrap_or(existing.is_active)),
            ))
            .execute(conn)?;
        Ok(())
    })?;

    let row: SignatureTemplate = signature_templates::table
        .find(template_id)
        .first(&mut conn)?;
    Ok(Json(SignatureTemplateResponse::from(row)))
}

pub async fn delete_signature_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = diesel::delete(
        signature_templates::table
            .find(template_id)
            .filter(signature_templates::user_id.eq(user.user_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::not_found("saved signature not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
