use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewVerificationChallenge, User, VerificationChallenge};
use crate::schema::{users, verification_challenges};
use crate::state::AppState;

use super::to_iso;

pub const METHOD_OTP: &str = "otp";
pub const METHOD_AUTHENTICATOR: &str = "authenticator";
pub const METHOD_GOOGLE: &str = "google";

const CODE_METHODS: &[&str] = &[METHOD_OTP, METHOD_AUTHENTICATOR];

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[derive(Serialize)]
pub struct SendOtpResponse {
    pub challenge_id: Uuid,
    pub expires_at: String,
}

/// Issues a one-time code for signature re-authentication. Only the SHA-256
/// of the code is stored; delivery (SMS/email) happens out of band.
pub async fn send_otp(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<SendOtpResponse>)> {
    let code: String = {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    };

    let expires_at =
        (Utc::now() + ChronoDuration::minutes(state.config.otp_expiry_minutes)).naive_utc();

    let challenge = NewVerificationChallenge {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        method: METHOD_OTP.to_string(),
        code_hash: hash_code(&code),
        expires_at,
    };

    let mut conn = state.db()?;
    diesel::insert_into(verification_challenges::table)
        .values(&challenge)
        .execute(&mut conn)?;

    // The delivery hook is out of process; the log line is what local
    // development uses instead of a real SMS gateway.
    info!(user_id = %user.user_id, challenge_id = %challenge.id, "issued signature otp");

    Ok((
        StatusCode::CREATED,
        Json(SendOtpResponse {
            challenge_id: challenge.id,
            expires_at: to_iso(expires_at),
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyAuthRequest {
    pub challenge_id: Option<Uuid>,
    pub code: String,
    pub method: Option<String>,
}

#[derive(Serialize)]
pub struct VerificationTokenResponse {
    pub verification_token: String,
    pub expires_in: i64,
    pub method: String,
}

/// Checks the submitted code against the newest open challenge for the
/// requested factor (OTP by default, authenticator codes alike) and, on a
/// match, consumes the challenge and mints a short-lived verification token
/// for the signature commit.
pub async fn verify_auth(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<VerifyAuthRequest>,
) -> AppResult<Json<VerificationTokenResponse>> {
    let code = payload.code.trim();
    if code.is_empty() {
        return Err(AppError::bad_request("code must not be empty"));
    }

    let method = payload.method.as_deref().unwrap_or(METHOD_OTP);
    if !CODE_METHODS.contains(&method) {
        return Err(AppError::bad_request(format!(
            "unknown verification method '{method}'"
        )));
    }

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let token = conn.transaction::<String, AppError, _>(|conn| {
        let mut query = verification_challenges::table
            .filter(verification_challenges::user_id.eq(user.user_id))
            .filter(verification_challenges::method.eq(method))
            .filter(verification_challenges::consumed_at.is_null())
            .filter(verification_challenges::expires_at.gt(now))
            .order(verification_challenges::created_at.desc())
            .into_boxed();
        if let Some(challenge_id) = payload.challenge_id {
            query = query.filter(verification_challenges::id.eq(challenge_id));
        }

        let challenge: VerificationChallenge = query
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::bad_request("no open verification challenge"))?;

        if challenge.code_hash != hash_code(code) {
            return Err(AppError::unauthorized());
        }

        diesel::update(verification_challenges::table.find(challenge.id))
            .set(verification_challenges::consumed_at.eq(Some(now)))
            .execute(conn)?;

        state
            .jwt
            .generate_verification_token(user.user_id, method)
            .map_err(AppError::from)
    })?;

    Ok(Json(VerificationTokenResponse {
        verification_token: token,
        expires_in: state.config.verification_token_expiry_minutes * 60,
        method: method.to_string(),
    }))
}

#[derive(Deserialize)]
pub struct GoogleAuthRequest {
    pub id_token: String,
}

#[derive(Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    email: Option<String>,
    email_verified: Option<String>,
}

/// Google sign-in as the re-authentication factor: the ID token is checked
/// against Google's tokeninfo endpoint, the audience must match our client
/// id and the verified email must belong to the calling user.
pub async fn google_auth(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<GoogleAuthRequest>,
) -> AppResult<Json<VerificationTokenResponse>> {
    let client_id = state
        .config
        .google_client_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("google sign-in is not configured"))?;

    let response = reqwest::Client::new()
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", payload.id_token.as_str())])
        .send()
        .await
        .map_err(|err| AppError::internal(format!("tokeninfo request failed: {err}")))?;

    if !response.status().is_success() {
        return Err(AppError::unauthorized());
    }

    let info: GoogleTokenInfo = response
        .json()
        .await
        .map_err(|_| AppError::unauthorized())?;

    if info.aud != client_id {
        return Err(AppError::unauthorized());
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(AppError::unauthorized());
    }
    let email = info.email.ok_or_else(AppError::unauthorized)?;

    let mut conn = state.db()?;
    let account: User = users::table.find(user.user_id).first(&mut conn)?;
    if !account.username.eq_ignore_ascii_case(&email) {
        return Err(AppError::forbidden(
            "google account does not match the signed-in user",
        ));
    }

    let token = state
        .jwt
        .generate_verification_token(user.user_id, METHOD_GOOGLE)
        .map_err(AppError::from)?;

    Ok(Json(VerificationTokenResponse {
        verification_token: token,
        expires_in: state.config.verification_token_expiry_minutes * 60,
        method: METHOD_GOOGLE.to_string(),
    }))
}
