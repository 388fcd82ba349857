mod common;

use anyhow::Result;
use axum::http::StatusCode;
use base64::Engine as _;
use common::{acquire_db_lock, json_body, TestApp};
use serde_json::json;

async fn setup_file(app: &TestApp) -> Result<(String, String, uuid::Uuid)> {
    let department = app.insert_department("Water Supply", "WS").await?;
    let user = app
        .insert_user("ee1", "pw", "executive_engineer", Some(department))
        .await?;
    let token = app.login_token("ee1", "pw").await?;

    let response = app
        .post_json(
            "/api/efiling/files",
            &json!({ "subject": "Tender approval", "department_id": department }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let file = json_body(response.into_body()).await?;
    Ok((file["id"].as_str().unwrap().to_string(), token, user))
}

async fn verification_token(app: &TestApp, token: &str, user: uuid::Uuid) -> Result<String> {
    app.insert_otp_challenge(user, "123456").await?;
    let response = app
        .post_json(
            "/api/efiling/verify-auth",
            &json!({ "code": "123456" }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await?;
    Ok(body["verification_token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn signing_requires_staging_and_verification() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (file_id, token, user) = setup_file(&app).await?;

    let response = app
        .post_json(
            "/api/efiling/signatures/stage",
            &json!({
                "file_id": file_id,
                "sig_type": "typed",
                "content": "E. Engineer",
                "font": "Dancing Script",
                "color": "#1a237e"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let staged = json_body(response.into_body()).await?;
    assert_eq!(staged["verification_required"], true);
    let staged_id = staged["staged_id"].as_str().unwrap().to_string();

    // A garbage token is rejected outright.
    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/signatures"),
            &json!({ "staged_id": staged_id, "verification_token": "not-a-token" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let verification = verification_token(&app, &token, user).await?;
    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/signatures"),
            &json!({ "staged_id": staged_id, "verification_token": verification }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let signature = json_body(response.into_body()).await?;
    assert_eq!(signature["sig_type"], "typed");
    assert_eq!(signature["is_active"], true);
    assert_eq!(signature["user_role"], "executive_engineer");

    // The staged payload is single use.
    let verification = verification_token(&app, &token, user).await?;
    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/signatures"),
            &json!({ "staged_id": staged_id, "verification_token": verification }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn an_active_signature_blocks_restaging() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (file_id, token, user) = setup_file(&app).await?;

    let response = app
        .post_json(
            "/api/efiling/signatures/stage",
            &json!({ "file_id": file_id, "sig_type": "typed", "content": "E. Engineer" }),
            Some(&token),
        )
        .await?;
    let staged = json_body(response.into_body()).await?;
    let staged_id = staged["staged_id"].as_str().unwrap().to_string();

    let verification = verification_token(&app, &token, user).await?;
    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/signatures"),
            &json!({ "staged_id": staged_id, "verification_token": verification }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .post_json(
            "/api/efiling/signatures/stage",
            &json!({ "file_id": file_id, "sig_type": "typed", "content": "E. Engineer" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn wrong_otp_code_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_file_id, token, user) = setup_file(&app).await?;

    app.insert_otp_challenge(user, "123456").await?;
    let response = app
        .post_json(
            "/api/efiling/verify-auth",
            &json!({ "code": "000000" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn authenticator_codes_are_a_valid_second_factor() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (_file_id, token, user) = setup_file(&app).await?;

    app.insert_code_challenge(user, "654321", "authenticator")
        .await?;
    app.insert_otp_challenge(user, "111111").await?;

    // The otp challenge must not satisfy the authenticator factor.
    let response = app
        .post_json(
            "/api/efiling/verify-auth",
            &json!({ "code": "111111", "method": "authenticator" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json(
            "/api/efiling/verify-auth",
            &json!({ "code": "654321", "method": "authenticator" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response.into_body()).await?;
    assert_eq!(body["method"], "authenticator");
    assert!(!body["verification_token"].as_str().unwrap().is_empty());

    // Unknown factors are refused outright.
    let response = app
        .post_json(
            "/api/efiling/verify-auth",
            &json!({ "code": "654321", "method": "carrier-pigeon" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn drawn_signatures_must_carry_a_png_data_url() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (file_id, token, _user) = setup_file(&app).await?;

    let response = app
        .post_json(
            "/api/efiling/signatures/stage",
            &json!({ "file_id": file_id, "sig_type": "drawn", "content": "scribble" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let png = {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(1, 1))
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
        buf
    };
    let content = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    );
    let response = app
        .post_json(
            "/api/efiling/signatures/stage",
            &json!({ "file_id": file_id, "sig_type": "drawn", "content": content }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn saved_signatures_are_capped_with_one_active() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("ee1", "pw", "executive_engineer", Some(department))
        .await?;
    let token = app.login_token("ee1", "pw").await?;

    for i in 0..3 {
        let response = app
            .post_json(
                "/api/efiling/signatures/manage",
                &json!({ "sig_type": "typed", "content": format!("Variant {i}") }),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Fourth saved signature is refused.
    let response = app
        .post_json(
            "/api/efiling/signatures/manage",
            &json!({ "sig_type": "typed", "content": "One too many" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/api/efiling/signatures/manage", Some(&token)).await?;
    let templates = json_body(response.into_body()).await?;
    let rows = templates.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let active_count = rows
        .iter()
        .filter(|row| row["is_active"] == true)
        .count();
    assert_eq!(active_count, 1);

    // Activating another deactivates the rest.
    let second_id = rows[1]["id"].as_str().unwrap();
    let response = app
        .patch_json(
            &format!("/api/efiling/signatures/manage/{second_id}"),
            &json!({ "is_active": true }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/efiling/signatures/manage", Some(&token)).await?;
    let templates = json_body(response.into_body()).await?;
    let active: Vec<&serde_json::Value> = templates
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| row["is_active"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], second_id);

    app.cleanup().await?;
    Ok(())
}
