mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, json_body, TestApp};
use serde_json::json;

async fn setup_file(app: &TestApp, department: i32, token: &str) -> Result<String> {
    let response = app
        .post_json(
            "/api/efiling/files",
            &json!({ "subject": "Annual maintenance", "department_id": department }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let file = json_body(response.into_body()).await?;
    Ok(file["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn pages_append_replace_and_keep_dense_numbering() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("clerk1", "pw", "clerk", Some(department))
        .await?;
    let token = app.login_token("clerk1", "pw").await?;
    let file_id = setup_file(&app, department, &token).await?;

    for i in 2..=3 {
        let response = app
            .post_json(
                &format!("/api/efiling/files/{file_id}/pages"),
                &json!({ "content": { "matter": format!("page {i} text") } }),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        let page = json_body(response.into_body()).await?;
        assert_eq!(page["page_number"], i);
    }

    let response = app
        .get(&format!("/api/efiling/files/{file_id}/pages"), Some(&token))
        .await?;
    let pages = json_body(response.into_body()).await?;
    let pages = pages.as_array().unwrap().clone();
    assert_eq!(pages.len(), 3);
    let middle_id = pages[1]["id"].as_str().unwrap().to_string();

    let response = app
        .put_json(
            &format!("/api/efiling/files/{file_id}/pages/{middle_id}"),
            &json!({ "title": "Revised noting", "content": { "matter": "rewritten" } }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response.into_body()).await?;
    assert_eq!(updated["title"], "Revised noting");
    assert_eq!(updated["content"]["matter"], "rewritten");

    // Deleting the middle page closes the numbering gap.
    let response = app
        .delete(
            &format!("/api/efiling/files/{file_id}/pages/{middle_id}"),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/efiling/files/{file_id}/pages"), Some(&token))
        .await?;
    let pages = json_body(response.into_body()).await?;
    let numbers: Vec<i64> = pages
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["page_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn attachment_pages_are_accepted_and_unknown_types_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("clerk1", "pw", "clerk", Some(department))
        .await?;
    let token = app.login_token("clerk1", "pw").await?;
    let file_id = setup_file(&app, department, &token).await?;

    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/pages"),
            &json!({
                "title": "Site survey",
                "content": { "matter": "enclosed survey sheet" },
                "page_type": "ATTACHMENT"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let page = json_body(response.into_body()).await?;
    assert_eq!(page["page_type"], "ATTACHMENT");

    let response = app
        .post_json(
            &format!("/api/efiling/files/{file_id}/pages"),
            &json!({ "content": { "matter": "x" }, "page_type": "ANNEXURE" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn the_last_page_cannot_be_deleted() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("clerk1", "pw", "clerk", Some(department))
        .await?;
    let token = app.login_token("clerk1", "pw").await?;
    let file_id = setup_file(&app, department, &token).await?;

    let response = app
        .get(&format!("/api/efiling/files/{file_id}/pages"), Some(&token))
        .await?;
    let pages = json_body(response.into_body()).await?;
    let only_page = pages[0]["id"].as_str().unwrap().to_string();

    let response = app
        .delete(
            &format!("/api/efiling/files/{file_id}/pages/{only_page}"),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn document_view_bundles_file_pages_and_signatures() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("clerk1", "pw", "clerk", Some(department))
        .await?;
    let token = app.login_token("clerk1", "pw").await?;
    let file_id = setup_file(&app, department, &token).await?;

    let response = app
        .get(&format!("/api/efiling/files/{file_id}/document"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let document = json_body(response.into_body()).await?;
    assert_eq!(document["file"]["id"], file_id);
    assert_eq!(document["pages"].as_array().unwrap().len(), 1);
    assert!(document["signatures"].as_array().unwrap().is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn templates_round_trip_and_count_usage() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let department = app.insert_department("Water Supply", "WS").await?;
    app.insert_user("clerk1", "pw", "clerk", Some(department))
        .await?;
    let token = app.login_token("clerk1", "pw").await?;

    let response = app
        .post_json(
            "/api/efiling/templates",
            &json!({
                "name": "Standard estimate forwarding",
                "title": "Forwarding of estimate",
                "subject": "Estimate for approval",
                "main_content": "Kindly find enclosed the estimate.\n\nSubmitted for approval."
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let template = json_body(response.into_body()).await?;
    assert_eq!(template["usage_count"], 0);
    let template_id = template["id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/api/efiling/templates/{template_id}/use"),
            &json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let used = json_body(response.into_body()).await?;
    assert_eq!(used["usage_count"], 1);
    // Blank-line-separated text must come back as separate paragraphs.
    assert_eq!(
        used["page_content"]["matter"],
        "<p>Kindly find enclosed the estimate.</p><p>Submitted for approval.</p>"
    );
    assert_eq!(
        used["page_content"]["matter_text"],
        "Kindly find enclosed the estimate.\n\nSubmitted for approval."
    );

    // Empty names are refused on update.
    let response = app
        .put_json(
            &format!("/api/efiling/templates/{template_id}"),
            &json!({ "name": "  " }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(
            &format!("/api/efiling/templates/{template_id}"),
            &json!({ "name": "Renamed template" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let renamed = json_body(response.into_body()).await?;
    assert_eq!(renamed["name"], "Renamed template");

    let response = app
        .delete(&format!("/api/efiling/templates/{template_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/efiling/templates/{template_id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
