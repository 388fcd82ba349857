use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod attachments;
pub mod auth;
pub mod comments;
pub mod files;
pub mod health;
pub mod pages;
pub mod reference;
pub mod requests;
pub mod signatures;
pub mod templates;
pub mod verification;

pub(crate) fn to_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).to_rfc3339()
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let request_routes = Router::new()
        .route(
            "/",
            get(requests::list_requests).post(requests::create_request),
        )
        .route(
            "/:id",
            get(requests::get_request).patch(requests::update_request),
        );

    let reference_routes = Router::new()
        .route("/towns", get(reference::list_towns))
        .route("/towns/subtowns", get(reference::list_subtowns))
        .route("/complaints/getalltypes", get(reference::list_complaint_types))
        .route("/complaints/subtypes", get(reference::list_complaint_subtypes))
        .route("/agents", get(reference::list_executive_engineers))
        .route("/socialmediaperson", get(reference::list_social_media_agents));

    let template_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/:id",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/:id/use", post(templates::use_template));

    let file_routes = Router::new()
        .route("/", get(files::list_files).post(files::create_file))
        .route("/:id", get(files::get_file))
        .route("/:id/document", get(pages::get_document))
        .route("/:id/pages", get(pages::list_pages).post(pages::append_page))
        .route(
            "/:id/pages/:page_id",
            put(pages::replace_page).delete(pages::delete_page),
        )
        .route(
            "/:id/signatures",
            get(signatures::list_signatures).post(signatures::commit_signature),
        )
        .route(
            "/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route(
            "/:id/comments/:comment_id",
            axum::routing::patch(comments::edit_comment).delete(comments::delete_comment),
        )
        .route(
            "/:id/attachments",
            get(attachments::list_attachments).post(attachments::upload_attachment),
        )
        .route(
            "/:id/attachments/:attachment_id/download",
            get(attachments::download_attachment),
        )
        .route("/:id/close", post(files::close_file))
        .route("/:id/permissions", get(files::get_permissions))
        .route("/:id/timeline", get(files::get_timeline))
        .route("/:id/mark-to", post(files::mark_to));

    let signature_routes = Router::new()
        .route("/stage", post(signatures::stage_signature))
        .route("/upload", post(signatures::upload_signature_image))
        .route("/scan", post(signatures::scan_signature_image))
        .route(
            "/manage",
            get(signatures::list_signature_templates)
                .post(signatures::create_signature_template),
        )
        .route(
            "/manage/:id",
            axum::routing::patch(signatures::update_signature_template)
                .delete(signatures::delete_signature_template),
        );

    let verification_routes = Router::new()
        .route("/send-otp", post(verification::send_otp))
        .route("/verify-auth", post(verification::verify_auth))
        .route("/google-auth", post(verification::google_auth));

    let efiling_routes = Router::new()
        .route("/divisions", get(reference::list_divisions))
        .nest("/templates", template_routes)
        .nest("/files", file_routes)
        .nest("/signatures", signature_routes)
        .merge(verification_routes);

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/requests", request_routes)
        .nest("/api", reference_routes)
        .nest("/api/efiling", efiling_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        // Uploads are capped at 5 MB in the handlers; leave headroom for the
        // multipart framing.
        .layer(DefaultBodyLimit::max(1024 * 1024 * 8))
}
