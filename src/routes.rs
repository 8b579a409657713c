// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{achievement, admin, attempt, certificate, course, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Certificate verification is public; every other route needs a bearer token.
/// * Role checks (instructor/admin) happen in the services; `/api/admin` is
///   additionally gated by `admin_middleware`.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let public_routes: Router<AppState> = Router::new()
        .route("/certificates/verify/{code}", get(certificate::verify_certificate));

    let quiz_routes: Router<AppState> = Router::new()
        .route("/quizzes", post(quiz::create_quiz))
        .route(
            "/quizzes/{id}",
            get(quiz::get_quiz).delete(quiz::delete_quiz),
        )
        .route("/quizzes/{id}/settings", put(quiz::update_quiz_settings))
        .route(
            "/quizzes/{id}/attempts",
            post(attempt::start_attempt).get(attempt::list_attempts),
        )
        .route("/attempts/{id}", get(attempt::get_attempt))
        .route("/attempts/{id}/answers", put(attempt::save_answer))
        .route("/attempts/{id}/submit", post(attempt::submit_attempt))
        .route("/attempts/{id}/review", post(attempt::review_attempt));

    let course_routes: Router<AppState> = Router::new()
        .route("/courses", post(course::create_course))
        .route("/courses/{id}/lessons", post(course::add_lesson))
        .route("/courses/{id}/certificate", post(certificate::claim_certificate))
        .route("/lessons/{id}/topics", post(course::add_topic))
        .route("/topics/{id}/complete", post(course::complete_topic))
        .route("/certificates", get(certificate::list_my_certificates))
        .route("/achievements", get(achievement::list_my_achievements));

    let protected_routes: Router<AppState> = Router::new()
        .merge(quiz_routes)
        .merge(course_routes)
        .layer(auth.clone());

    let admin_routes: Router<AppState> = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/certificates", post(admin::issue_manual_certificate))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth);

    Router::new()
        .nest(
            "/api",
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
