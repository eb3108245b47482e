// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, exam, lecturer, student},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, lecturer_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Nests the public, student, exam, lecturer and admin sub-routers under `/api`.
/// * Protected routers run `auth_middleware` first, then their role check.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let authenticated = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
        .route("/resend-verification", post(auth::resend_verification))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(authenticated.clone()),
        );

    let course_routes = Router::new().route("/", get(auth::list_courses));

    let profile_routes = Router::new()
        .route("/", put(auth::update_profile))
        .layer(authenticated.clone());

    let student_routes = Router::new()
        .route("/dashboard", get(student::dashboard))
        .route("/modules", get(student::list_modules))
        .route("/modules/{code}/tests", get(student::module_tests))
        .route("/tests/upcoming", get(student::upcoming_tests))
        .route("/results", get(student::list_results))
        .route("/results/{id}", get(student::get_result))
        .layer(middleware::from_fn(student_middleware))
        .layer(authenticated.clone());

    let exam_routes = Router::new()
        .route("/{test_id}/sessions", post(exam::start_session))
        .route("/sessions/{id}", get(exam::get_session))
        .route("/sessions/{id}/verification", post(exam::submit_verification))
        .route("/sessions/{id}/answers", put(exam::record_answer))
        .route("/sessions/{id}/navigate", post(exam::navigate))
        .route("/sessions/{id}/submit", post(exam::submit))
        .layer(middleware::from_fn(student_middleware))
        .layer(authenticated.clone());

    let lecturer_routes = Router::new()
        .route("/reports", get(lecturer::reports))
        .route("/tests/{id}/results", get(lecturer::test_results))
        .layer(middleware::from_fn(lecturer_middleware))
        .layer(authenticated.clone());

    let admin_routes = Router::new()
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/modules", get(admin::list_modules).post(admin::create_module))
        .route(
            "/modules/{id}",
            put(admin::update_module).delete(admin::delete_module),
        )
        .route("/modules/{id}/tests", post(admin::create_test))
        .route("/tests/{id}", delete(admin::delete_test))
        .route(
            "/tests/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            delete(admin::delete_question).put(admin::update_question),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(authenticated);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/student", student_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/lecturer", lecturer_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
