// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::{
        course::Course,
        user::{
            LoginRequest, RegisterRequest, ResendVerificationRequest, Role, USER_COLUMNS,
            UpdateProfileRequest, User, VerifyEmailRequest,
        },
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

pub(crate) async fn fetch_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Registers a new student or lecturer.
///
/// Hashes the password using Argon2 before storing it and issues an email verification token.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE id = ?")
        .bind(payload.course_id)
        .fetch_optional(&pool)
        .await?;
    if course_exists.is_none() {
        return Err(AppError::BadRequest("Please select a course/program".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let token = Uuid::new_v4().simple().to_string();
    let email = payload.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users
            (name, surname, email, id_number, gender, password, role, course_id,
             verification_token, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(payload.name.trim())
    .bind(payload.surname.trim())
    .bind(&email)
    .bind(&payload.id_number)
    .bind(&payload.gender)
    .bind(hashed_password)
    .bind(&payload.role)
    .bind(payload.course_id)
    .bind(&token)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("An account with this email or ID number already exists".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, email = %user.email, token = %token, "Email verification token issued");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Confirms an email address using the token issued at registration.
pub async fn verify_email(
    State(pool): State<SqlitePool>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE users SET is_verified = TRUE, verification_token = NULL WHERE verification_token = ?",
    )
    .bind(payload.token.trim())
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Invalid or expired verification token".to_string(),
        ));
    }

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

/// Rotates the verification token. Answers 200 whether or not the address is known.
pub async fn resend_verification(
    State(pool): State<SqlitePool>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let token = Uuid::new_v4().simple().to_string();
    let user_id: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users SET verification_token = ?
        WHERE email = ? AND is_verified = FALSE
        RETURNING id
        "#,
    )
    .bind(&token)
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await?;

    if let Some(user_id) = user_id {
        tracing::info!(user_id, token = %token, "Email verification token reissued");
    }

    Ok(Json(json!({ "message": "If the account exists, a verification email has been sent" })))
}

/// Authenticates a user and returns a JWT token.
///
/// If valid, signs a JWT token with the user's ID and role.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let role: Role = user
        .role
        .parse()
        .map_err(AppError::InternalServerError)?;

    let token = sign_jwt(user.id, role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user,
    })))
}

/// Returns the authenticated user.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, claims.user_id()?).await?;
    Ok(Json(json!({ "user": user })))
}

/// Updates the caller's own profile fields.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = claims.user_id()?;
    let current = fetch_user(&pool, user_id).await?;

    let name = payload.name.map(|n| n.trim().to_string()).unwrap_or(current.name);
    let surname = payload
        .surname
        .map(|s| s.trim().to_string())
        .unwrap_or(current.surname);
    let email = payload
        .email
        .map(|e| e.trim().to_lowercase())
        .unwrap_or(current.email);
    let profile_image = payload.profile_image.or(current.profile_image);

    sqlx::query("UPDATE users SET name = ?, surname = ?, email = ?, profile_image = ? WHERE id = ?")
        .bind(name)
        .bind(surname)
        .bind(email)
        .bind(profile_image)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email is already in use".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    let user = fetch_user(&pool, user_id).await?;
    Ok(Json(json!({ "user": user })))
}

/// Lists courses for the registration form.
pub async fn list_courses(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>("SELECT id, name FROM courses ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(json!({
        "courses": courses,
        "message": "Courses retrieved successfully",
    })))
}
