// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::{
        module::{CreateModuleRequest, Module, UpdateModuleRequest},
        question::{CreateQuestionRequest, Question, UpdateQuestionRequest},
        test::{CreateTestRequest, Test},
        user::{Role, USER_COLUMNS, User},
    },
    utils::{
        hash::hash_password,
        html::clean_html,
        jwt::Claims,
        validation::{validate_password_strength, validate_sa_id},
    },
};

const MODULE_COLUMNS: &str =
    "id, code, name, credits, description, course_id, lecturer_id, created_at";

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY id DESC",
        USER_COLUMNS
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
    #[validate(length(min = 2, max = 50))]
    pub surname: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = validate_sa_id))]
    pub id_number: Option<String>,
    #[validate(custom(function = validate_password_strength))]
    pub password: String,
    pub role: Role,
    pub course_id: Option<i64>,
}

/// Creates a new user with specific role. Admin-created accounts skip email verification.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let email = payload.email.trim().to_lowercase();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users
            (name, surname, email, id_number, password, role, course_id, is_verified, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?)
        RETURNING id
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.surname.trim())
    .bind(&email)
    .bind(&payload.id_number)
    .bind(hashed_password)
    .bind(payload.role.as_str())
    .bind(payload.course_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("User '{}' already exists", email))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 50))]
    pub surname: Option<String>,
    pub role: Option<Role>,
    #[validate(custom(function = validate_password_strength))]
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.name.is_none()
        && payload.surname.is_none()
        && payload.role.is_none()
        && payload.password.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(surname) = payload.surname {
        separated.push("surname = ");
        separated.push_bind_unseparated(surname.trim().to_string());
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role.as_str());
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update user: {:?}", e);
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Maps a failed module write to 409 on a duplicate code and 400 on a dangling course or
/// lecturer reference.
fn module_write_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        return AppError::Conflict("A module with this code already exists".to_string());
    }
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::BadRequest("Unknown course or lecturer".to_string());
        }
    }
    tracing::error!("Failed to write module: {:?}", e);
    AppError::from(e)
}

pub async fn list_modules(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let modules = sqlx::query_as::<_, Module>(&format!(
        "SELECT {} FROM modules ORDER BY code",
        MODULE_COLUMNS
    ))
    .fetch_all(&pool)
    .await?;

    Ok(Json(modules))
}

/// Creates a module. Module codes are unique.
/// Admin only.
pub async fn create_module(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let module = sqlx::query_as::<_, Module>(&format!(
        r#"
        INSERT INTO modules (code, name, credits, description, course_id, lecturer_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        MODULE_COLUMNS
    ))
    .bind(payload.code.trim().to_uppercase())
    .bind(payload.name.trim())
    .bind(payload.credits)
    .bind(payload.description.as_deref().map(clean_html))
    .bind(payload.course_id)
    .bind(payload.lecturer_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(module_write_error)?;

    Ok((StatusCode::CREATED, Json(module)))
}

/// Updates a module by ID.
/// Admin only.
pub async fn update_module(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if payload.code.is_none()
        && payload.name.is_none()
        && payload.credits.is_none()
        && payload.description.is_none()
        && payload.course_id.is_none()
        && payload.lecturer_id.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE modules SET ");
    let mut separated = builder.separated(", ");

    if let Some(code) = payload.code {
        separated.push("code = ");
        separated.push_bind_unseparated(code.trim().to_uppercase());
    }

    if let Some(name) = payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim().to_string());
    }

    if let Some(credits) = payload.credits {
        separated.push("credits = ");
        separated.push_bind_unseparated(credits);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(course_id) = payload.course_id {
        separated.push("course_id = ");
        separated.push_bind_unseparated(course_id);
    }

    if let Some(lecturer_id) = payload.lecturer_id {
        separated.push("lecturer_id = ");
        separated.push_bind_unseparated(lecturer_id);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(module_write_error)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Module not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a module with its tests, questions and results.
/// Admin only.
pub async fn delete_module(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM modules WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Module not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Creates a test under a module.
/// Admin only.
pub async fn create_test(
    State(pool): State<SqlitePool>,
    Path(module_id): Path<i64>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let module: Option<i64> = sqlx::query_scalar("SELECT id FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(&pool)
        .await?;
    if module.is_none() {
        return Err(AppError::NotFound("Module not found".to_string()));
    }

    let test = sqlx::query_as::<_, Test>(
        r#"
        INSERT INTO tests (module_id, name, duration_secs, due_date, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, module_id, name, duration_secs, due_date, created_at
        "#,
    )
    .bind(module_id)
    .bind(payload.name.trim())
    .bind(payload.duration_secs)
    .bind(payload.due_date)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(test)))
}

/// Deletes a test with its questions and results.
/// Admin only.
pub async fn delete_test(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM tests WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Every question of a test, answers included.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, test_id, position, content, options, answer, created_at
        FROM questions
        WHERE test_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Creates a question under a test. Without an explicit position it goes last.
/// Admin only.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(test_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let test: Option<i64> = sqlx::query_scalar("SELECT id FROM tests WHERE id = ?")
        .bind(test_id)
        .fetch_optional(&pool)
        .await?;
    if test.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let position = match payload.position {
        Some(position) => position,
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM questions WHERE test_id = ?",
            )
            .bind(test_id)
            .fetch_one(&pool)
            .await?
        }
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (test_id, position, content, options, answer, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(test_id)
    .bind(position)
    .bind(clean_html(&payload.content))
    .bind(SqlJson(&payload.options))
    .bind(&payload.answer)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a question by ID. The stored answer must still name one of the options afterwards.
/// Admin only.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let current = sqlx::query_as::<_, Question>(
        "SELECT id, test_id, position, content, options, answer, created_at FROM questions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let position = payload.position.unwrap_or(current.position);
    let content = payload
        .content
        .as_deref()
        .map(clean_html)
        .unwrap_or(current.content);
    let options = payload.options.unwrap_or(current.options.0);
    let answer = payload.answer.unwrap_or(current.answer);

    if !options.iter().any(|o| o.id == answer) {
        return Err(AppError::BadRequest(
            "answer must be the id of one of the options".to_string(),
        ));
    }

    sqlx::query("UPDATE questions SET position = ?, content = ?, options = ?, answer = ? WHERE id = ?")
        .bind(position)
        .bind(content)
        .bind(SqlJson(&options))
        .bind(answer)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::OK)
}

/// Deletes a question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub students: i64,
    pub lecturers: i64,
    pub admins: i64,
    pub modules: i64,
    pub tests: i64,
    pub results: i64,
}

/// Headline counts for the admin dashboard.
pub async fn stats(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let stats = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users WHERE role = 'student'),
            (SELECT COUNT(*) FROM users WHERE role = 'lecturer'),
            (SELECT COUNT(*) FROM users WHERE role = 'admin'),
            (SELECT COUNT(*) FROM modules),
            (SELECT COUNT(*) FROM tests),
            (SELECT COUNT(*) FROM exam_results)
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let (students, lecturers, admins, modules, tests, results) = stats;
    Ok(Json(SystemStats {
        students,
        lecturers,
        admins,
        modules,
        tests,
        results,
    }))
}
