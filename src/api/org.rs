use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::model::{department::Department, job_title::JobTitle};

#[derive(Deserialize, ToSchema)]
pub struct CreateNamed {
    #[schema(example = "Engineering")]
    pub name: String,
}

fn clean_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(ApiError::bad_request("name must be 1-100 characters"));
    }
    Ok(name.to_string())
}

#[utoipa::path(
    get,
    path = "/api/department",
    responses((status = 200, body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Organisation"
)]
pub async fn list_departments(_auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult {
    let rows = sqlx::query_as::<_, Department>("SELECT id, name FROM departments ORDER BY name")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/department",
    request_body = CreateNamed,
    responses(
        (status = 201, description = "Department created"),
        (status = 409, description = "Department already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Organisation"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateNamed>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let name = clean_name(&body.name)?;

    let result = sqlx::query("INSERT INTO departments (name) VALUES (?)")
        .bind(&name)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(json!({ "id": result.last_insert_id(), "name": name })))
}

#[utoipa::path(
    get,
    path = "/api/job-title",
    responses((status = 200, body = [JobTitle])),
    security(("bearer_auth" = [])),
    tag = "Organisation"
)]
pub async fn list_job_titles(_auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult {
    let rows = sqlx::query_as::<_, JobTitle>("SELECT id, title FROM job_titles ORDER BY title")
        .fetch_all(pool.get_ref())
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/job-title",
    request_body = CreateNamed,
    responses(
        (status = 201, description = "Job title created"),
        (status = 409, description = "Job title already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Organisation"
)]
pub async fn create_job_title(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateNamed>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let title = clean_name(&body.name)?;

    let result = sqlx::query("INSERT INTO job_titles (title) VALUES (?)")
        .bind(&title)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(json!({ "id": result.last_insert_id(), "title": title })))
}
