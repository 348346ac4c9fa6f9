use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::performance::{Feedback, Goal, GoalStatus, GoalTask, TaskStatus},
    utils::{
        db_utils::{SqlFilter, bind_query_as, bind_query_scalar},
        payroll_calc::round2,
    },
};

const GOAL_COLUMNS: &str =
    "id, employee_id, title, description, period, weight, progress, status, due_date, created_by";

#[derive(Deserialize, ToSchema)]
pub struct CreateGoal {
    /// Defaults to the caller; HR/Admin may set goals for anyone
    pub employee_id: Option<u64>,
    #[schema(example = "Ship the payroll revamp")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "2026-H2")]
    pub period: String,
    #[schema(example = 40)]
    pub weight: i32,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateGoal {
    #[schema(example = 60)]
    pub progress: Option<i32>,
    pub status: Option<GoalStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTask {
    #[schema(example = "Draft the migration plan")]
    pub title: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTask {
    pub status: TaskStatus,
    pub title: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateFeedback {
    pub employee_id: u64,
    #[schema(example = "2026-H2")]
    pub period: String,
    #[schema(example = 4)]
    pub rating: i32,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PerformanceQuery {
    /// Defaults to the caller's own employee record
    pub employee_id: Option<u64>,
    #[param(example = "2026-H2")]
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    #[param(example = "2026-H2")]
    pub period: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct PerformanceSummary {
    pub employee_id: u64,
    pub period: Option<String>,
    pub goals: usize,
    pub completed_goals: usize,
    /// progress weighted by goal weight, 0..100
    #[schema(example = 72.5)]
    pub weighted_progress: f64,
    pub feedback_count: usize,
    #[schema(example = 4.25)]
    pub average_rating: Option<f64>,
}

fn validate_period(period: &str) -> ApiResult<&str> {
    let period = period.trim();
    if period.is_empty() || period.chars().count() > 16 {
        return Err(ApiError::bad_request("period is required (max 16 characters)"));
    }
    Ok(period)
}

fn validate_title(title: &str) -> ApiResult<&str> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 255 {
        return Err(ApiError::bad_request("title is required (max 255 characters)"));
    }
    Ok(title)
}

pub fn status_for_progress(progress: i32) -> GoalStatus {
    match progress {
        p if p >= 100 => GoalStatus::Completed,
        p if p > 0 => GoalStatus::InProgress,
        _ => GoalStatus::NotStarted,
    }
}

/// Progress and status after an update. Reaching 100 completes the goal
/// and marking it completed fills the progress.
pub fn resolve_goal_update(
    progress: Option<i32>,
    status: Option<GoalStatus>,
    current_progress: i32,
) -> ApiResult<(i32, GoalStatus)> {
    if let Some(p) = progress {
        if !(0..=100).contains(&p) {
            return Err(ApiError::bad_request("progress must be between 0 and 100"));
        }
    }

    let progress = progress.unwrap_or(current_progress);
    match status {
        Some(GoalStatus::Completed) => Ok((100, GoalStatus::Completed)),
        _ if progress == 100 => Ok((100, GoalStatus::Completed)),
        Some(status) => Ok((progress, status)),
        None => Ok((progress, status_for_progress(progress))),
    }
}

pub fn progress_from_tasks(statuses: &[String]) -> i32 {
    if statuses.is_empty() {
        return 0;
    }
    let done = statuses
        .iter()
        .filter(|s| s.as_str() == TaskStatus::Done.as_ref())
        .count();
    ((done * 100) as f64 / statuses.len() as f64).round() as i32
}

pub fn weighted_progress(goals: &[Goal]) -> f64 {
    let total_weight: i32 = goals.iter().map(|g| g.weight).sum();
    if total_weight <= 0 {
        return 0.0;
    }
    let weighted: i64 = goals
        .iter()
        .map(|g| g.weight as i64 * g.progress as i64)
        .sum();
    round2(weighted as f64 / total_weight as f64)
}

pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i32 = ratings.iter().sum();
    Some(round2(sum as f64 / ratings.len() as f64))
}

async fn fetch_goal(pool: &MySqlPool, id: u64) -> ApiResult<Goal> {
    sqlx::query_as::<_, Goal>(&format!("SELECT {GOAL_COLUMNS} FROM performance_goals WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal not found"))
}

async fn recompute_goal(conn: &mut MySqlConnection, goal_id: u64) -> Result<i32, sqlx::Error> {
    let statuses = sqlx::query_scalar::<_, String>(
        "SELECT status FROM performance_tasks WHERE goal_id = ?",
    )
    .bind(goal_id)
    .fetch_all(&mut *conn)
    .await?;

    let progress = progress_from_tasks(&statuses);
    sqlx::query("UPDATE performance_goals SET progress = ?, status = ? WHERE id = ?")
        .bind(progress)
        .bind(status_for_progress(progress).as_ref())
        .bind(goal_id)
        .execute(&mut *conn)
        .await?;

    debug!(goal_id, progress, "Goal progress recomputed");
    Ok(progress)
}

/// Employee whose records a list query targets.
fn target_employee(auth: &AuthUser, requested: Option<u64>) -> ApiResult<u64> {
    let employee_id = match requested {
        Some(id) => id,
        None => auth.require_employee_profile()?,
    };
    auth.require_access_to(employee_id)?;
    Ok(employee_id)
}

#[utoipa::path(
    post,
    path = "/api/performance/goals",
    request_body = CreateGoal,
    responses(
        (status = 201, description = "Goal created"),
        (status = 400, description = "Invalid goal"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn create_goal(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateGoal>,
) -> ApiResult {
    let employee_id = target_employee(&auth, payload.employee_id)?;
    let title = validate_title(&payload.title)?;
    let period = validate_period(&payload.period)?;
    if !(1..=100).contains(&payload.weight) {
        return Err(ApiError::bad_request("weight must be between 1 and 100"));
    }
    let description = super::optional_text(&payload.description, 5000)?;

    let id = sqlx::query(
        r#"
        INSERT INTO performance_goals (employee_id, title, description, period, weight, status, due_date, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(title)
    .bind(description)
    .bind(period)
    .bind(payload.weight)
    .bind(GoalStatus::NotStarted.as_ref())
    .bind(payload.due_date)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(id, employee_id, "Goal created");
    Ok(HttpResponse::Created().json(json!({ "message": "Goal created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/performance/goals",
    params(PerformanceQuery),
    responses(
        (status = 200, description = "Goals", body = [Goal]),
        (status = 403, description = "Forbidden")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn list_goals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PerformanceQuery>,
) -> ApiResult {
    let employee_id = target_employee(&auth, query.employee_id)?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .eq("period", query.period.clone());

    let sql = format!(
        "SELECT {GOAL_COLUMNS} FROM performance_goals{} ORDER BY due_date IS NULL, due_date, id",
        filter.where_sql()
    );
    let goals = bind_query_as(sqlx::query_as::<_, Goal>(&sql), &filter.values)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(goals))
}

#[utoipa::path(
    put,
    path = "/api/performance/goals/{goal_id}",
    params(("goal_id" = u64, Path, description = "Goal ID")),
    request_body = UpdateGoal,
    responses(
        (status = 200, description = "Goal updated", body = Goal),
        (status = 400, description = "Invalid progress"),
        (status = 404, description = "Goal not found")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn update_goal(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateGoal>,
) -> ApiResult {
    let goal_id = path.into_inner();
    let goal = fetch_goal(pool.get_ref(), goal_id).await?;
    auth.require_access_to(goal.employee_id)?;

    let (progress, status) = resolve_goal_update(payload.progress, payload.status, goal.progress)?;
    let title = match &payload.title {
        Some(t) => validate_title(t)?.to_string(),
        None => goal.title,
    };
    let description = match &payload.description {
        Some(_) => super::optional_text(&payload.description, 5000)?,
        None => goal.description,
    };

    sqlx::query(
        "UPDATE performance_goals SET progress = ?, status = ?, title = ?, description = ? WHERE id = ?",
    )
    .bind(progress)
    .bind(status.as_ref())
    .bind(&title)
    .bind(&description)
    .bind(goal_id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(fetch_goal(pool.get_ref(), goal_id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/performance/goals/{goal_id}",
    params(("goal_id" = u64, Path, description = "Goal ID")),
    responses(
        (status = 200, description = "Goal deleted"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Goal not found")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn delete_goal(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let result = sqlx::query("DELETE FROM performance_goals WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Goal not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Goal deleted" })))
}

#[utoipa::path(
    post,
    path = "/api/performance/goals/{goal_id}/tasks",
    params(("goal_id" = u64, Path, description = "Goal ID")),
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task added"),
        (status = 404, description = "Goal not found")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateTask>,
) -> ApiResult {
    let goal_id = path.into_inner();
    let goal = fetch_goal(pool.get_ref(), goal_id).await?;
    auth.require_access_to(goal.employee_id)?;
    let title = validate_title(&payload.title)?;

    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        "INSERT INTO performance_tasks (goal_id, title, status, due_date) VALUES (?, ?, ?, ?)",
    )
    .bind(goal_id)
    .bind(title)
    .bind(TaskStatus::Open.as_ref())
    .bind(payload.due_date)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    let progress = recompute_goal(&mut tx, goal_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Task added",
        "id": id,
        "goal_progress": progress
    })))
}

#[utoipa::path(
    get,
    path = "/api/performance/goals/{goal_id}/tasks",
    params(("goal_id" = u64, Path, description = "Goal ID")),
    responses(
        (status = 200, description = "Tasks of the goal", body = [GoalTask]),
        (status = 404, description = "Goal not found")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let goal = fetch_goal(pool.get_ref(), path.into_inner()).await?;
    auth.require_access_to(goal.employee_id)?;

    let tasks = sqlx::query_as::<_, GoalTask>(
        "SELECT id, goal_id, title, status, due_date FROM performance_tasks WHERE goal_id = ? ORDER BY id",
    )
    .bind(goal.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(tasks))
}

#[utoipa::path(
    put,
    path = "/api/performance/tasks/{task_id}",
    params(("task_id" = u64, Path, description = "Task ID")),
    request_body = UpdateTask,
    responses(
        (status = 200, description = "Task updated and goal progress recomputed"),
        (status = 404, description = "Task not found")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTask>,
) -> ApiResult {
    let task_id = path.into_inner();

    let (goal_id, employee_id) = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT t.goal_id, g.employee_id
        FROM performance_tasks t JOIN performance_goals g ON g.id = t.goal_id
        WHERE t.id = ?
        "#,
    )
    .bind(task_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Task not found"))?;
    auth.require_access_to(employee_id)?;

    let title = payload.title.as_deref().map(validate_title).transpose()?;

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE performance_tasks SET status = ?, title = COALESCE(?, title) WHERE id = ?")
        .bind(payload.status.as_ref())
        .bind(title)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

    let progress = recompute_goal(&mut tx, goal_id).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task updated",
        "goal_id": goal_id,
        "goal_progress": progress
    })))
}

#[utoipa::path(
    post,
    path = "/api/performance/feedback",
    request_body = CreateFeedback,
    responses(
        (status = 201, description = "Feedback recorded"),
        (status = 400, description = "Rating out of range"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn create_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateFeedback>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::bad_request("rating must be between 1 and 5"));
    }
    let period = validate_period(&payload.period)?;
    let comments = super::optional_text(&payload.comments, 5000)?;

    crate::api::employee::fetch_employee(pool.get_ref(), payload.employee_id).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO performance_feedback (employee_id, reviewer_id, period, rating, comments)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(auth.user_id)
    .bind(period)
    .bind(payload.rating)
    .bind(comments)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(id, employee_id = payload.employee_id, rating = payload.rating, "Feedback recorded");
    Ok(HttpResponse::Created().json(json!({ "message": "Feedback recorded", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/performance/feedback",
    params(PerformanceQuery),
    responses(
        (status = 200, description = "Feedback entries", body = [Feedback]),
        (status = 403, description = "Forbidden")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn list_feedback(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PerformanceQuery>,
) -> ApiResult {
    let employee_id = target_employee(&auth, query.employee_id)?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .eq("period", query.period.clone());

    let sql = format!(
        "SELECT id, employee_id, reviewer_id, period, rating, comments FROM performance_feedback{} ORDER BY id DESC",
        filter.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, Feedback>(&sql), &filter.values)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/performance/summary/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        PeriodQuery
    ),
    responses(
        (status = 200, description = "Goal progress and ratings", body = PerformanceSummary),
        (status = 403, description = "Forbidden")
    ),
    tag = "Performance",
    security(("bearer_auth" = []))
)]
pub async fn performance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<PeriodQuery>,
) -> ApiResult {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .eq("period", query.period.clone());
    let where_sql = filter.where_sql();

    let goals = bind_query_as(
        sqlx::query_as::<_, Goal>(&format!("SELECT {GOAL_COLUMNS} FROM performance_goals{where_sql}")),
        &filter.values,
    )
    .fetch_all(pool.get_ref())
    .await?;

    let ratings_sql = format!("SELECT rating FROM performance_feedback{where_sql}");
    let ratings = bind_query_scalar(
        sqlx::query_scalar::<_, i32>(&ratings_sql),
        &filter.values,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(PerformanceSummary {
        employee_id,
        period: query.period.clone(),
        goals: goals.len(),
        completed_goals: goals
            .iter()
            .filter(|g| g.status == GoalStatus::Completed.as_ref())
            .count(),
        weighted_progress: weighted_progress(&goals),
        feedback_count: ratings.len(),
        average_rating: average_rating(&ratings),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(weight: i32, progress: i32) -> Goal {
        Goal {
            id: 1,
            employee_id: 1,
            title: "g".into(),
            description: None,
            period: "2026-H2".into(),
            weight,
            progress,
            status: status_for_progress(progress).to_string(),
            due_date: None,
            created_by: 1,
        }
    }

    #[test]
    fn full_progress_completes_the_goal() {
        assert_eq!(
            resolve_goal_update(Some(100), None, 20).unwrap(),
            (100, GoalStatus::Completed)
        );
        assert_eq!(
            resolve_goal_update(None, Some(GoalStatus::Completed), 20).unwrap(),
            (100, GoalStatus::Completed)
        );
        assert_eq!(
            resolve_goal_update(Some(30), None, 0).unwrap(),
            (30, GoalStatus::InProgress)
        );
        assert!(resolve_goal_update(Some(101), None, 0).is_err());
    }

    #[test]
    fn task_ratio_drives_progress() {
        let statuses: Vec<String> = vec!["done".into(), "open".into(), "done".into()];
        assert_eq!(progress_from_tasks(&statuses), 67);
        assert_eq!(progress_from_tasks(&[]), 0);
        assert_eq!(status_for_progress(0), GoalStatus::NotStarted);
    }

    #[test]
    fn summary_math() {
        let goals = vec![goal(60, 50), goal(40, 100)];
        assert_eq!(weighted_progress(&goals), 70.0);
        assert_eq!(weighted_progress(&[]), 0.0);
        assert_eq!(average_rating(&[4, 5, 3]), Some(4.0));
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn title_limit_counts_characters() {
        assert!(validate_title(&"ü".repeat(255)).is_ok());
        assert!(validate_title(&"ü".repeat(256)).is_err());
        assert!(validate_title("   ").is_err());
    }
}
