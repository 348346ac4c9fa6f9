use std::str::FromStr;

use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    jobs::{JobKind, RunOutcome, ledger, run_job},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobRunQuery {
    /// leave_allocation, payroll_aggregation or log_cleanup
    pub job: Option<String>,
    /// Max rows, 1..=200
    pub limit: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct RunJobRequest {
    /// YYYY-MM for monthly jobs, YYYY-MM-DD for log_cleanup; defaults to the current period
    #[schema(example = "2026-10")]
    pub period: Option<String>,
}

fn parse_job(name: &str) -> ApiResult<JobKind> {
    JobKind::from_str(name).map_err(|_| ApiError::not_found(format!("Unknown job: {name}")))
}

#[utoipa::path(
    get,
    path = "/api/jobs/runs",
    params(JobRunQuery),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = [JobRun]),
        (status = 403, description = "Admin only")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
pub async fn list_runs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<JobRunQuery>,
) -> ApiResult {
    auth.require_admin()?;
    let job = query.job.as_deref().map(parse_job).transpose()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let runs = ledger::recent(pool.get_ref(), job, limit).await?;
    Ok(HttpResponse::Ok().json(runs))
}

/// Manual run through the same ledger the scheduler uses
#[utoipa::path(
    post,
    path = "/api/jobs/{job_name}/run",
    params(("job_name" = String, Path, description = "leave_allocation, payroll_aggregation or log_cleanup")),
    request_body(content = RunJobRequest, description = "Optional period"),
    responses(
        (status = 200, description = "Job completed", body = Object, example = json!({
            "job": "leave_allocation", "period": "2026-10", "affected": 42
        })),
        (status = 400, description = "Malformed period"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Already done for that period")
    ),
    tag = "Jobs",
    security(("bearer_auth" = []))
)]
#[instrument(name = "job_manual_run", skip(auth, pool, config, body), fields(by = auth.user_id))]
pub async fn run_now(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<String>,
    body: Option<web::Json<RunJobRequest>>,
) -> ApiResult {
    auth.require_admin()?;
    let kind = parse_job(&path)?;

    let requested = body.as_ref().and_then(|b| b.period.as_deref());
    let period = match requested {
        Some(raw) => kind
            .normalize_period(raw)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid period for {kind}: {raw}")))?,
        None => kind.period_for(Local::now().date_naive()),
    };

    match run_job(pool.get_ref(), config.get_ref(), kind, &period).await? {
        RunOutcome::AlreadyDone => Err(ApiError::conflict(format!(
            "{kind} already ran for {period}"
        ))),
        RunOutcome::Completed { affected } => {
            info!(job = %kind, period = %period, affected, "Job run manually");
            Ok(HttpResponse::Ok().json(json!({
                "job": kind.as_ref(),
                "period": period,
                "affected": affected
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_jobs_are_not_found() {
        assert_eq!(parse_job("log_cleanup").unwrap(), JobKind::LogCleanup);
        assert!(matches!(parse_job("reindex"), Err(ApiError::NotFound(_))));
    }
}
