use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::expense::{ExpenseCategory, ExpenseStatus, TravelExpense, TravelExpenseItem},
    utils::{
        db_utils::{SqlFilter, bind_query_as, bind_query_scalar, page_bounds},
        payroll_calc::round2,
    },
};

const EXPENSE_COLUMNS: &str = "id, employee_id, purpose, destination, start_date, end_date, total_amount, \
     status, recipient_id, reviewed_by, review_note, created_at";

#[derive(Deserialize, ToSchema)]
pub struct ExpenseItemInput {
    pub category: ExpenseCategory,
    #[schema(example = "Hotel, two nights")]
    pub description: String,
    #[schema(example = 6400.0)]
    pub amount: f64,
    #[schema(example = "2026-10-06", value_type = String, format = "date")]
    pub expense_date: NaiveDate,
    /// path or URL of an uploaded receipt
    pub receipt_ref: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateExpense {
    #[schema(example = "Client workshop")]
    pub purpose: String,
    #[schema(example = "Chattogram")]
    pub destination: String,
    #[schema(example = "2026-10-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-10-07", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub recipient_id: Option<u64>,
    pub items: Vec<ExpenseItemInput>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewExpense {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseQuery {
    pub employee_id: Option<u64>,
    /// pending, approved, rejected or reimbursed
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseListResponse {
    pub data: Vec<TravelExpense>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseDetail {
    #[serde(flatten)]
    pub expense: TravelExpense,
    pub items: Vec<TravelExpenseItem>,
}

/// Validates the claim and returns its total.
fn validate_claim(claim: &CreateExpense) -> ApiResult<f64> {
    if claim.purpose.trim().is_empty() || claim.destination.trim().is_empty() {
        return Err(ApiError::bad_request("purpose and destination are required"));
    }
    if claim.start_date > claim.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }
    if claim.items.is_empty() {
        return Err(ApiError::bad_request("At least one expense item is required"));
    }

    let mut total = 0.0;
    for (idx, item) in claim.items.iter().enumerate() {
        if !item.amount.is_finite() || item.amount <= 0.0 {
            return Err(ApiError::bad_request(format!(
                "items[{idx}].amount must be greater than zero"
            )));
        }
        if item.expense_date < claim.start_date || item.expense_date > claim.end_date {
            return Err(ApiError::bad_request(format!(
                "items[{idx}].expense_date is outside the trip"
            )));
        }
        if item.description.trim().is_empty() {
            return Err(ApiError::bad_request(format!(
                "items[{idx}].description is required"
            )));
        }
        total += item.amount;
    }
    Ok(round2(total))
}

async fn fetch_expense(pool: &MySqlPool, id: u64) -> ApiResult<TravelExpense> {
    sqlx::query_as::<_, TravelExpense>(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM travel_expenses WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Travel expense not found"))
}

async fn list_with_filter(
    pool: &MySqlPool,
    filter: &SqlFilter,
    page: Option<u32>,
    per_page: Option<u32>,
) -> ApiResult<ExpenseListResponse> {
    let bounds = page_bounds(page, per_page, 20);
    let where_sql = filter.where_sql();

    let total = bind_query_scalar(
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM travel_expenses{where_sql}")),
        &filter.values,
    )
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM travel_expenses{where_sql} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_query_as(sqlx::query_as::<_, TravelExpense>(&sql), &filter.values)
        .bind(bounds.per_page)
        .bind(bounds.offset)
        .fetch_all(pool)
        .await?;

    Ok(ExpenseListResponse {
        data,
        page: bounds.page,
        per_page: bounds.per_page,
        total,
    })
}

#[utoipa::path(
    post,
    path = "/api/travel-expense",
    request_body = CreateExpense,
    responses(
        (status = 201, description = "Claim submitted", body = Object, example = json!({
            "message": "Travel expense submitted", "id": 4, "total_amount": 12500.0
        })),
        (status = 400, description = "Invalid claim or recipient"),
        (status = 403, description = "No employee profile")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
#[instrument(name = "expense_create", skip_all, fields(user = auth.user_id))]
pub async fn create_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateExpense>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let total = validate_claim(&payload)?;
    super::validate_recipient(pool.get_ref(), payload.recipient_id).await?;

    let mut tx = pool.begin().await?;

    let expense_id = sqlx::query(
        r#"
        INSERT INTO travel_expenses
        (employee_id, purpose, destination, start_date, end_date, total_amount, status, recipient_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.purpose.trim())
    .bind(payload.destination.trim())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(total)
    .bind(ExpenseStatus::Pending.as_ref())
    .bind(payload.recipient_id)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for item in &payload.items {
        let receipt = super::optional_text(&item.receipt_ref, 500)?;
        sqlx::query(
            r#"
            INSERT INTO travel_expense_items
            (expense_id, category, description, amount, expense_date, receipt_ref)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense_id)
        .bind(item.category.as_ref())
        .bind(item.description.trim())
        .bind(round2(item.amount))
        .bind(item.expense_date)
        .bind(receipt)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(expense_id, items = payload.items.len(), total, "Travel expense submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Travel expense submitted",
        "id": expense_id,
        "total_amount": total
    })))
}

#[utoipa::path(
    get,
    path = "/api/travel-expense/me",
    params(ExpenseQuery),
    responses((status = 200, description = "Own claims", body = ExpenseListResponse)),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn my_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseQuery>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .eq("status", query.status.clone());

    let response = list_with_filter(pool.get_ref(), &filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/travel-expense",
    params(ExpenseQuery),
    responses(
        (status = 200, description = "All claims", body = ExpenseListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn list_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseQuery>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", query.employee_id)
        .eq("status", query.status.clone());

    let response = list_with_filter(pool.get_ref(), &filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/travel-expense/{expense_id}",
    params(("expense_id" = u64, Path, description = "Travel expense ID")),
    responses(
        (status = 200, description = "Claim with its items", body = ExpenseDetail),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Travel expense not found")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn get_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let expense = fetch_expense(pool.get_ref(), path.into_inner()).await?;
    auth.require_access_to(expense.employee_id)?;

    let items = sqlx::query_as::<_, TravelExpenseItem>(
        r#"
        SELECT id, expense_id, category, description, amount, expense_date, receipt_ref
        FROM travel_expense_items WHERE expense_id = ? ORDER BY expense_date, id
        "#,
    )
    .bind(expense.id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(ExpenseDetail { expense, items }))
}

/// Moves a claim from `from` to `to` with the reviewer recorded.
async fn transition(
    auth: &AuthUser,
    pool: &MySqlPool,
    id: u64,
    from: ExpenseStatus,
    to: ExpenseStatus,
    note: Option<String>,
) -> ApiResult {
    let expense = fetch_expense(pool, id).await?;
    if to == ExpenseStatus::Reimbursed {
        // payout is handled by any HR/Admin, not only the approver
        auth.require_hr_or_admin()?;
    } else {
        auth.require_reviewer(expense.recipient_id)?;
    }

    let result = sqlx::query(
        r#"
        UPDATE travel_expenses
        SET status = ?, reviewed_by = ?, reviewed_at = NOW(),
            review_note = COALESCE(?, review_note),
            reimbursed_at = IF(? = 'reimbursed', NOW(), reimbursed_at)
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_ref())
    .bind(auth.user_id)
    .bind(note)
    .bind(to.as_ref())
    .bind(id)
    .bind(from.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(format!(
            "Only {from} travel expenses can be {to}"
        )));
    }

    info!(id, status = %to, by = auth.user_id, "Travel expense updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Travel expense {to}"),
        "id": id
    })))
}

fn review_note(body: &Option<web::Json<ReviewExpense>>) -> ApiResult<Option<String>> {
    match body {
        Some(b) => super::optional_text(&b.note, 500),
        None => Ok(None),
    }
}

#[utoipa::path(
    put,
    path = "/api/travel-expense/{expense_id}/approve",
    params(("expense_id" = u64, Path, description = "Travel expense ID")),
    request_body(content = ReviewExpense, description = "Optional note"),
    responses(
        (status = 200, description = "Claim approved"),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigned reviewer")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn approve_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewExpense>>,
) -> ApiResult {
    let note = review_note(&body)?;
    transition(
        &auth,
        pool.get_ref(),
        path.into_inner(),
        ExpenseStatus::Pending,
        ExpenseStatus::Approved,
        note,
    )
    .await
}

#[utoipa::path(
    put,
    path = "/api/travel-expense/{expense_id}/reject",
    params(("expense_id" = u64, Path, description = "Travel expense ID")),
    request_body(content = ReviewExpense, description = "Optional note"),
    responses(
        (status = 200, description = "Claim rejected"),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigned reviewer")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn reject_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<ReviewExpense>>,
) -> ApiResult {
    let note = review_note(&body)?;
    transition(
        &auth,
        pool.get_ref(),
        path.into_inner(),
        ExpenseStatus::Pending,
        ExpenseStatus::Rejected,
        note,
    )
    .await
}

#[utoipa::path(
    put,
    path = "/api/travel-expense/{expense_id}/reimburse",
    params(("expense_id" = u64, Path, description = "Travel expense ID")),
    responses(
        (status = 200, description = "Claim reimbursed"),
        (status = 400, description = "Not approved")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn reimburse_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    transition(
        &auth,
        pool.get_ref(),
        path.into_inner(),
        ExpenseStatus::Approved,
        ExpenseStatus::Reimbursed,
        None,
    )
    .await
}

#[utoipa::path(
    delete,
    path = "/api/travel-expense/{expense_id}",
    params(("expense_id" = u64, Path, description = "Travel expense ID")),
    responses(
        (status = 200, description = "Claim deleted"),
        (status = 400, description = "Only pending claims can be deleted"),
        (status = 403, description = "Not the owner")
    ),
    tag = "Travel Expense",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let id = path.into_inner();
    let expense = fetch_expense(pool.get_ref(), id).await?;

    if auth.employee_id != Some(expense.employee_id) {
        return Err(ApiError::forbidden("Only the owner can delete a claim"));
    }

    // items go with the claim (ON DELETE CASCADE)
    let result = sqlx::query("DELETE FROM travel_expenses WHERE id = ? AND status = ?")
        .bind(id)
        .bind(ExpenseStatus::Pending.as_ref())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Only pending claims can be deleted"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Travel expense deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn item(amount: f64, day: u32) -> ExpenseItemInput {
        ExpenseItemInput {
            category: ExpenseCategory::Meals,
            description: "Dinner".into(),
            amount,
            expense_date: d(day),
            receipt_ref: None,
        }
    }

    fn claim(items: Vec<ExpenseItemInput>) -> CreateExpense {
        CreateExpense {
            purpose: "Client workshop".into(),
            destination: "Sylhet".into(),
            start_date: d(5),
            end_date: d(7),
            recipient_id: None,
            items,
        }
    }

    #[test]
    fn total_is_the_sum_of_items() {
        let total = validate_claim(&claim(vec![item(100.10, 5), item(200.20, 7)])).unwrap();
        assert_eq!(total, 300.3);
    }

    #[test]
    fn claims_need_valid_items() {
        assert!(validate_claim(&claim(vec![])).is_err());
        assert!(validate_claim(&claim(vec![item(0.0, 5)])).is_err());
        // outside the trip
        assert!(validate_claim(&claim(vec![item(10.0, 8)])).is_err());
    }

    #[test]
    fn category_wire_names() {
        let parsed: ExpenseCategory = serde_json::from_str("\"local_conveyance\"").unwrap();
        assert_eq!(parsed, ExpenseCategory::LocalConveyance);
        assert_eq!(parsed.as_ref(), "local_conveyance");
    }
}
