use std::fmt::Write as _;

use actix_web::{HttpResponse, http::header, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::payroll::PayrollStatus,
    utils::calendar::parse_month,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayslipQuery {
    /// YYYY-MM; the latest finalized month when omitted
    #[param(example = "2026-09")]
    pub month: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PayslipRow {
    payroll_id: u64,
    employee_id: u64,
    month: NaiveDate,
    employee_code: String,
    first_name: String,
    last_name: String,
    department: Option<String>,
    job_title: Option<String>,
    working_days: f64,
    payable_days: f64,
    basic: f64,
    hra: f64,
    special_allowance: f64,
    other_allowance: f64,
    bonus: f64,
    gross: f64,
    pf: f64,
    esi: f64,
    professional_tax: f64,
    tds: f64,
    other_deductions: f64,
    total_deductions: f64,
    net_salary: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayslipEmployee {
    pub id: u64,
    #[schema(example = "EMP-001")]
    pub code: String,
    #[schema(example = "John Doe")]
    pub name: String,
    pub department: Option<String>,
    pub job_title: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayslipEarnings {
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowance: f64,
    pub bonus: f64,
    pub gross: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayslipDeductions {
    pub provident_fund: f64,
    pub esi: f64,
    pub professional_tax: f64,
    pub tds: f64,
    pub other: f64,
    pub total: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Payslip {
    #[schema(example = "PS-202609-EMP-001")]
    pub payslip_number: String,
    pub payroll_id: u64,
    #[schema(example = "2026-09")]
    pub month: String,
    pub employee: PayslipEmployee,
    pub working_days: f64,
    pub payable_days: f64,
    pub earnings: PayslipEarnings,
    pub deductions: PayslipDeductions,
    pub net_salary: f64,
}

pub fn payslip_number(month: NaiveDate, employee_code: &str) -> String {
    format!("PS-{}-{}", month.format("%Y%m"), employee_code)
}

impl From<PayslipRow> for Payslip {
    fn from(row: PayslipRow) -> Self {
        Payslip {
            payslip_number: payslip_number(row.month, &row.employee_code),
            payroll_id: row.payroll_id,
            month: row.month.format("%Y-%m").to_string(),
            employee: PayslipEmployee {
                id: row.employee_id,
                code: row.employee_code,
                name: format!("{} {}", row.first_name, row.last_name),
                department: row.department,
                job_title: row.job_title,
            },
            working_days: row.working_days,
            payable_days: row.payable_days,
            earnings: PayslipEarnings {
                basic: row.basic,
                hra: row.hra,
                special_allowance: row.special_allowance,
                other_allowance: row.other_allowance,
                bonus: row.bonus,
                gross: row.gross,
            },
            deductions: PayslipDeductions {
                provident_fund: row.pf,
                esi: row.esi,
                professional_tax: row.professional_tax,
                tds: row.tds,
                other: row.other_deductions,
                total: row.total_deductions,
            },
            net_salary: row.net_salary,
        }
    }
}

/// Plain-text payslip used for downloads.
pub fn render_text(slip: &Payslip) -> String {
    fn line(out: &mut String, label: &str, amount: f64) {
        let _ = writeln!(out, "  {label:<24}{amount:>14.2}");
    }

    let mut out = String::new();
    let _ = writeln!(out, "PAYSLIP {}", slip.payslip_number);
    let _ = writeln!(out, "Month: {}", slip.month);
    let _ = writeln!(out, "Employee: {} ({})", slip.employee.name, slip.employee.code);
    if let Some(dept) = &slip.employee.department {
        let _ = writeln!(out, "Department: {dept}");
    }
    if let Some(title) = &slip.employee.job_title {
        let _ = writeln!(out, "Designation: {title}");
    }
    let _ = writeln!(
        out,
        "Payable days: {} of {}",
        slip.payable_days, slip.working_days
    );

    out.push_str("\nEarnings\n");
    line(&mut out, "Basic", slip.earnings.basic);
    line(&mut out, "HRA", slip.earnings.hra);
    line(&mut out, "Special allowance", slip.earnings.special_allowance);
    line(&mut out, "Other allowance", slip.earnings.other_allowance);
    line(&mut out, "Bonus", slip.earnings.bonus);
    line(&mut out, "Gross", slip.earnings.gross);

    out.push_str("\nDeductions\n");
    line(&mut out, "Provident fund", slip.deductions.provident_fund);
    line(&mut out, "ESI", slip.deductions.esi);
    line(&mut out, "Professional tax", slip.deductions.professional_tax);
    line(&mut out, "TDS", slip.deductions.tds);
    line(&mut out, "Other", slip.deductions.other);
    line(&mut out, "Total", slip.deductions.total);

    out.push('\n');
    line(&mut out, "NET PAY", slip.net_salary);
    out
}

const PAYSLIP_SELECT: &str = r#"
    SELECT p.id AS payroll_id, p.employee_id, p.month, e.employee_code, e.first_name, e.last_name,
           d.name AS department, j.title AS job_title,
           p.working_days, p.payable_days, p.basic, p.hra, p.special_allowance, p.other_allowance,
           p.bonus, p.gross, p.pf, p.esi, p.professional_tax, p.tds, p.other_deductions,
           p.total_deductions, p.net_salary
    FROM payroll p
    JOIN employees e ON e.id = p.employee_id
    LEFT JOIN departments d ON d.id = e.department_id
    LEFT JOIN job_titles j ON j.id = e.job_title_id
"#;

async fn payslip_by_id(auth: &AuthUser, pool: &MySqlPool, payroll_id: u64) -> ApiResult<Payslip> {
    let row = sqlx::query_as::<_, PayslipRow>(&format!(
        "{PAYSLIP_SELECT} WHERE p.id = ? AND p.status = ?"
    ))
    .bind(payroll_id)
    .bind(PayrollStatus::Finalized.as_ref())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Payslip not available"))?;

    auth.require_access_to(row.employee_id)?;
    Ok(row.into())
}

#[utoipa::path(
    get,
    path = "/api/payslip/me",
    params(PayslipQuery),
    responses(
        (status = 200, description = "Own payslip", body = Payslip),
        (status = 404, description = "No finalized payroll for that month")
    ),
    tag = "Payslip",
    security(("bearer_auth" = []))
)]
pub async fn my_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayslipQuery>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;

    let row = match query.month.as_deref() {
        Some(raw) => {
            let month = parse_month(raw)?;
            sqlx::query_as::<_, PayslipRow>(&format!(
                "{PAYSLIP_SELECT} WHERE p.employee_id = ? AND p.month = ? AND p.status = ?"
            ))
            .bind(employee_id)
            .bind(month)
            .bind(PayrollStatus::Finalized.as_ref())
            .fetch_optional(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, PayslipRow>(&format!(
                "{PAYSLIP_SELECT} WHERE p.employee_id = ? AND p.status = ? ORDER BY p.month DESC LIMIT 1"
            ))
            .bind(employee_id)
            .bind(PayrollStatus::Finalized.as_ref())
            .fetch_optional(pool.get_ref())
            .await?
        }
    };

    let slip: Payslip = row
        .ok_or_else(|| ApiError::not_found("Payslip not available"))?
        .into();
    Ok(HttpResponse::Ok().json(slip))
}

#[utoipa::path(
    get,
    path = "/api/payslip/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payslip", body = Payslip),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payslip not available")
    ),
    tag = "Payslip",
    security(("bearer_auth" = []))
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let slip = payslip_by_id(&auth, pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(slip))
}

#[utoipa::path(
    get,
    path = "/api/payslip/{payroll_id}/download",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payslip as a text attachment", content_type = "text/plain"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payslip not available")
    ),
    tag = "Payslip",
    security(("bearer_auth" = []))
)]
pub async fn download_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let slip = payslip_by_id(&auth, pool.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.txt\"", slip.payslip_number),
        ))
        .body(render_text(&slip)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PayslipRow {
        PayslipRow {
            payroll_id: 9,
            employee_id: 3,
            month: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            employee_code: "EMP-003".into(),
            first_name: "Rina".into(),
            last_name: "Das".into(),
            department: Some("Finance".into()),
            job_title: None,
            working_days: 22.0,
            payable_days: 22.0,
            basic: 10_000.0,
            hra: 4_000.0,
            special_allowance: 1_000.0,
            other_allowance: 0.0,
            bonus: 0.0,
            gross: 15_000.0,
            pf: 1_200.0,
            esi: 112.5,
            professional_tax: 150.0,
            tds: 0.0,
            other_deductions: 0.0,
            total_deductions: 1_462.5,
            net_salary: 13_537.5,
        }
    }

    #[test]
    fn payslip_number_uses_month_and_code() {
        let month = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(payslip_number(month, "EMP-7"), "PS-202601-EMP-7");
    }

    #[test]
    fn row_maps_into_sections() {
        let slip: Payslip = row().into();
        assert_eq!(slip.payslip_number, "PS-202609-EMP-003");
        assert_eq!(slip.month, "2026-09");
        assert_eq!(slip.employee.name, "Rina Das");
        assert_eq!(slip.deductions.provident_fund, 1_200.0);
        assert_eq!(slip.net_salary, 13_537.5);
    }

    #[test]
    fn text_rendering_contains_totals() {
        let text = render_text(&row().into());
        assert!(text.starts_with("PAYSLIP PS-202609-EMP-003"));
        assert!(text.contains("Department: Finance"));
        assert!(!text.contains("Designation"));
        assert!(text.contains("13537.50"));
    }
}
