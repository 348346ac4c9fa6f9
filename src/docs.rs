use crate::api::attendance::{
    AttendanceListResponse, AttendanceRequest, AttendanceSummary,
};
use crate::api::employee::{
    CreateEmployee, CreateLogin, EmployeeListResponse, SalaryInput, TerminateEmployee,
};
use crate::api::expense::{
    CreateExpense, ExpenseDetail, ExpenseItemInput, ExpenseListResponse, ReviewExpense,
};
use crate::api::holiday::CreateHoliday;
use crate::api::jobs::RunJobRequest;
use crate::api::leave_balance::AdjustBalance;
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse, RejectLeave};
use crate::api::org::CreateNamed;
use crate::api::payroll::{
    CreatePayroll, PaginatedPayrollResponse, PayrollQuery, PayrollRunOutcome, RunPayroll,
    UpdatePayroll,
};
use crate::api::payslip::{Payslip, PayslipDeductions, PayslipEarnings, PayslipEmployee};
use crate::api::performance::{
    CreateFeedback, CreateGoal, CreateTask, PerformanceSummary, UpdateGoal, UpdateTask,
};
use crate::auth::handlers::MeResponse;
use crate::model::attendance::Attendance;
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::expense::{ExpenseCategory, TravelExpense, TravelExpenseItem};
use crate::model::holiday::Holiday;
use crate::model::job_run::JobRun;
use crate::model::job_title::JobTitle;
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveType};
use crate::model::payroll::Payroll;
use crate::model::performance::{Feedback, Goal, GoalStatus, GoalTask, TaskStatus};
use crate::model::salary::SalaryStructure;
use crate::models::{ChangePasswordReq, LoginReqDto, RegisterReq, TokenPair};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the `bearer_auth` scheme referenced by every protected path.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM System API",
        version = "1.0.0",
        description = r#"
## Human Resource Management (HRM) System

This API powers a **Human Resource Management (HRM)** system for a single organisation.

### 🔹 Key Features
- **Employee Management**
  - Profiles, salary structures, optional login accounts, termination
- **Attendance Management**
  - Daily check-in/check-out, regularization requests and approvals, monthly summaries
- **Leave Management**
  - Requests with working-day counting, approvals, cancellation, yearly balances
- **Payroll Management**
  - Monthly payroll from salary, attendance and unpaid leave; finalization and payslips
- **Travel Expenses**
  - Itemised claims with approval and reimbursement
- **Performance**
  - Goals, tasks, feedback and per-period summaries
- **Recurring Jobs**
  - Monthly leave allocation, payroll aggregation and daily cleanup, each run once per period

### 🔐 Security
Protected endpoints use **JWT Bearer authentication** with short-lived access tokens
and rotating refresh tokens. Roles: `admin`, `hr`, `employee`, `system`, `api_user`.

### 📦 Response Format
- JSON-based RESTful responses, errors as `{"error": "..."}`
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::change_password,

        crate::api::org::list_departments,
        crate::api::org::create_department,
        crate::api::org::list_job_titles,
        crate::api::org::create_job_title,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_my_profile,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::terminate_employee,
        crate::api::employee::get_salary,
        crate::api::employee::put_salary,

        crate::api::holiday::list_holidays,
        crate::api::holiday::create_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::request_attendance,
        crate::api::attendance::my_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::pending_attendance,
        crate::api::attendance::approve_attendance,
        crate::api::attendance::reject_attendance,
        crate::api::attendance::attendance_summary,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_balance::my_balance,
        crate::api::leave_balance::employee_balance,
        crate::api::leave_balance::adjust_balance,

        crate::api::payroll::create_payroll,
        crate::api::payroll::run_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::finalize_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::payslip::my_payslip,
        crate::api::payslip::get_payslip,
        crate::api::payslip::download_payslip,

        crate::api::expense::create_expense,
        crate::api::expense::my_expenses,
        crate::api::expense::list_expenses,
        crate::api::expense::get_expense,
        crate::api::expense::approve_expense,
        crate::api::expense::reject_expense,
        crate::api::expense::reimburse_expense,
        crate::api::expense::delete_expense,

        crate::api::performance::create_goal,
        crate::api::performance::list_goals,
        crate::api::performance::update_goal,
        crate::api::performance::delete_goal,
        crate::api::performance::create_task,
        crate::api::performance::list_tasks,
        crate::api::performance::update_task,
        crate::api::performance::create_feedback,
        crate::api::performance::list_feedback,
        crate::api::performance::performance_summary,

        crate::api::jobs::list_runs,
        crate::api::jobs::run_now
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenPair,
            ChangePasswordReq,
            MeResponse,
            CreateNamed,
            Department,
            JobTitle,
            CreateLogin,
            SalaryInput,
            CreateEmployee,
            TerminateEmployee,
            Employee,
            EmployeeListResponse,
            SalaryStructure,
            CreateHoliday,
            Holiday,
            Attendance,
            AttendanceRequest,
            AttendanceListResponse,
            AttendanceSummary,
            CreateLeave,
            RejectLeave,
            LeaveFilter,
            LeaveRequest,
            LeaveType,
            LeaveListResponse,
            LeaveBalance,
            AdjustBalance,
            CreatePayroll,
            RunPayroll,
            UpdatePayroll,
            PayrollQuery,
            Payroll,
            PaginatedPayrollResponse,
            PayrollRunOutcome,
            Payslip,
            PayslipEmployee,
            PayslipEarnings,
            PayslipDeductions,
            ExpenseItemInput,
            CreateExpense,
            ReviewExpense,
            TravelExpense,
            TravelExpenseItem,
            ExpenseCategory,
            ExpenseDetail,
            ExpenseListResponse,
            CreateGoal,
            UpdateGoal,
            CreateTask,
            UpdateTask,
            CreateFeedback,
            Goal,
            GoalStatus,
            GoalTask,
            TaskStatus,
            Feedback,
            PerformanceSummary,
            JobRun,
            RunJobRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and account APIs"),
        (name = "Organisation", description = "Departments and job titles"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Holiday", description = "Holiday calendar APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Payslip", description = "Payslip views and downloads"),
        (name = "Travel Expense", description = "Travel expense claims"),
        (name = "Performance", description = "Goals, tasks and feedback"),
        (name = "Jobs", description = "Recurring job ledger and manual runs"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_protected_paths_with_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/leave/{leave_id}/approve"));
        assert!(doc.paths.paths.contains_key("/api/payslip/{payroll_id}/download"));
        assert!(doc.paths.paths.contains_key("/auth/login"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        for name in ["Employee", "Attendance", "Payroll", "TravelExpense", "LeaveType"] {
            assert!(components.schemas.contains_key(name), "missing schema {name}");
        }
    }
}
