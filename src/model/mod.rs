pub mod attendance;
pub mod department;
pub mod employee;
pub mod expense;
pub mod holiday;
pub mod job_run;
pub mod job_title;
pub mod leave;
pub mod payroll;
pub mod performance;
pub mod role;
pub mod salary;
