pub mod calendar;
pub mod db_utils;
pub mod leave_rules;
pub mod payroll_calc;
