pub mod attendance;
pub mod employee;
pub mod expense;
pub mod holiday;
pub mod jobs;
pub mod leave_balance;
pub mod leave_request;
pub mod org;
pub mod payroll;
pub mod payslip;
pub mod performance;

use sqlx::MySql;

use crate::error::{ApiError, ApiResult};
use crate::model::role::Role;

/// A recipient must be an active HR or admin user.
pub(crate) async fn validate_recipient<'c, E>(executor: E, recipient_id: Option<u64>) -> ApiResult<()>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let Some(id) = recipient_id else {
        return Ok(());
    };

    let role_id = sqlx::query_scalar::<_, u8>("SELECT role_id FROM users WHERE id = ? AND is_active = 1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::bad_request("recipient_id does not match an active user"))?;

    match Role::from_id(role_id) {
        Some(role) if role.is_approver() => Ok(()),
        _ => Err(ApiError::bad_request("recipient must be an HR or admin user")),
    }
}

/// Trims optional free text, treating blank as absent.
pub(crate) fn optional_text(raw: &Option<String>, max_len: usize) -> ApiResult<Option<String>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > max_len => Err(ApiError::bad_request(format!(
            "text fields are limited to {max_len} characters"
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_text_trims_and_limits() {
        assert_eq!(optional_text(&None, 10).unwrap(), None);
        assert_eq!(optional_text(&Some("   ".into()), 10).unwrap(), None);
        assert_eq!(optional_text(&Some(" hi ".into()), 10).unwrap(), Some("hi".into()));
        assert!(optional_text(&Some("x".repeat(11)), 10).is_err());
    }

    #[test]
    fn optional_text_limit_counts_characters() {
        // 200 characters, 400 bytes
        let reason = "é".repeat(200);
        assert_eq!(optional_text(&Some(reason.clone()), 200).unwrap(), Some(reason));
        assert!(optional_text(&Some("é".repeat(201)), 200).is_err());
    }
}
