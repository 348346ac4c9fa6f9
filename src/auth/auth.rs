use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, ApiError> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }

        let role = Role::from_id(claims.role).ok_or_else(|| ApiError::unauthorized("Invalid role"))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }

    fn from_header(req: &HttpRequest) -> Result<Self, ApiError> {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Missing token"))?;

        let config = req
            .app_data::<Data<Config>>()
            .ok_or(ApiError::Internal)?;

        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| ApiError::unauthorized("Invalid token"))?;

        Self::from_claims(claims)
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // The auth middleware has normally verified the token already.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(Self::from_header(req))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if self.role.is_approver() {
            Ok(())
        } else {
            Err(ApiError::forbidden("HR/Admin only"))
        }
    }

    /// Employee id of the caller, for self-service endpoints.
    pub fn require_employee_profile(&self) -> Result<u64, ApiError> {
        self.employee_id
            .ok_or_else(|| ApiError::forbidden("No employee profile"))
    }

    pub fn is_hr_or_admin(&self) -> bool {
        self.role.is_approver()
    }

    /// HR/Admin see everyone, everybody else only themselves.
    pub fn can_access_employee(&self, employee_id: u64) -> bool {
        self.is_hr_or_admin() || self.employee_id == Some(employee_id)
    }

    pub fn require_access_to(&self, employee_id: u64) -> Result<(), ApiError> {
        if self.can_access_employee(employee_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not allowed to access this employee"))
        }
    }

    /// A record assigned to a specific recipient may only be reviewed by
    /// that recipient or an admin; unassigned records by any HR/Admin.
    pub fn require_reviewer(&self, recipient_id: Option<u64>) -> Result<(), ApiError> {
        self.require_hr_or_admin()?;
        match recipient_id {
            Some(id) if id != self.user_id && self.role != Role::Admin => Err(
                ApiError::forbidden("This record is assigned to another approver"),
            ),
            _ => Ok(()),
        }
    }

    /// Returns true if the user is an employee
    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn user(role: Role, user_id: u64, employee_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("user{user_id}"),
            role,
            employee_id,
        }
    }

    #[test]
    fn employees_only_see_themselves() {
        let emp = user(Role::Employee, 10, Some(100));
        assert!(emp.is_employee());
        assert!(emp.can_access_employee(100));
        assert!(!emp.can_access_employee(101));
        assert!(emp.require_hr_or_admin().is_err());

        let hr = user(Role::Hr, 2, None);
        assert!(hr.can_access_employee(101));
        assert!(hr.require_employee_profile().is_err());
    }

    #[test]
    fn assigned_records_need_matching_reviewer() {
        let hr = user(Role::Hr, 2, None);
        let other_hr = user(Role::Hr, 3, None);
        let admin = user(Role::Admin, 1, None);

        assert!(hr.require_reviewer(Some(2)).is_ok());
        assert!(hr.require_reviewer(None).is_ok());
        assert!(other_hr.require_reviewer(Some(2)).is_err());
        assert!(admin.require_reviewer(Some(2)).is_ok());
        assert!(user(Role::Employee, 5, Some(1)).require_reviewer(None).is_err());
    }

    #[test]
    fn refresh_claims_are_not_a_session() {
        let claims = Claims {
            user_id: 1,
            sub: "a".into(),
            role: 1,
            exp: 0,
            jti: "x".into(),
            token_type: TokenType::Refresh,
            employee_id: None,
        };
        assert!(AuthUser::from_claims(claims).is_err());
    }
}
