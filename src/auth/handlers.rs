use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{MIN_PASSWORD_LEN, hash_password, verify_password},
        username_registry,
    },
    config::Config,
    error::{ApiError, ApiResult},
    model::role::Role,
    models::{ChangePasswordReq, LoginReqDto, RegisterReq, TokenPair, TokenType, UserSql},
};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn hash_or_internal(password: &str) -> ApiResult<String> {
    hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })
}

/// Issues an access/refresh pair and records the refresh jti.
async fn issue_tokens(
    subject: &TokenSubject,
    config: &Config,
    pool: &MySqlPool,
) -> ApiResult<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            ApiError::Internal
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                tracing::error!(error = %e, "Failed to sign refresh token");
                ApiError::Internal
            },
        )?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Bootstrap registration: creates the first admin while no users exist.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Administrator created"),
        (status = 400, description = "Invalid username or password"),
        (status = 403, description = "Registration closed"),
        (status = 409, description = "Username already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(username = %user.username))]
pub async fn register(user: web::Json<RegisterReq>, pool: web::Data<MySqlPool>) -> ApiResult {
    let username = username_registry::normalize(&user.username);

    if username.is_empty() || user.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Username is required and password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool.get_ref())
        .await?;
    if user_count > 0 {
        info!("Registration attempted after bootstrap");
        return Err(ApiError::forbidden(
            "Registration is closed; accounts are created by HR",
        ));
    }

    if !username_registry::is_available(&username, pool.get_ref()).await? {
        return Err(ApiError::conflict("Username already taken"));
    }

    let hashed = hash_or_internal(&user.password)?;

    sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(&username)
        .bind(hashed)
        .bind(Role::Admin.id())
        .execute(pool.get_ref())
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::conflict("Username already exists"),
            other => other,
        })?;

    username_registry::mark_taken(&username).await;
    info!("Bootstrap administrator registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "Administrator registered successfully"
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::bad_request("Username or password required"));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username_registry::normalize(&user.username))
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        ApiError::unauthorized("Invalid credentials")
    })?;

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused for deactivated account");
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username.clone(),
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };
    let tokens = issue_tokens(&subject, &config, pool.get_ref()).await?;

    // Non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, revoked or expired")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult {
    let token = bearer(&req).ok_or_else(|| ApiError::unauthorized("No token"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Refresh token required"));
    }

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT id, user_id
        FROM refresh_tokens
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let (record_id, user_id) =
        record.ok_or_else(|| ApiError::unauthorized("Refresh token revoked or expired"))?;

    // Role or employee link may have changed since the token was issued.
    let db_user = sqlx::query_as::<_, UserSql>(
        "SELECT id, username, password, role_id, employee_id, is_active FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .filter(|u| u.is_active)
    .ok_or_else(|| ApiError::unauthorized("Account is deactivated"))?;

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(record_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username,
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };
    let tokens = issue_tokens(&subject, &config, pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: u64,
    pub username: String,
    #[schema(example = "hr")]
    pub role: String,
    pub employee_id: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(MeResponse {
        user_id: auth.user_id,
        username: auth.username,
        role: auth.role.to_string(),
        employee_id: auth.employee_id,
    })
}

#[utoipa::path(
    put,
    path = "/api/me/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_change_password", skip_all, fields(user_id = auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ChangePasswordReq>,
) -> ApiResult {
    if body.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let current: String = sqlx::query_scalar("SELECT password FROM users WHERE id = ?")
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    verify_password(&body.current_password, &current)
        .map_err(|_| ApiError::unauthorized("Current password is incorrect"))?;

    let hashed = hash_or_internal(&body.new_password)?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    // Existing sessions must log in again with the new password.
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Password changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed" })))
}
