use crate::{
    api::{
        attendance, employee, expense, holiday, jobs, leave_balance, leave_request, org, payroll,
        payslip, performance,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = (60_000 / burst as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(web::resource("/me/password").route(web::put().to(handlers::change_password)))
            .service(
                web::resource("/department")
                    .route(web::get().to(org::list_departments))
                    .route(web::post().to(org::create_department)),
            )
            .service(
                web::resource("/job-title")
                    .route(web::get().to(org::list_job_titles))
                    .route(web::post().to(org::create_job_title)),
            )
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employee/me must precede /employee/{id}
                    .service(web::resource("/me").route(web::get().to(employee::get_my_profile)))
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{id}/terminate")
                            .route(web::put().to(employee::terminate_employee)),
                    )
                    .service(
                        web::resource("/{id}/salary")
                            .route(web::get().to(employee::get_salary))
                            .route(web::put().to(employee::put_salary)),
                    ),
            )
            .service(
                web::scope("/holiday")
                    .service(
                        web::resource("")
                            .route(web::get().to(holiday::list_holidays))
                            .route(web::post().to(holiday::create_holiday)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(holiday::delete_holiday))),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(web::resource("/check-in").route(web::post().to(attendance::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(attendance::check_out)))
                    .service(
                        web::resource("/request").route(web::post().to(attendance::request_attendance)),
                    )
                    .service(web::resource("/me").route(web::get().to(attendance::my_attendance)))
                    .service(
                        web::resource("/pending").route(web::get().to(attendance::pending_attendance)),
                    )
                    .service(
                        web::resource("/summary").route(web::get().to(attendance::attendance_summary)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(attendance::approve_attendance)),
                    )
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(attendance::reject_attendance)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(web::resource("/me").route(web::get().to(leave_request::my_leaves)))
                    .service(
                        web::resource("/balance/me").route(web::get().to(leave_balance::my_balance)),
                    )
                    .service(
                        web::resource("/balance/{employee_id}")
                            .route(web::get().to(leave_balance::employee_balance))
                            .route(web::put().to(leave_balance::adjust_balance)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(
                        web::resource("")
                            .route(web::post().to(payroll::create_payroll))
                            .route(web::get().to(payroll::list_payrolls)),
                    )
                    .service(web::resource("/run").route(web::post().to(payroll::run_payroll)))
                    // /payroll/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(payroll::get_payroll))
                            .route(web::put().to(payroll::update_payroll)),
                    )
                    .service(
                        web::resource("/{id}/finalize")
                            .route(web::put().to(payroll::finalize_payroll)),
                    ),
            )
            .service(
                web::scope("/payslip")
                    .service(web::resource("/me").route(web::get().to(payslip::my_payslip)))
                    .service(web::resource("/{id}").route(web::get().to(payslip::get_payslip)))
                    .service(
                        web::resource("/{id}/download").route(web::get().to(payslip::download_payslip)),
                    ),
            )
            .service(
                web::scope("/travel-expense")
                    .service(
                        web::resource("")
                            .route(web::post().to(expense::create_expense))
                            .route(web::get().to(expense::list_expenses)),
                    )
                    .service(web::resource("/me").route(web::get().to(expense::my_expenses)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(expense::get_expense))
                            .route(web::delete().to(expense::delete_expense)),
                    )
                    .service(web::resource("/{id}/approve").route(web::put().to(expense::approve_expense)))
                    .service(web::resource("/{id}/reject").route(web::put().to(expense::reject_expense)))
                    .service(
                        web::resource("/{id}/reimburse").route(web::put().to(expense::reimburse_expense)),
                    ),
            )
            .service(
                web::scope("/performance")
                    .service(
                        web::resource("/goals")
                            .route(web::get().to(performance::list_goals))
                            .route(web::post().to(performance::create_goal)),
                    )
                    .service(
                        web::resource("/goals/{id}")
                            .route(web::put().to(performance::update_goal))
                            .route(web::delete().to(performance::delete_goal)),
                    )
                    .service(
                        web::resource("/goals/{id}/tasks")
                            .route(web::get().to(performance::list_tasks))
                            .route(web::post().to(performance::create_task)),
                    )
                    .service(web::resource("/tasks/{id}").route(web::put().to(performance::update_task)))
                    .service(
                        web::resource("/feedback")
                            .route(web::get().to(performance::list_feedback))
                            .route(web::post().to(performance::create_feedback)),
                    )
                    .service(
                        web::resource("/summary/{employee_id}")
                            .route(web::get().to(performance::performance_summary)),
                    ),
            )
            .service(
                web::scope("/jobs")
                    .service(web::resource("/runs").route(web::get().to(jobs::list_runs)))
                    .service(web::resource("/{name}/run").route(web::post().to(jobs::run_now))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_refresh_token};
    use actix_web::{App, http::StatusCode, test, web::Data};
    use sqlx::mysql::MySqlPoolOptions;

    fn app_config() -> Config {
        Config::for_tests()
    }

    fn lazy_pool(config: &Config) -> sqlx::MySqlPool {
        // never connects unless a handler touches the database
        MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("valid database url")
    }

    #[actix_web::test]
    async fn protected_routes_need_a_bearer_token() {
        let config = app_config();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool(&config)))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/employee")
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[actix_web::test]
    async fn refresh_tokens_are_not_access_tokens() {
        let config = app_config();
        let subject = TokenSubject {
            user_id: 1,
            username: "admin".into(),
            role: 1,
            employee_id: None,
        };
        let (refresh, _) =
            generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool(&config)))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/me")
            .peer_addr("127.0.0.1:40001".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn employees_cannot_list_payroll() {
        let config = app_config();
        let subject = TokenSubject {
            user_id: 7,
            username: "emp".into(),
            role: 3,
            employee_id: Some(70),
        };
        let access = crate::auth::jwt::generate_access_token(
            &subject,
            &config.jwt_secret,
            config.access_token_ttl,
        )
        .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool(&config)))
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, config.clone())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/payroll")
            .peer_addr("127.0.0.1:40002".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
