use crate::{
    api::{attendance, attendance_status, dashboard, employee, statistics},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-peer-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

/// Malformed JSON and query strings answer 400 with the usual error body.
fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    );
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    extractor_config(cfg);

    // Public routes
    cfg.service(
        web::scope("/auth").service(
            web::resource("/login")
                .wrap(login_limiter)
                .route(web::post().to(handlers::login)),
        ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)))
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::get().to(employee::list_employees))
                            .route(web::post().to(employee::create_employee)),
                    )
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::deactivate_employee)),
                    )
                    // /employee/{id}/activate
                    .service(
                        web::resource("/{id}/activate")
                            .route(web::post().to(employee::activate_employee)),
                    ),
            )
            .service(
                web::scope("/status")
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance_status::list_statuses))
                            .route(web::post().to(attendance_status::create_status)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance_status::get_status))
                            .route(web::put().to(attendance_status::update_status))
                            .route(web::delete().to(attendance_status::delete_status)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::redirect_to_current_month)),
                    )
                    .service(
                        web::resource("/save").route(web::post().to(attendance::save_attendance)),
                    )
                    // /attendance/{year}/{month}?semana=N
                    .service(
                        web::resource("/{year}/{month}")
                            .route(web::get().to(attendance::attendance_grid)),
                    ),
            )
            .service(web::resource("/statistics").route(web::get().to(statistics::statistics))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};
    use serde_json::{Value, json};
    use sqlx::MySqlPool;
    use std::net::SocketAddr;

    fn test_config() -> Config {
        Config::from_vars(|key| match key {
            "DATABASE_URL" => Some("mysql://root@localhost/attendance".to_string()),
            "JWT_SECRET" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    macro_rules! test_app {
        () => {{
            let config = test_config();
            let pool = MySqlPool::connect_lazy(&config.database_url).unwrap();
            let routes_config = config.clone();
            actix_test::init_service(
                App::new()
                    .app_data(web::Data::new(pool))
                    .app_data(web::Data::new(config))
                    .configure(move |cfg| configure(cfg, routes_config)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let app = test_app!();

        for uri in ["/api/dashboard", "/api/employee", "/api/attendance/2024/2", "/api/statistics"] {
            let req = actix_test::TestRequest::get()
                .uri(uri)
                .peer_addr(peer())
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[actix_web::test]
    async fn garbage_token_is_rejected() {
        let app = test_app!();

        let req = actix_test::TestRequest::post()
            .uri("/api/attendance/save")
            .peer_addr(peer())
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .set_json(json!({"registros": []}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid or expired token");
    }

    #[actix_web::test]
    async fn malformed_login_body_answers_json_error() {
        let app = test_app!();

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr(peer())
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn valid_token_reaches_the_redirect() {
        let app = test_app!();
        let token = crate::auth::jwt::generate_access_token(1, "admin".to_string(), "secret", 60)
            .unwrap();

        let req = actix_test::TestRequest::get()
            .uri("/api/attendance")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FOUND);
    }
}
