use crate::{
    auth::{
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::{AdminCredentials, Config},
    model::user::User,
    models::{LoginReqDto, LoginResponse},
};
use actix_web::{HttpResponse, Responder, web};
use anyhow::{Context, anyhow};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

/// Login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Username or password missing", body = Object, example = json!({
            "error": "Username and password are required"
        })),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many login attempts"),
        (status = 500, description = "Internal server error")
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
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().json(json!({
            "error": "Username and password are required"
        }));
    }

    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    }

    let access_token = match generate_access_token(
        db_user.id,
        db_user.username.clone(),
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // Non-fatal: a stale last_login_at never blocks a login.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse { access_token })
}

/// Creates the configured admin account unless a user with that name exists.
pub async fn ensure_admin_user(pool: &MySqlPool, admin: &AdminCredentials) -> anyhow::Result<()> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&admin.username)
        .fetch_one(pool)
        .await
        .context("Failed to look up admin user")?;

    if existing > 0 {
        debug!(username = %admin.username, "Admin user already present");
        return Ok(());
    }

    let hashed = hash_password(&admin.password).map_err(|e| anyhow!("Failed to hash password: {e}"))?;

    sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(&admin.username)
        .bind(hashed)
        .execute(pool)
        .await
        .context("Failed to create admin user")?;

    info!(username = %admin.username, "Admin user created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};

    #[actix_web::test]
    async fn blank_credentials_are_rejected_before_any_query() {
        let config = Config::from_vars(|key| match key {
            "DATABASE_URL" => Some("mysql://root@localhost/attendance".to_string()),
            "JWT_SECRET" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = MySqlPool::connect_lazy(&config.database_url).unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(config))
                .route("/auth/login", web::post().to(login)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({"username": "  ", "password": "x"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
