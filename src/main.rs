use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpResponse, HttpServer};
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod models;
mod openapi;
mod rate_limit;
mod repo;
mod routes;
mod search;
mod security;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use openapi::ApiDoc;
use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
use repo::inmem::InMemRepo;
use routes::{config, AppState};
use security::SecurityHeaders;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

async fn render_metrics(handle: web::Data<PrometheusHandle>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(handle.render())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping lost & found server");

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        info!("Using Postgres repository backend");
        crate::repo::pg::PgRepo::new(pool)
    };

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let rate_limiter = {
        let enabled = std::env::var("RL_ENABLED")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        RateLimiterFacade::new(InMemoryRateLimiter::new(enabled), RateLimitConfig::from_env())
    };

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontends (Vite + containerized nginx)
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .route("/metrics", web::get().to(render_metrics))
            .app_data(web::Data::new(metrics_handle.clone()))
            .app_data(web::Data::new(AppState {
                repo: Arc::new(repo.clone()),
                rate_limiter: Some(rate_limiter.clone()),
            }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let required = vec!["JWT_SECRET"];

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }
}
