mod admin;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod lifecycle;

use std::sync::Arc;

use tracing::info;

use actix_web::{
    App,
    HttpServer,
    middleware::Logger
};

use actix_web::web::{self};

use haven::auth::TokenIssuer;
use haven::clock::SystemClock;
use haven::logger::LoggerHandle;
use haven::payment::{HostedCheckout, WebhookSigner};
use haven::tls::load_server_config;

use crate::admin::AdminBootstrap;
use crate::config::ServerConfig;
use crate::lifecycle::Lifecycle;

pub fn configure_routes() -> impl actix_web::dev::HttpServiceFactory {
    web::scope("")
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/incidents", web::post().to(handlers::intake))
                .route("/incidents", web::get().to(handlers::risk_queue))
                .route("/incidents/{id}/escalate", web::post().to(handlers::escalate))
                .route("/incidents/{id}/case", web::post().to(handlers::open_case))
                .route("/cases", web::get().to(handlers::list_cases))
                .route("/cases/{id}/close", web::post().to(handlers::close_case))
                .route("/cases/{id}/sessions", web::get().to(handlers::list_sessions))
                .route("/cases/{id}/sessions", web::post().to(handlers::create_session))
                .route("/sessions/{id}", web::put().to(handlers::update_session))
                .route("/sessions/{id}", web::delete().to(handlers::delete_session))
                .route("/sessions/{id}/complete", web::post().to(handlers::complete_session))
                .route("/sessions/{id}/reminder", web::post().to(handlers::payment_reminder))
                .route("/sessions/{id}/progress", web::put().to(handlers::save_progress))
                .route("/payments/checkout", web::post().to(handlers::checkout))
                .route("/payments/webhook", web::post().to(handlers::payment_webhook))
                .route("/payments/incidents/{id}", web::get().to(handlers::payment_status))
                .route("/payments/sessions/{id}", web::get().to(handlers::session_payment_status))
                .route("/guardian/alerts", web::get().to(handlers::guardian_alerts))
                .route("/guardian/alerts/{id}/read", web::post().to(handlers::read_guardian_alert))
                .route("/reviewer/alerts", web::get().to(handlers::reviewer_alerts))
                .route("/reviewer/alerts/{id}/read", web::post().to(handlers::read_reviewer_alert))
                .route("/group_sessions", web::get().to(handlers::list_group_sessions))
                .route("/group_sessions", web::post().to(handlers::create_group_session))
                .route("/group_sessions/{id}", web::put().to(handlers::update_group_session))
                .route("/group_sessions/{id}", web::delete().to(handlers::delete_group_session))
                .route("/group_sessions/{id}/complete", web::post().to(handlers::complete_group_session))
                .route("/group_sessions/{id}/attendance", web::post().to(handlers::record_attendance))
                .service(
                    web::scope("/admin")
                        .route("/issue_token", web::post().to(handlers::admin_issue_token))
                        .route("/guardian_links", web::post().to(handlers::admin_link_guardian))
                        .route("/overview", web::get().to(handlers::admin_overview))
                        .route("/audit", web::get().to(handlers::admin_audit))
                )
        )
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut _guard = None;

    if std::env::var("SERVER_LOG").unwrap_or_default() == "true" {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            "./logs",
            "haven-server.log"
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::writer::MakeWriterExt::and(non_blocking, std::io::stdout))
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();

        _guard = Some(guard);
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stdout)
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();
    }

    let config = ServerConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    if config.admin_bootstrap_key.is_empty() {
        tracing::warn!("ADMIN_BOOTSTRAP_KEY not set, token issuing is disabled");
    }

    // Initialize SQLite database
    let db_pool = db::init::init_db(&config.database_url)
        .map_err(|e| std::io::Error::other(format!("Failed to initialize database: {}", e)))?;

    db::init::run_migrations(&db_pool, &config.policy)
        .map_err(|e| std::io::Error::other(format!("Failed to run database migrations: {}", e)))?;

    tracing::info!("✅ Database initialized at {}", config.database_url);

    let checkout = HostedCheckout::new(
        &config.checkout_base_url,
        &config.webhook_secret,
        LoggerHandle::tracing("checkout"),
    )
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let lifecycle = web::Data::new(Lifecycle::new(
        db_pool,
        config.policy.clone(),
        Arc::new(SystemClock),
        Arc::new(checkout),
    ));
    info!(
        "Lifecycle policy: {} open cases per psychologist, emergency fee {}",
        lifecycle.policy().max_open_cases,
        haven::policy::format_amount(lifecycle.policy().emergency_fee_cents, &lifecycle.policy().currency)
    );

    let tokens = web::Data::new(TokenIssuer::new(
        config.jwt_secret.clone(),
        config.token_ttl_secs,
        LoggerHandle::tracing("tokens"),
    ));
    let signer = web::Data::new(WebhookSigner::new(&config.webhook_secret));
    let bootstrap = web::Data::new(AdminBootstrap::new(config.admin_bootstrap_key.clone()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(lifecycle.clone())
            .app_data(tokens.clone())
            .app_data(signer.clone())
            .app_data(bootstrap.clone())
            .wrap(Logger::default())
            .service(configure_routes())
    });

    if config.use_tls {
        info!("Server starting with TLS on https://{}/", config.bind_addr);

        let tls_config = load_server_config(&config.tls_cert, &config.tls_key)
            .map_err(|e| std::io::Error::other(format!("Cannot load TLS material: {}", e)))?;

        server
            .bind_rustls_0_23(config.bind_addr.as_str(), tls_config)?
            .run()
            .await
    } else {
        info!("Server starting on http://{}/", config.bind_addr);

        server
            .bind(config.bind_addr.as_str())?
            .run()
            .await
    }
}
