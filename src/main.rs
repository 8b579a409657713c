// src/main.rs

use chrono::Utc;
use dotenvy::dotenv;
use lumina::config::Config;
use lumina::db;
use lumina::routes;
use lumina::state::AppState;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env().expect("JWT_SECRET must be set");

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match db::connect(&config.database_url).await {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to open database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    db::MIGRATOR
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(pool, config);

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind listening address");
    tracing::info!("Listening on {}", addr);

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

async fn seed_admin_user(pool: &SqlitePool, config: &Config) -> Result<(), sqlx::Error> {
    if let (Some(name), Some(email)) = (&config.admin_name, &config.admin_email) {
        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, role, created_at)
            VALUES (?, ?, 'admin', ?)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(email.to_lowercase())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!("Seeded admin user: {}", email);
        }
    }
    Ok(())
}
