use axum::{Extension, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

mod analyzer_client;
mod converter_client;
mod db;
mod handlers;
mod llm_client;
mod middleware;
mod models;
mod services;
mod store;
mod telegram_client;
mod tz;

use analyzer_client::AnalyzerClient;
use converter_client::ConverterClient;
use llm_client::{LlmClient, LlmGateway};
use services::{ChatService, UserService};
use store::postgres::PgStore;
use store::Store;
use telegram_client::TelegramClient;
use tz::TzService;

pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub chat_service: ChatService,
    pub user_service: UserService,
    pub tz_service: TzService,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_logging().expect("failed to initialize logging");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool_size = env_or("DATABASE_POOL_SIZE", "10").parse().unwrap_or(10);

    let db_pool = db::create_pool(&database_url, pool_size)
        .await
        .expect("failed to create database pool");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool.clone()));

    let llm_mocked = env_flag("LLM_MOCKED");
    let llm_base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| {
        if !llm_mocked {
            tracing::warn!("LLM_BASE_URL not set, using http://localhost:8000");
        }
        "http://localhost:8000".to_string()
    });
    if llm_mocked {
        tracing::warn!("LLM_MOCKED is set, chat replies will be canned");
    }
    let llm: Arc<dyn LlmGateway> = Arc::new(LlmClient::new(llm_base_url, llm_mocked));

    let converter_url = std::env::var("CONVERTER_URL").unwrap_or_else(|_| {
        tracing::warn!("CONVERTER_URL not set, using http://localhost:8001");
        "http://localhost:8001".to_string()
    });
    let analyzer_url = std::env::var("ANALYZER_URL").unwrap_or_else(|_| {
        tracing::warn!("ANALYZER_URL not set, using http://localhost:8002");
        "http://localhost:8002".to_string()
    });

    let telegram = match (
        std::env::var("TELEGRAM_BOT_TOKEN").ok(),
        std::env::var("TELEGRAM_CHAT_ID")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok()),
    ) {
        (Some(token), Some(chat_id)) if !token.is_empty() => {
            tracing::info!("telegram report delivery enabled");
            Some(TelegramClient::new(token, chat_id))
        }
        _ => {
            tracing::warn!(
                "TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not configured, report delivery disabled"
            );
            None
        }
    };

    let finish_prompt = env_or("FINISH_CHAT_PROMPT", "Завершить чат");
    let daily_limit = env_or("DAILY_LIMIT_DEFAULT", "100").parse().unwrap_or(100);
    let reset_offset_hours: i64 = env_or("RESET_UTC_OFFSET_HOURS", "3").parse().unwrap_or(3);

    let chat_service = ChatService::new(store.clone(), llm, finish_prompt);
    let user_service = UserService::new(store.clone(), daily_limit);
    let tz_service = TzService::new(
        ConverterClient::new(converter_url),
        AnalyzerClient::new(analyzer_url).with_cache(store.clone()),
        telegram,
    );

    let shared_state = Arc::new(AppState {
        db_pool,
        chat_service,
        user_service,
        tz_service,
    });

    let app = Router::new()
        .merge(handlers::user::user_routes())
        .merge(handlers::chat::chat_routes())
        .merge(handlers::tz::tz_routes())
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state.clone()));

    // Quotas refill at local midnight; the offset stands in for a timezone.
    let reset_state = shared_state.clone();
    tokio::spawn(async move {
        loop {
            let wait = duration_until_next_reset(reset_offset_hours);
            tracing::info!(seconds = wait.as_secs(), "next daily quota reset scheduled");
            tokio::time::sleep(wait).await;

            match reset_state.user_service.reset_daily_limits().await {
                Ok(users) => tracing::info!(users, "daily message quotas reset"),
                Err(e) => tracing::error!("daily quota reset failed: {}", e),
            }
        }
    });

    let port = env_or("PORT", "3000");
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("failed to bind listener");
    tracing::info!(
        "listening on {}",
        listener.local_addr().expect("listener has a local address")
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let default_filter = if cfg!(debug_assertions) {
        "debug,repair_copilot=debug,sqlx=info,reqwest=info,hyper=info,tower=info"
    } else {
        "info,repair_copilot=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("repair copilot starting up");
    tracing::info!("version: {}", env!("CARGO_PKG_VERSION"));

    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn duration_until_next_reset(offset_hours: i64) -> Duration {
    use chrono::{Duration as ChronoDuration, FixedOffset, Utc};

    let clamped = offset_hours.clamp(-23, 23) as i32;
    let offset = FixedOffset::east_opt(clamped * 3600).expect("offset within valid range");

    let now = Utc::now().with_timezone(&offset);
    let next_midnight = (now.date_naive() + ChronoDuration::days(1)).and_hms_opt(0, 0, 0);

    let wait_seconds = next_midnight
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|next| (next.with_timezone(&Utc) - Utc::now()).num_seconds())
        .unwrap_or(24 * 3600);

    Duration::from_secs(wait_seconds.max(1) as u64)
}

async fn api_status(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Json<serde_json::Value> {
    let db_status = match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    axum::response::Json(serde_json::json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_status,
    }))
}
