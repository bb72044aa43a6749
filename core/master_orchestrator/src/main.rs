use actix_cors::Cors;
use actix_web::{http::header, middleware::DefaultHeaders, web, App, HttpServer};
use std::env;
use std::sync::Arc;

use master_orchestrator::api::{self, ApiContext};
use master_orchestrator::db::FinanceDb;
use master_orchestrator::memory_service::MemoryService;
use master_orchestrator::{config_service, redis_service};

/// Build the Actix HTTP server for the orchestrator, wiring in the chat/health
/// API. This function does not start the server; the caller is responsible
/// for awaiting the returned `Server` and coordinating shutdown.
fn run_http_server(api_ctx: ApiContext, bind_addr: &str) -> std::io::Result<actix_web::dev::Server> {
    let ctx = api_ctx.clone();

    let server = HttpServer::new(move || {
        let cors = if ctx.app_env == "prod" {
            Cors::default()
                .allowed_origin("https://finance-orchestrator.example.com")
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .supports_credentials()
                .max_age(3600)
        } else {
            Cors::default()
                .allowed_origin("http://localhost:8282")
                .allowed_origin("http://127.0.0.1:8282")
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .supports_credentials()
                .max_age(3600)
        };

        let csp_value = "default-src 'self'; \
script-src 'self'; \
connect-src 'self' http://127.0.0.1:8282 http://localhost:8282; \
img-src 'self' data:; \
style-src 'self' 'unsafe-inline'; \
frame-ancestors 'none';";

        let security_headers = DefaultHeaders::new()
            .add(("X-Frame-Options", "DENY"))
            .add(("X-Content-Type-Options", "nosniff"))
            .add(("Referrer-Policy", "no-referrer"))
            .add(("Content-Security-Policy", csp_value));

        let api_ctx_clone = ctx.clone();

        App::new()
            .app_data(web::Data::new(api_ctx_clone.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(10 * 1024 * 1024)
                    .error_handler(|err, _req| {
                        let error_msg = format!("JSON payload error: {}", err);
                        tracing::warn!("JSON payload error: {}", error_msg);
                        actix_web::error::InternalError::from_response(
                            err,
                            actix_web::HttpResponse::BadRequest().json(serde_json::json!({
                                "error": "Invalid JSON payload",
                                "details": error_msg,
                            })),
                        )
                        .into()
                    }),
            )
            .configure(|cfg| api::configure_http(cfg, api_ctx_clone.clone()))
            .wrap(security_headers)
            .wrap(cors)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    platform::init_tracing("master_orchestrator").expect("failed to init tracing");

    let metrics_addr = env::var("METRICS_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
    match metrics_addr.parse() {
        Ok(addr) => {
            if let Err(e) = platform::init_metrics(addr) {
                eprintln!(
                    "[WARN] Failed to initialize metrics exporter on {}: {}",
                    metrics_addr, e
                );
            } else {
                println!("[INFO] Metrics exporter listening on {}", metrics_addr);
            }
        }
        Err(e) => {
            eprintln!(
                "[WARN] Invalid METRICS_ADDR '{}': {} (metrics exporter disabled)",
                metrics_addr, e
            );
        }
    }

    println!("Master Orchestrator starting...");

    let current_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("[FATAL] Failed to determine current directory: {}", e);
            return Ok(());
        }
    };

    let mut project_root = current_dir.clone();
    if project_root.join("data/config.toml").exists() {
        // already at the root
    } else if project_root.join("../data/config.toml").exists() {
        project_root = project_root.join("..").canonicalize().unwrap_or(project_root);
    } else if project_root.join("../../data/config.toml").exists() {
        project_root = project_root.join("../..").canonicalize().unwrap_or(project_root);
    }

    let config_path = project_root.join("data/config.toml");
    let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
    println!("APP_ENV={}", app_env);

    let config_path_str = match config_path.to_str() {
        Some(s) => s,
        None => {
            eprintln!("[FATAL] Config path contains invalid Unicode");
            return Ok(());
        }
    };

    let app_config = match config_service::load_app_config_with_env(config_path_str, &app_env) {
        Ok(config) => {
            println!("Configuration loaded successfully (env={}).", app_env);
            println!("Default LLM provider: {}", config.llm.default_provider);

            if config.llm.default_provider == "openrouter" {
                match &config.llm.openrouter {
                    Some(p) => {
                        let key_ok = p
                            .api_key
                            .as_ref()
                            .map(|k| !k.trim().is_empty())
                            .unwrap_or(false);
                        if !key_ok {
                            eprintln!(
                                "[FATAL] OPENROUTER_API_KEY is missing or empty for default provider=openrouter"
                            );
                            return Ok(());
                        }
                    }
                    None => {
                        eprintln!(
                            "[FATAL] llm.openrouter config is missing while default_provider=openrouter"
                        );
                        return Ok(());
                    }
                }
            }

            Arc::new(config)
        }
        Err(e) => {
            eprintln!("[FATAL] Failed to load configuration: {}", e);
            return Ok(());
        }
    };

    if let Some(redis_config) = &app_config.redis {
        if let Err(e) = redis_service::initialize_redis(Some(redis_config)) {
            eprintln!("[WARN] Failed to initialize Redis cache: {}", e);
            println!("[INFO] Continuing without Redis caching");
        } else {
            println!("[INFO] Redis cache initialized: {}", redis_config.url);
        }
    } else {
        println!("[INFO] Redis configuration not found, caching disabled");
        if let Err(e) = redis_service::initialize_redis(None) {
            eprintln!("[WARN] Error marking Redis as disabled: {}", e);
        }
    }

    let data_dir = config_path.parent().unwrap_or(&current_dir);
    let memory_db_path = data_dir.join("orchestrator_memory.db");
    let finance_db_path = data_dir.join("finance.db");

    let memory_db_path_str = match memory_db_path.to_str() {
        Some(s) => s,
        None => {
            eprintln!("[FATAL] Memory database path contains invalid Unicode");
            return Ok(());
        }
    };
    let finance_db_path_str = match finance_db_path.to_str() {
        Some(s) => s,
        None => {
            eprintln!("[FATAL] Finance database path contains invalid Unicode");
            return Ok(());
        }
    };

    let memory_service = match MemoryService::new(memory_db_path_str) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("[FATAL] Failed to initialize memory service: {}", e);
            return Ok(());
        }
    };
    if let Err(e) = memory_service.init_memory_store().await {
        eprintln!("[FATAL] Failed to initialize memory store schema: {}", e);
        return Ok(());
    }
    println!("Memory store initialized ({}).", memory_db_path.display());

    let finance_db = match FinanceDb::new(finance_db_path_str) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("[FATAL] Failed to initialize finance database: {}", e);
            return Ok(());
        }
    };
    println!("Finance database connected ({}).", finance_db_path.display());

    const BIND_ADDRESS: &str = "127.0.0.1:8282";
    println!("Starting API server on: {}", BIND_ADDRESS);

    let jwt_auth = match env::var("JWT_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => {
            println!("[INFO] Initializing JWT authentication");
            Some(Arc::new(api::auth::JwtAuth::new(secret.as_bytes())))
        }
        Ok(_) => {
            println!("[WARN] JWT_SECRET is empty, authentication will be disabled");
            None
        }
        Err(_) => {
            println!("[WARN] JWT_SECRET not set, authentication will be disabled");
            None
        }
    };

    let rate_limit_requests = match env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
    {
        Some(r) if r > 0 => r,
        _ => 100,
    };
    let requests = std::num::NonZeroU32::new(rate_limit_requests)
        .unwrap_or_else(|| std::num::NonZeroU32::new(100).expect("100 is a valid non-zero value"));
    let window_secs = env::var("RATE_LIMIT_WINDOW")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60);

    let rate_limit_config = api::rate_limit::RateLimitConfig {
        requests,
        window_secs,
    };
    println!(
        "[INFO] Rate limiting configured: {} requests per {} seconds",
        rate_limit_config.requests, rate_limit_config.window_secs
    );

    let api_ctx = ApiContext {
        memory_service: memory_service.clone(),
        db: finance_db,
        app_config: app_config.clone(),
        jwt_auth,
        rate_limit_config,
        app_env: app_env.clone(),
    };

    let server = run_http_server(api_ctx, BIND_ADDRESS)?;
    let handle = server.handle();

    let shutdown_fut = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("[WARN] Failed to install CTRL+C handler: {}", e);
            return;
        }
        println!("[INFO] Received CTRL+C, initiating graceful shutdown...");
        handle.stop(true).await;
    };

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                eprintln!("[ERROR] HTTP server error: {}", e);
            }
        }
        _ = shutdown_fut => {
            println!("[INFO] Shutdown signal handled.");
        }
    }

    Ok(())
}
