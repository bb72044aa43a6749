use actix_web::{test, web, App};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use master_orchestrator::{api, config_service, db::FinanceDb, memory_service::MemoryService};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_test_app() -> impl actix_web::dev::Service<
    actix_web::dev::Request,
    Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
    Error = actix_web::Error,
> {
    let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let project_root = manifest_dir.parent().unwrap().parent().unwrap();
    let config_path = project_root.join("data/config.toml");
    let config_path_str = config_path.to_str().expect("valid config path");

    let app_config = config_service::load_app_config_with_env(config_path_str, "dev")
        .expect("config should load for dev");
    let app_config = Arc::new(app_config);

    let temp_dir = TempDir::new().expect("temp dir");
    let memory_db_path = temp_dir.path().join("memory.db");
    let finance_db_path = temp_dir.path().join("finance.db");

    let memory_service = Arc::new(
        MemoryService::new(memory_db_path.to_str().expect("memory db path utf8"))
            .expect("memory service should initialize"),
    );
    memory_service
        .init_memory_store()
        .await
        .expect("init_memory_store should succeed");

    let finance_db = FinanceDb::new(finance_db_path.to_str().expect("finance db path utf8"))
        .expect("finance db should initialize");

    let api_ctx = api::ApiContext {
        memory_service: memory_service.clone(),
        db: finance_db,
        app_config: app_config.clone(),
        jwt_auth: None,
        rate_limit_config: api::rate_limit::RateLimitConfig::default(),
        app_env: "dev".to_string(),
    };

    test::init_service(
        App::new()
            .app_data(web::Data::new(api_ctx.clone()))
            .configure(|cfg| {
                api::configure_http(cfg, api_ctx.clone());
            }),
    )
    .await
}

fn chat_api_benchmarks(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("chat_api");
    group.sample_size(50);
    group.measurement_time(std::time::Duration::from_secs(30));

    let message_sizes = vec![10, 100, 1000];

    for size in message_sizes {
        group.bench_with_input(BenchmarkId::new("message_size", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                let app = setup_test_app().await;

                let message = "x".repeat(size);
                let request = serde_json::json!({
                    "user_id": "bench-user",
                    "session_id": "bench-session",
                    "message": message,
                });

                let req = test::TestRequest::post()
                    .uri("/api/v1/chat")
                    .set_json(&request)
                    .to_request();

                test::call_service(&app, req).await
            });
        });
    }

    let concurrent_counts = vec![1, 5, 10];

    for count in concurrent_counts {
        group.bench_with_input(
            BenchmarkId::new("concurrent_requests", count),
            &count,
            |b, &count| {
                b.to_async(&rt).iter(|| async {
                    let app = setup_test_app().await;

                    let futures = (0..count).map(|_| {
                        let request = serde_json::json!({
                            "user_id": "bench-user",
                            "session_id": "bench-session",
                            "message": "benchmark test",
                        });

                        let req = test::TestRequest::post()
                            .uri("/api/v1/chat")
                            .set_json(&request)
                            .to_request();

                        test::call_service(&app, req)
                    });

                    futures_util::future::join_all(futures).await
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, chat_api_benchmarks);
criterion_main!(benches);
