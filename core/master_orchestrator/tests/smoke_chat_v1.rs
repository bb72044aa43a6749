use actix_web::{test, web, App};
use master_orchestrator::{api, config_service, db::FinanceDb, memory_service::MemoryService};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

#[actix_web::test]
async fn smoke_chat_v1_returns_well_formed_response() {
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

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api_ctx.clone()))
            .configure(|cfg| {
                api::configure_http(cfg, api_ctx.clone());
            }),
    )
    .await;

    let request_body = serde_json::json!({
        "user_id": "u1",
        "session_id": "s1",
        "message": "hello from integration test",
    });

    let req = test::TestRequest::post()
        .uri("/api/v1/chat")
        .set_json(&request_body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(
        resp.status().is_success(),
        "expected HTTP 200 from /api/v1/chat"
    );

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body.get("status").is_some(), "status field should be present");

    let correlation_id: Uuid = serde_json::from_value(body["correlation_id"].clone())
        .expect("correlation_id should deserialize as a UUID");
    assert_ne!(correlation_id, Uuid::nil());
}
