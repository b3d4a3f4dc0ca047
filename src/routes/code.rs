use actix_web::HttpResponse;
use serde_json::json;

const FILES: [&str; 3] = ["src/main.rs", "Cargo.toml", "configuration/base.yaml"];

pub async fn code() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "files": FILES }))
}
