use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::startup::DeploymentId;

/// Liveness only: never touches the database.
pub async fn health_check(deployment: web::Data<DeploymentId>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "job_id": deployment.as_str() }))
}
