use actix_web::HttpResponse;
use serde_json::json;

use crate::schema::SUBSCRIBER_COLUMNS;

pub async fn schema() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "columns": SUBSCRIBER_COLUMNS }))
}
