use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::domain::Subscriber;
use crate::error::ApiError;
use crate::store::SubscriberStore;

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Serialize)]
pub struct SubscriberPage {
    pub rows: Vec<Subscriber>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[tracing::instrument(name = "Listing subscribers", skip(store))]
pub async fn list_subscribers(
    paging: web::Query<Paging>,
    store: web::Data<SubscriberStore>,
) -> Result<HttpResponse, ApiError> {
    let Paging { limit, offset } = paging.into_inner();
    let (rows, total) = store.page(limit.into(), offset.into()).await?;
    Ok(HttpResponse::Ok().json(SubscriberPage {
        rows,
        total,
        limit,
        offset,
    }))
}
