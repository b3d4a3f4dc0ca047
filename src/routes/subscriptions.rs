use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{NewSubscriber, SubscribeRequest};
use crate::error::ApiError;
use crate::mirror::{Mirror, SubscriptionEvent};
use crate::startup::DeploymentId;
use crate::store::SubscriberStore;

#[tracing::instrument(
    name = "Adding a new subscriber",
    skip(payload, request, store, mirror, deployment),
    fields(
        request_id = %Uuid::new_v4(),
        subscriber_email = %payload.email,
    )
)]
pub async fn subscribe(
    payload: web::Json<SubscribeRequest>,
    request: HttpRequest,
    store: web::Data<SubscriberStore>,
    mirror: web::Data<Option<Mirror>>,
    deployment: web::Data<DeploymentId>,
) -> Result<HttpResponse, ApiError> {
    let new_subscriber =
        NewSubscriber::from_request(payload.into_inner(), request.headers(), Utc::now())
            .map_err(ApiError::Validation)?;
    store.upsert(&new_subscriber, deployment.as_str()).await?;
    tracing::info!(email_norm = %new_subscriber.email.normalized(), "Subscriber stored");

    if let Some(mirror) = mirror.get_ref() {
        let event = SubscriptionEvent::new(&new_subscriber, deployment.as_str());
        if let Err(e) = mirror.append(&event).await {
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                object = mirror.object_key(),
                "Mirror write failed, the subscriber is stored but not mirrored"
            );
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
