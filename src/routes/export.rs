use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};

use crate::domain::Subscriber;
use crate::error::ApiError;
use crate::schema::column_names;
use crate::store::SubscriberStore;

#[tracing::instrument(name = "Exporting subscribers as CSV", skip(store))]
pub async fn export_csv(store: web::Data<SubscriberStore>) -> Result<HttpResponse, ApiError> {
    let subscribers = store.all().await?;
    let body = render_csv(&subscribers)?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename("subscribers.csv".into())],
        })
        .body(body))
}

/// Header row plus one record per subscriber; missing values become empty cells.
pub fn render_csv(subscribers: &[Subscriber]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(column_names())?;
    for subscriber in subscribers {
        let subscribed_at = subscriber.subscribed_at.to_rfc3339();
        let unsubscribed_at = subscriber
            .unsubscribed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();
        writer.write_record([
            subscriber.email.as_str(),
            subscriber.source.as_deref().unwrap_or_default(),
            subscriber.user_agent.as_deref().unwrap_or_default(),
            subscriber.job_id.as_deref().unwrap_or_default(),
            subscribed_at.as_str(),
            unsubscribed_at.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
