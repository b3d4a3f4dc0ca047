use std::net::TcpListener;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::http::header;
use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use crate::configuration::Config;
use crate::error::ApiError;
use crate::mirror::{GcsObjectStore, Mirror};
use crate::routes::{code, export_csv, health_check, list_subscribers, schema, subscribe};
use crate::store::{get_connection_pool, SubscriberStore};

/// Identifier of the running deployment, written to every row and mirror object.
#[derive(Debug, Clone)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct Application {
    port: u16,
    server: Server,
    store: SubscriberStore,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, anyhow::Error> {
        let store = SubscriberStore::new(get_connection_pool(&config.database)?);
        let mirror = build_mirror(&config)?;
        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            store.clone(),
            mirror,
            DeploymentId::new(config.application.job_id.clone()),
            config.application.cors_origins(),
        )?;
        Ok(Self {
            port,
            server,
            store,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves until shutdown, then closes the connection pool.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        let outcome = self.server.await;
        self.store.close().await;
        outcome
    }
}

fn build_mirror(config: &Config) -> Result<Option<Mirror>, anyhow::Error> {
    let Some(bucket) = config.mirror.bucket()? else {
        return Ok(None);
    };
    let object_store = GcsObjectStore::new(
        &config.mirror.base_url,
        bucket.to_string(),
        config.mirror.token_url.clone(),
        config.mirror.timeout(),
    )?;
    let mirror = Mirror::new(Arc::new(object_store), &config.application.job_id);
    tracing::info!(bucket, object = mirror.object_key(), "Mirroring subscribe events");
    Ok(Some(mirror))
}

pub fn run(
    listener: TcpListener,
    store: SubscriberStore,
    mirror: Option<Mirror>,
    deployment: DeploymentId,
    cors_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    let store = web::Data::new(store);
    let mirror = web::Data::new(mirror);
    let deployment = web::Data::new(deployment);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors_policy(&cors_origins))
            .wrap(TracingLogger::default())
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _| ApiError::Validation(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _| ApiError::Validation(err.to_string()).into()),
            )
            .route("/health", web::get().to(health_check))
            .route("/schema", web::get().to(schema))
            .route("/data", web::get().to(list_subscribers))
            .route("/export.csv", web::get().to(export_csv))
            .route("/code", web::get().to(code))
            .route("/subscribe", web::post().to(subscribe))
            .app_data(store.clone())
            .app_data(mirror.clone())
            .app_data(deployment.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

fn cors_policy(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(["GET", "POST", "OPTIONS"])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_any_header();
    if origins.iter().any(|origin| origin == "*") {
        cors.allow_any_origin()
    } else {
        origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}
