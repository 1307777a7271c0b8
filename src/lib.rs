mod auth;
mod config;
mod cron_tasks;
mod database;
mod db;
mod encryption;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use cron_tasks::purge_expired_sessions;

use crate::db::stage_db;
use crate::encryption::stage_encryption;
use crate::middleware::RequestLogger;
use crate::middleware::rate_limit::RateLimiter;
use crate::routes as app_routes;
use crate::service::news::stage_news;
use rocket::{Build, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub(crate) fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g. RUST_LOG=info,myopia_registry::service=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // A subscriber may already be installed (tests build many instances).
    let _ = if json_format { subscriber.json().try_init() } else { subscriber.try_init() };
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: [Method::Get, Method::Post, Method::Put, Method::Delete, Method::Patch, Method::Options]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept", "X-Forwarded-For"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }
    if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{}", trimmed) }
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

impl RouteSpec {
    fn new(path: &'static str, (routes, openapi): (Vec<rocket::Route>, rocket_okapi::okapi::openapi3::OpenApi)) -> Self {
        RouteSpec { path, routes, openapi }
    }
}

fn collect_route_specs() -> Vec<RouteSpec> {
    vec![
        RouteSpec::new("/auth", app_routes::auth::routes()),
        RouteSpec::new("/healthcare_professional", app_routes::healthcare_professional::routes()),
        RouteSpec::new("/hospital", app_routes::hospital::routes()),
        RouteSpec::new("/patient", app_routes::patient::routes()),
        RouteSpec::new("/measurement", app_routes::measurement::routes()),
        RouteSpec::new("/patient_treatment", app_routes::patient_treatment::routes()),
        RouteSpec::new("/patient_k", app_routes::patient_k::routes()),
        RouteSpec::new("/user", app_routes::user::routes()),
        RouteSpec::new("/static", app_routes::lookup::routes()),
        RouteSpec::new("/growth_data", app_routes::lookup::growth_data_routes()),
        RouteSpec::new("/news", app_routes::news::routes()),
        RouteSpec::new("", app_routes::track::routes()),
        RouteSpec::new("/health", app_routes::health::routes()),
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Rocket<Build> {
    let mut openapi_list = Vec::new();
    for spec in collect_route_specs() {
        rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
        openapi_list.push((spec.path, spec.openapi));
    }

    if enable_swagger {
        let openapi_docs = match marge_spec_list(&openapi_list) {
            Ok(docs) => docs,
            Err(err) => panic!("Could not merge OpenAPI spec: {}", err),
        };

        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);
        rocket = rocket.mount(
            format!("{}/docs", base_path),
            make_swagger_ui(&SwaggerUIConfig {
                url: format!("{}/openapi.json", base_path),
                ..Default::default()
            }),
        );
    }

    rocket
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);

    let cors = build_cors(&config.cors).to_cors().expect("Failed to create CORS fairing");
    let base_path = normalize_base_path(&config.api.base_path);
    let http = build_http_client();

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let rocket = rocket::custom(figment)
        .manage(RateLimiter::new(config.rate_limit))
        .attach(cors)
        .attach(RequestLogger)
        .attach(stage_db(config.database))
        .attach(stage_encryption(config.encryption, http.clone()))
        .attach(stage_news(config.news, http.clone()))
        .manage(config.session)
        .manage(config.oauth)
        .manage(config.tracking)
        .manage(http);

    mount_api_routes(rocket, &base_path, config.api.enable_swagger).register(
        base_path.as_str(),
        catchers![
            app_routes::error::bad_request,
            app_routes::error::unauthorized,
            app_routes::error::forbidden,
            app_routes::error::not_found,
            app_routes::error::conflict,
            app_routes::error::unprocessable_entity,
            app_routes::error::too_many_requests,
            app_routes::error::internal_error
        ],
    )
}
