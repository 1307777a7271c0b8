pub mod rate_limit;

use crate::service::tracking::client_ip;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{info, warn};
use uuid::Uuid;

/// Correlation id for one request, echoed back as `X-Request-Id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    /// The id assigned by [`RequestLogger`], or `unknown` outside a logged request.
    pub fn of(request: &Request<'_>) -> String {
        request
            .local_cache(|| None::<RequestId>)
            .as_ref()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Assigns request ids, logs each request and its outcome, and sets the
/// security headers every response carries.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let request_id = RequestId::new();
        request.local_cache(|| Some(request_id.clone()));

        // Query strings are left out; patient lookups may carry identifiers there.
        info!(
            request_id = %request_id.0,
            method = %request.method(),
            path = %request.uri().path(),
            "incoming request"
        );
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let request_id = RequestId::of(request);
        let status = response.status();

        response.set_header(Header::new("X-Request-Id", request_id.clone()));
        response.set_header(Header::new("X-Content-Type-Options", "nosniff"));
        response.set_header(Header::new("X-Frame-Options", "DENY"));
        response.set_header(Header::new("Cache-Control", "no-store"));

        if status.class().is_client_error() || status.class().is_server_error() {
            warn!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                status = status.code,
                "request failed"
            );
        } else {
            info!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                status = status.code,
                "request completed"
            );
        }
    }
}

/// The raw `User-Agent` header, if any.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        Outcome::Success(UserAgent(req.headers().get_one("User-Agent").map(str::to_string)))
    }
}

impl<'a> OpenApiFromRequest<'a> for UserAgent {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

/// The visitor's address: first `X-Forwarded-For` hop, else the socket peer,
/// else `unknown`.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let remote = req.client_ip().map(|ip| ip.to_string());
        Outcome::Success(ClientIp(client_ip(req.headers().get_one("X-Forwarded-For"), remote)))
    }
}

impl<'a> OpenApiFromRequest<'a> for ClientIp {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
