use crate::error::app_error::WRONG_ARGUMENTS_MESSAGE;
use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::{Header, Status};
use rocket::response::{self, Responder, Response};
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, catch};

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

fn error(message: &str) -> Json<Error> {
    Json(Error {
        message: message.to_string(),
    })
}

#[catch(400)]
pub fn bad_request(_: &Request) -> Json<Error> {
    error(WRONG_ARGUMENTS_MESSAGE)
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<Error> {
    error("Unauthorized")
}

#[catch(403)]
pub fn forbidden(_: &Request) -> Json<Error> {
    error("Forbidden")
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    error("Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<Error> {
    error("Conflict")
}

/// Rocket reports unparseable query values with 422; clients see a plain 400.
#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> (Status, Json<Error>) {
    (Status::BadRequest, error(WRONG_ARGUMENTS_MESSAGE))
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<Error> {
    error("Internal server error")
}

pub struct TooManyRequests {
    retry_after: Option<u64>,
    body: Json<Error>,
}

impl<'r> Responder<'r, 'static> for TooManyRequests {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut response = Response::build_from(self.body.respond_to(req)?);
        if let Some(seconds) = self.retry_after {
            response.header(Header::new("Retry-After", seconds.to_string()));
        }
        response.ok()
    }
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    TooManyRequests {
        retry_after: req.local_cache(|| None::<RateLimitRetryAfter>).as_ref().map(|r| r.0),
        body: error("Too many requests"),
    }
}
