use rocket::data::{ByteUnit, Data, FromData, Outcome};
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::{Json, serde_json};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::RequestBody;
use rocket_okapi::request::OpenApiFromData;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::ops::Deref;
use tracing::warn;

/// JSON request body that rejects anything it cannot parse with 400.
///
/// Unlike Rocket's built-in `Json`, type mismatches are not reported as 422;
/// every malformed payload is a plain validation failure, and the reason is
/// logged with the position serde stopped at.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T> Deref for JsonBody<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T: DeserializeOwned> FromData<'r> for JsonBody<T> {
    type Error = serde_json::Error;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> Outcome<'r, Self> {
        let limit = req.limits().get("json").unwrap_or(ByteUnit::Mebibyte(1));

        let bytes = match data.open(limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                warn!(method = %req.method(), uri = %req.uri(), "JSON payload exceeded size limit");
                return Outcome::Error((
                    Status::PayloadTooLarge,
                    serde_json::Error::io(std::io::Error::other("payload too large")),
                ));
            }
            Err(e) => {
                warn!(method = %req.method(), uri = %req.uri(), error = %e, "Failed to read request body");
                return Outcome::Error((Status::BadRequest, serde_json::Error::io(e)));
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Outcome::Success(JsonBody(value)),
            Err(e) => {
                // Bodies may carry patient identifiers, so only the error position is logged.
                warn!(
                    method = %req.method(),
                    uri = %req.uri(),
                    error_message = %e,
                    error_line = e.line(),
                    error_column = e.column(),
                    error_category = ?e.classify(),
                    "Failed to parse JSON request body"
                );

                Outcome::Error((Status::BadRequest, e))
            }
        }
    }
}

impl<'r, T: DeserializeOwned + JsonSchema> OpenApiFromData<'r> for JsonBody<T> {
    fn request_body(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<RequestBody> {
        <Json<T> as OpenApiFromData<'r>>::request_body(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::local::asynchronous::Client;
    use rocket::{post, routes};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        value: u8,
    }

    #[post("/probe", data = "<payload>")]
    fn probe(payload: JsonBody<Probe>) -> String {
        payload.value.to_string()
    }

    #[rocket::async_test]
    async fn type_mismatch_is_bad_request() {
        let client = Client::tracked(rocket::build().mount("/", routes![probe])).await.expect("valid rocket instance");

        let response = client.post("/probe").body(r#"{"value": "seven"}"#).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn valid_payload_is_parsed() {
        let client = Client::tracked(rocket::build().mount("/", routes![probe])).await.expect("valid rocket instance");

        let response = client.post("/probe").body(r#"{"value": 7}"#).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.as_deref(), Some("7"));
    }
}
