//! Per-caller request budgets.
//!
//! Every handler takes a [`RateLimit`] or [`AuthRateLimit`] guard first. A
//! request is charged to its caller's peer address and, when it carries a
//! bearer token, to that session as well. Counting is a fixed window per
//! (caller, route class); a request refused by either caller is not charged.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::auth::parse_bearer_token;
use crate::config::RateLimitConfig;
use crate::middleware::RequestId;
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

/// Which budget a route draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RouteClass {
    /// Lookups, patient reads, news, stats.
    Read,
    /// Anything that writes registry data.
    Mutation,
    /// Login and account creation.
    Credential,
}

impl RouteClass {
    fn of(method: Method, credential_route: bool) -> Self {
        if credential_route {
            return RouteClass::Credential;
        }
        match method {
            Method::Get | Method::Head | Method::Options => RouteClass::Read,
            _ => RouteClass::Mutation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Caller {
    Peer(String),
    /// SHA-256 of the bearer token.
    Session(String),
}

impl Caller {
    fn from_bearer(authorization: Option<&str>) -> Option<Self> {
        let token = authorization.and_then(parse_bearer_token)?;
        Some(Caller::Session(hex::encode(Sha256::digest(token.as_bytes()))))
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

impl Window {
    /// Time left before the window reopens, if `limit` is already spent.
    fn exhausted(&self, now: Instant, period: Duration, limit: u32) -> Option<Duration> {
        let age = now.duration_since(self.opened);
        if age >= period || self.used < limit {
            return None;
        }
        Some(period - age)
    }

    fn charge(&mut self, now: Instant, period: Duration) {
        if now.duration_since(self.opened) >= period {
            *self = Window { opened: now, used: 0 };
        }
        self.used += 1;
    }
}

#[derive(Debug)]
struct Ledger {
    windows: HashMap<(Caller, RouteClass), Window>,
    last_sweep: Instant,
}

/// Shared budget table, managed as Rocket state.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    config: RateLimitConfig,
    period: Duration,
    sweep_every: Duration,
    ledger: Mutex<Ledger>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let period = Duration::from_secs(config.window_seconds.max(1));
        let sweep_every = Duration::from_secs(config.cleanup_interval_seconds.max(1));
        Self {
            config,
            period,
            sweep_every,
            ledger: Mutex::new(Ledger {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    fn limit(&self, class: RouteClass) -> u32 {
        match class {
            RouteClass::Read => self.config.read_limit,
            RouteClass::Mutation => self.config.mutation_limit,
            RouteClass::Credential => self.config.auth_limit,
        }
    }

    /// Charges one request to every caller, or to none of them when any
    /// caller is out of budget. The error carries the longest wait.
    async fn admit(&self, callers: &[Caller], class: RouteClass) -> Result<(), Duration> {
        let now = Instant::now();
        let limit = self.limit(class);
        let mut ledger = self.ledger.lock().await;

        if now.duration_since(ledger.last_sweep) >= self.sweep_every {
            let period = self.period;
            ledger.windows.retain(|_, window| now.duration_since(window.opened) < period);
            ledger.last_sweep = now;
        }

        let wait = callers
            .iter()
            .filter_map(|caller| ledger.windows.get(&(caller.clone(), class)))
            .filter_map(|window| window.exhausted(now, self.period, limit))
            .max();
        if let Some(wait) = wait {
            return Err(wait);
        }
        if limit == 0 {
            return Err(self.period);
        }

        for caller in callers {
            ledger
                .windows
                .entry((caller.clone(), class))
                .or_insert(Window { opened: now, used: 0 })
                .charge(now, self.period);
        }
        Ok(())
    }
}

/// Seconds the 429 catcher reports in `Retry-After`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RateLimitError {
    TooManyRequests,
    MissingClientIp,
}

/// Budget guard. `CREDENTIAL` routes share the login budget; all others are
/// classed by method.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Throttle<const CREDENTIAL: bool>;

pub(crate) type RateLimit = Throttle<false>;
pub(crate) type AuthRateLimit = Throttle<true>;

#[rocket::async_trait]
impl<'r, const CREDENTIAL: bool> FromRequest<'r> for Throttle<CREDENTIAL> {
    type Error = RateLimitError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(limiter) = request.rocket().state::<RateLimiter>() else {
            return Outcome::Success(Throttle);
        };

        let mut callers = Vec::with_capacity(2);
        match request.client_ip() {
            Some(ip) => callers.push(Caller::Peer(ip.to_string())),
            None if limiter.config.require_client_ip => {
                warn!(request_id = %RequestId::of(request), path = %request.uri().path(), "refusing request without peer address");
                return Outcome::Error((Status::BadRequest, RateLimitError::MissingClientIp));
            }
            None => callers.push(Caller::Peer("unknown".to_string())),
        }
        callers.extend(Caller::from_bearer(request.headers().get_one("Authorization")));

        let class = RouteClass::of(request.method(), CREDENTIAL);
        match limiter.admit(&callers, class).await {
            Ok(()) => Outcome::Success(Throttle),
            Err(wait) => {
                let seconds = wait.as_secs().max(1);
                request.local_cache(|| Some(RateLimitRetryAfter(seconds)));
                warn!(
                    request_id = %RequestId::of(request),
                    path = %request.uri().path(),
                    class = ?class,
                    retry_after_secs = seconds,
                    "rate limit exceeded"
                );
                Outcome::Error((Status::TooManyRequests, RateLimitError::TooManyRequests))
            }
        }
    }
}

impl<'a, const CREDENTIAL: bool> OpenApiFromRequest<'a> for Throttle<CREDENTIAL> {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "429".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Too Many Requests".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
