//! Per-client rate limiting.
//!
//! Every request counts against a general per-minute quota keyed by client address.
//! Requests to the credential endpoints also count against a much smaller auth quota.

use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};

use crate::error::AppError;

pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Endpoints guarded by the auth quota.
const AUTH_LIMITED_PATHS: &[&str] = &[
    "/api/v1/auth/login",
    "/api/v1/auth/register",
    "/api/v1/auth/password-reset/request",
    "/api/v1/auth/password-reset/confirm",
    "/api/v1/auth/resend-verification",
];

fn per_minute(requests: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN))
}

/// Shared limiter state; clone it into every worker's middleware.
#[derive(Clone)]
pub struct RateLimits {
    general: Arc<KeyedLimiter>,
    auth: Arc<KeyedLimiter>,
    clock: DefaultClock,
}

impl RateLimits {
    pub fn new(general_per_minute: u32, auth_per_minute: u32) -> Self {
        Self {
            general: Arc::new(RateLimiter::keyed(per_minute(general_per_minute))),
            auth: Arc::new(RateLimiter::keyed(per_minute(auth_per_minute))),
            clock: DefaultClock::default(),
        }
    }

    fn check_one(&self, limiter: &KeyedLimiter, key: &String) -> Result<(), AppError> {
        limiter.check_key(key).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            AppError::TooManyRequests {
                retry_after: wait.as_secs().max(1),
            }
        })
    }

    /// Counts one request from `client` to `path`.
    pub fn check(&self, client: &str, path: &str) -> Result<(), AppError> {
        let key = client.to_string();
        if AUTH_LIMITED_PATHS.contains(&path) {
            self.check_one(&self.auth, &key)?;
        }
        self.check_one(&self.general, &key)
    }

    /// Drops state for clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.general.retain_recent();
        self.auth.retain_recent();
    }
}

/// Clients are keyed by the socket peer's IP. Forwarding headers are client
/// controlled and never consulted.
fn client_key(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub struct RateLimit {
    limits: RateLimits,
}

impl RateLimit {
    pub fn new(limits: RateLimits) -> Self {
        Self { limits }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limits: self.limits.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limits: RateLimits,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let client = client_key(&req);

        if let Err(err) = self.limits.check(&client, req.path()) {
            log::warn!("Rate limit exceeded for {} on {}", client, req.path());
            let res = req.into_response(err.error_response());
            return Box::pin(ready(Ok(res.map_into_right_body())));
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
    }
}
