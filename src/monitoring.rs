//! In-process request metrics.
//!
//! `RequestMetrics` times every request, tags the response with an
//! `X-Process-Time` header (seconds) and feeds a shared [`PerformanceMonitor`],
//! which keeps the most recent durations per `"<METHOD> <route pattern>"` key.
//! Requests that match no route share a single `"<METHOD> unmatched"` key.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use serde::{Deserialize, Serialize};

/// Durations kept per endpoint; older samples are dropped first.
pub const MAX_SAMPLES_PER_ENDPOINT: usize = 1000;
const SLOWEST_ENDPOINTS: usize = 10;
const SLOW_REQUEST: Duration = Duration::from_secs(1);
const UNMATCHED: &str = "unmatched";

#[derive(Default)]
struct EndpointSamples {
    durations: VecDeque<f64>,
    errors: u64,
}

struct MonitorState {
    endpoints: HashMap<String, EndpointSamples>,
    started_at: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub requests: usize,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub total_requests: usize,
    pub total_errors: u64,
    /// Slowest endpoints by average time, at most ten.
    pub endpoints: Vec<EndpointStats>,
}

pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                endpoints: HashMap::new(),
                started_at: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // Metrics stay usable even if a recording thread panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records one request. Status codes of 400 and above count as errors.
    pub fn record(&self, endpoint: &str, duration: Duration, status: u16) {
        let mut state = self.lock();
        let samples = state.endpoints.entry(endpoint.to_string()).or_default();
        samples.durations.push_back(duration.as_secs_f64());
        if samples.durations.len() > MAX_SAMPLES_PER_ENDPOINT {
            samples.durations.pop_front();
        }
        if status >= 400 {
            samples.errors += 1;
        }
    }

    pub fn endpoint_stats(&self, endpoint: &str) -> Option<EndpointStats> {
        let state = self.lock();
        state
            .endpoints
            .get(endpoint)
            .and_then(|samples| summarize(endpoint, samples))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();

        let mut endpoints: Vec<EndpointStats> = state
            .endpoints
            .iter()
            .filter_map(|(endpoint, samples)| summarize(endpoint, samples))
            .collect();
        endpoints.sort_by(|a, b| b.avg_time.total_cmp(&a.avg_time));
        endpoints.truncate(SLOWEST_ENDPOINTS);

        MetricsSnapshot {
            uptime_seconds: state.started_at.elapsed().as_secs_f64(),
            total_requests: state.endpoints.values().map(|s| s.durations.len()).sum(),
            total_errors: state.endpoints.values().map(|s| s.errors).sum(),
            endpoints,
        }
    }

    /// Clears all samples and restarts the uptime clock.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.endpoints.clear();
        state.started_at = Instant::now();
    }
}

fn summarize(endpoint: &str, samples: &EndpointSamples) -> Option<EndpointStats> {
    if samples.durations.is_empty() {
        return None;
    }
    let requests = samples.durations.len();
    let sum: f64 = samples.durations.iter().sum();
    let min_time = samples.durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max_time = samples.durations.iter().copied().fold(0.0, f64::max);

    Some(EndpointStats {
        endpoint: endpoint.to_string(),
        requests,
        avg_time: sum / requests as f64,
        min_time,
        max_time,
        errors: samples.errors,
    })
}

/// Middleware that times requests and reports them to a [`PerformanceMonitor`].
///
/// Errors raised by inner middleware are recorded with their status code and passed
/// through untouched; only successful responses carry `X-Process-Time`.
pub struct RequestMetrics {
    monitor: Arc<PerformanceMonitor>,
}

impl RequestMetrics {
    pub fn new(monitor: Arc<PerformanceMonitor>) -> Self {
        Self { monitor }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RequestMetricsService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestMetricsService {
            service: Rc::new(service),
            monitor: self.monitor.clone(),
        }))
    }
}

pub struct RequestMetricsService<S> {
    service: Rc<S>,
    monitor: Arc<PerformanceMonitor>,
}

impl<S, B> Service<ServiceRequest> for RequestMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let monitor = self.monitor.clone();
        let endpoint = format!(
            "{} {}",
            req.method(),
            req.match_pattern().as_deref().unwrap_or(UNMATCHED)
        );
        let started = Instant::now();

        log::debug!("Request: {} {}", req.method(), req.path());

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = started.elapsed();

            let (result, status) = match result {
                Ok(res) => {
                    let mut res = res.map_into_boxed_body();
                    let seconds = format!("{:.6}", elapsed.as_secs_f64());
                    if let Ok(value) = HeaderValue::from_str(&seconds) {
                        res.headers_mut()
                            .insert(HeaderName::from_static("x-process-time"), value);
                    }
                    let status = res.status();
                    (Ok(res), status)
                }
                Err(err) => {
                    let status = err.as_response_error().status_code();
                    (Err(err), status)
                }
            };
            let status = status.as_u16();
            monitor.record(&endpoint, elapsed, status);

            log::info!(
                "Response: {} - Status: {} - Time: {:.4}s",
                endpoint,
                status,
                elapsed.as_secs_f64()
            );
            if elapsed > SLOW_REQUEST {
                log::warn!(
                    "Slow request detected: {} took {:.4}s",
                    endpoint,
                    elapsed.as_secs_f64()
                );
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::routes;
    use crate::state::AppState;
    use crate::store::Stores;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App, HttpResponse};
    use uuid::Uuid;

    #[::core::prelude::v1::test]
    fn test_samples_are_bounded() {
        let monitor = PerformanceMonitor::new();
        for _ in 0..(MAX_SAMPLES_PER_ENDPOINT + 250) {
            monitor.record("GET /tasks", Duration::from_millis(5), 200);
        }
        let stats = monitor.endpoint_stats("GET /tasks").unwrap();
        assert_eq!(stats.requests, MAX_SAMPLES_PER_ENDPOINT);
    }

    #[::core::prelude::v1::test]
    fn test_snapshot_orders_slowest_first_and_caps_at_ten() {
        let monitor = PerformanceMonitor::new();
        for i in 0..15u64 {
            monitor.record(&format!("GET /e{}", i), Duration::from_millis(i + 1), 200);
        }
        monitor.record("GET /e0", Duration::from_millis(1), 404);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_requests, 16);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.endpoints.len(), 10);
        assert_eq!(snapshot.endpoints[0].endpoint, "GET /e14");

        monitor.reset();
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert!(snapshot.endpoints.is_empty());
    }

    #[actix_web::test]
    async fn test_middleware_records_and_tags_responses() {
        let monitor = Arc::new(PerformanceMonitor::new());
        let app = test::init_service(
            App::new()
                .wrap(RequestMetrics::new(monitor.clone()))
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert!(resp.headers().contains_key("x-process-time"));
        assert_eq!(monitor.endpoint_stats("GET /ping").unwrap().requests, 1);
    }

    #[actix_web::test]
    async fn test_full_route_table_is_keyed_by_pattern() {
        let state = web::Data::new(AppState::new(
            &Config::new("memory://", "metrics-secret"),
            Stores::memory(),
        ));
        let monitor = state.monitor.clone();
        let app = test::init_service(
            App::new()
                .app_data(state)
                .wrap(RequestMetrics::new(monitor.clone()))
                .configure(routes::config),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-process-time"));

        for _ in 0..5 {
            let req = test::TestRequest::get()
                .uri(&format!("/api/v1/tasks/{}", Uuid::new_v4()))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        for path in ["/wp-admin", "/.env", "/api/v1/nothing-here"] {
            let req = test::TestRequest::get().uri(path).to_request();
            test::call_service(&app, req).await;
        }

        let tasks = monitor.endpoint_stats("GET /api/v1/tasks/{id}").unwrap();
        assert_eq!(tasks.requests, 5);
        assert_eq!(tasks.errors, 5);
        assert_eq!(monitor.endpoint_stats("GET unmatched").unwrap().requests, 3);
        assert_eq!(monitor.endpoint_stats("GET /health").unwrap().requests, 1);
        assert_eq!(monitor.snapshot().endpoints.len(), 3);
    }

    #[actix_web::test]
    async fn test_inner_errors_pass_through_and_count() {
        let monitor = Arc::new(PerformanceMonitor::new());
        let app = test::init_service(
            App::new()
                .wrap_fn(|_req, _srv| async {
                    let err = AppError::InactiveUser("Inactive user".into());
                    Err::<ServiceResponse, Error>(err.into())
                })
                .wrap(RequestMetrics::new(monitor.clone()))
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping").to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::FORBIDDEN);

        let stats = monitor.endpoint_stats("GET /ping").unwrap();
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.errors, 1);
    }
}
