//! Prometheus 指标

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use skindex_core::{Result, SkindexError};
use std::time::Instant;

use crate::state::AppState;

/// API指标收集器
#[derive(Debug)]
pub struct ApiMetrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration: HistogramVec,
    login_attempts_total: IntCounterVec,
    images_uploaded_total: IntCounter,
    upload_size_bytes: Histogram,
}

fn metric_error(e: prometheus::Error) -> SkindexError {
    SkindexError::Internal(format!("Metrics registration failed: {}", e))
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("skindex_http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status"],
        )
        .map_err(metric_error)?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "skindex_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "route"],
        )
        .map_err(metric_error)?;

        let login_attempts_total = IntCounterVec::new(
            Opts::new("skindex_login_attempts_total", "Login attempts by outcome"),
            &["outcome"],
        )
        .map_err(metric_error)?;

        let images_uploaded_total =
            IntCounter::with_opts(Opts::new("skindex_images_uploaded_total", "Uploaded images"))
                .map_err(metric_error)?;

        let upload_size_bytes = Histogram::with_opts(
            HistogramOpts::new("skindex_upload_size_bytes", "Uploaded image size in bytes")
                .buckets(prometheus::exponential_buckets(16_384.0, 4.0, 6).map_err(metric_error)?),
        )
        .map_err(metric_error)?;

        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(http_request_duration.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(login_attempts_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(images_uploaded_total.clone()))
            .map_err(metric_error)?;
        registry
            .register(Box::new(upload_size_bytes.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            login_attempts_total,
            images_uploaded_total,
            upload_size_bytes,
        })
    }

    pub fn observe_request(&self, method: &str, route: &str, status: u16, seconds: f64) {
        self.http_requests_total
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, route])
            .observe(seconds);
    }

    pub fn record_login(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.login_attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_upload(&self, bytes: usize) {
        self.images_uploaded_total.inc();
        self.upload_size_bytes.observe(bytes as f64);
    }

    /// 导出文本格式指标
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metric_error)?;

        String::from_utf8(buffer).map_err(|e| SkindexError::Internal(e.to_string()))
    }
}

/// 请求计数与耗时中间件；按路由模板而不是原始路径打标签
pub async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    state.metrics.observe_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// `/metrics` 处理器
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
