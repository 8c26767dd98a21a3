use axum::http::{HeaderName, HeaderValue};
use std::env;
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";
const CSP_API_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const REFERRER_POLICY_VALUE: &str = "strict-origin-when-cross-origin";

type SetHeader = SetResponseHeaderLayer<HeaderValue>;

pub type SecurityHeadersLayer = Stack<
    SetHeader,
    Stack<SetHeader, Stack<SetHeader, Stack<SetHeader, Stack<SetHeader, Identity>>>>,
>;

/// Standard security response headers for a JSON API. HSTS is only added in
/// production, where the service sits behind TLS.
pub fn create_security_headers_layer() -> SecurityHeadersLayer {
    let is_production = env::var("RUST_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false);

    if is_production {
        tracing::info!("Security: HSTS header enabled (production mode)");
    } else {
        tracing::info!("Security: HSTS header disabled (development mode)");
    }

    let hsts = if is_production {
        HeaderValue::from_static(HSTS_VALUE)
    } else {
        // max-age=0 clears any cached HSTS policy during local development
        HeaderValue::from_static("max-age=0")
    };

    ServiceBuilder::new()
        .layer(set_header("x-content-type-options", "nosniff"))
        .layer(set_header("x-frame-options", "DENY"))
        .layer(set_header("content-security-policy", CSP_API_VALUE))
        .layer(set_header("referrer-policy", REFERRER_POLICY_VALUE))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("strict-transport-security"),
            hsts,
        ))
        .into_inner()
}

fn set_header(name: &'static str, value: &'static str) -> SetHeader {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static(name),
        HeaderValue::from_static(value),
    )
}
