use axum::http::{HeaderValue, header, header::InvalidHeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

/// CSP allowing inline scripts plus scripts and workers from `script_origin`.
#[must_use]
pub fn content_security_policy(script_origin: &str) -> String {
    format!("script-src 'self' 'unsafe-inline' {script_origin}; worker-src 'self' {script_origin}")
}

/// Layer stamping the CSP header on every response.
pub fn csp_layer(
    script_origin: &str,
) -> Result<SetResponseHeaderLayer<HeaderValue>, InvalidHeaderValue> {
    let value = HeaderValue::from_str(&content_security_policy(script_origin))?;
    Ok(SetResponseHeaderLayer::overriding(
        header::CONTENT_SECURITY_POLICY,
        value,
    ))
}
