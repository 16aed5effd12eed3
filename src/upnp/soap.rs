//! Low-level SOAP protocol implementation for uPNP control actions.
//!
//! This module handles the raw SOAP envelope building, HTTP transport,
//! and fault detection. Renderer-level commands live in `crate::control`.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::device::RendererService;
use crate::upnp::utils::{escape_xml, extract_xml_text};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during SOAP operations with a renderer.
#[derive(Debug, Error)]
pub enum SoapError {
    /// HTTP request to the device failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request to the device timed out.
    #[error("request timed out")]
    Timeout,

    /// Device returned a non-success HTTP status without a SOAP fault.
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Device returned a SOAP fault response.
    #[error("SOAP fault: {0}")]
    Fault(String),

    /// Failed to parse the SOAP response XML.
    #[error("failed to parse SOAP response")]
    Parse,
}

/// Convenient Result alias for SOAP operations.
pub type SoapResult<T> = Result<T, SoapError>;

impl SoapError {
    /// Returns true if this is a network-level failure (timeout, connection
    /// refused) rather than a protocol-level rejection by the device.
    ///
    /// Network-level failures are the only errors the dispatcher retries;
    /// a fault code or unparseable response means the device received and
    /// rejected the request, so retrying would not help.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            SoapError::Timeout => true,
            SoapError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::Timeout => "request_timeout",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault(_) => "soap_fault",
            Self::Parse => "soap_parse_error",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request/Response
// ─────────────────────────────────────────────────────────────────────────────

/// Sends a SOAP request to a renderer's control endpoint.
///
/// This is the core transport function for all UPnP SOAP operations.
/// It builds the SOAP envelope, posts it, and detects SOAP faults in
/// the response.
///
/// # Arguments
/// * `client` - The HTTP client to use for the request
/// * `control_url` - Absolute control URL from the device description
/// * `service` - The UPnP service URN (e.g., "urn:schemas-upnp-org:service:AVTransport:1")
/// * `action` - The SOAP action name (e.g., "Play", "Stop", "GetVolume")
/// * `args` - Key-value pairs for action arguments (order is preserved)
/// * `timeout` - Per-request timeout
pub async fn send_soap_request(
    client: &Client,
    control_url: &str,
    service: &str,
    action: &str,
    args: &[(&str, &str)],
    timeout: Duration,
) -> SoapResult<String> {
    // Build SOAP envelope - must be a single line with no leading whitespace.
    // Some device SOAP parsers reject XML with whitespace before the root element.
    let mut body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{} xmlns:u="{}">"#,
        action, service
    );

    for (k, v) in args {
        body.push_str(&format!("<{k}>{}</{k}>", escape_xml(v)));
    }

    body.push_str(&format!(r#"</u:{}></s:Body></s:Envelope>"#, action));

    log::debug!(
        "[SOAP] {} -> {} (body: {} bytes)",
        action,
        control_url,
        body.len()
    );
    log::trace!("[SOAP] Request body: {}", body);

    let start = std::time::Instant::now();
    let res = client
        .post(control_url)
        .header("Content-Type", "text/xml; charset=\"utf-8\"")
        .header("SOAPAction", format!("\"{}#{}\"", service, action))
        .body(body)
        .timeout(timeout)
        .send()
        .await;

    log::debug!(
        "[SOAP] {} completed in {:?}: {:?}",
        action,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    // Map timeouts to their own variant so callers can classify without
    // poking at the reqwest error.
    let res = res.map_err(|e| {
        if e.is_timeout() {
            SoapError::Timeout
        } else {
            SoapError::Http(e)
        }
    })?;

    let status = res.status();
    let response_text = res.text().await?;

    // Check for SOAP fault before HTTP status (faults usually arrive with 500)
    if response_text.contains("<s:Fault>") || response_text.contains("<soap:Fault>") {
        let fault_msg = extract_fault_string(&response_text)
            .unwrap_or_else(|| "Unknown SOAP fault".to_string());
        return Err(SoapError::Fault(fault_msg));
    }

    if !status.is_success() {
        return Err(SoapError::HttpStatus(status.as_u16(), response_text));
    }

    Ok(response_text)
}

/// Extracts the faultstring from a SOAP fault response.
fn extract_fault_string(xml: &str) -> Option<String> {
    // Devices report the UPnP error code in errorCode; prefer it over the
    // generic faultstring ("UPnPError") when present.
    match extract_xml_text(xml, "errorCode") {
        Some(code) => {
            let desc = extract_xml_text(xml, "errorDescription").unwrap_or_default();
            Some(format!("{} {}", code, desc).trim_end().to_string())
        }
        None => extract_xml_text(xml, "faultstring"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SOAP Request Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing and sending SOAP requests to a renderer.
///
/// Provides a fluent API that reduces boilerplate when making SOAP calls.
///
/// # Example
/// ```ignore
/// let response = SoapRequestBuilder::new(&client, device.endpoint_for(RendererService::AVTransport))
///     .service(RendererService::AVTransport)
///     .action("Play")
///     .instance_id()
///     .arg("Speed", "1")
///     .timeout(Duration::from_secs(3))
///     .send()
///     .await?;
/// ```
pub struct SoapRequestBuilder<'a> {
    client: &'a Client,
    control_url: &'a str,
    service: Option<RendererService>,
    action: Option<&'a str>,
    args: Vec<(&'a str, String)>,
    timeout: Duration,
}

impl<'a> SoapRequestBuilder<'a> {
    /// Creates a new SOAP request builder targeting a control URL.
    #[must_use]
    pub fn new(client: &'a Client, control_url: &'a str) -> Self {
        Self {
            client,
            control_url,
            service: None,
            action: None,
            args: Vec::new(),
            timeout: Duration::from_secs(crate::protocol_constants::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Sets the service for this request.
    #[must_use]
    pub fn service(mut self, service: RendererService) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the SOAP action name.
    #[must_use]
    pub fn action(mut self, action: &'a str) -> Self {
        self.action = Some(action);
        self
    }

    /// Adds an argument to the SOAP request.
    ///
    /// Arguments are included in the SOAP body in the order they are added.
    #[must_use]
    pub fn arg(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Adds the standard InstanceID="0" argument used by renderer actions.
    #[must_use]
    pub fn instance_id(self) -> Self {
        self.arg("InstanceID", "0")
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the SOAP request and returns the response body.
    ///
    /// # Errors
    /// Returns `SoapError` if the service or action is not set, or if the
    /// request fails.
    pub async fn send(self) -> SoapResult<String> {
        let service = self
            .service
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: service not set".into()))?;
        let action = self
            .action
            .ok_or_else(|| SoapError::Fault("SoapRequestBuilder: action not set".into()))?;

        // Convert to slice of (&str, &str) - preserves insertion order
        let args: Vec<(&str, &str)> = self.args.iter().map(|(k, v)| (*k, v.as_str())).collect();

        send_soap_request(
            self.client,
            self.control_url,
            service.urn(),
            action,
            &args,
            self.timeout,
        )
        .await
    }

    /// Returns the request parts without sending (for testing).
    #[cfg(test)]
    pub fn into_parts(self) -> Option<(RendererService, &'a str, Vec<(&'a str, String)>)> {
        let service = self.service?;
        let action = self.action?;
        Some((service, action, self.args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        Client::new()
    }

    #[test]
    fn builder_captures_service_and_action() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "http://10.0.0.9:8080/rc")
            .service(RendererService::RenderingControl)
            .action("GetVolume")
            .into_parts();

        let (service, action, args) = parts.expect("should have parts");
        assert_eq!(service, RendererService::RenderingControl);
        assert_eq!(action, "GetVolume");
        assert!(args.is_empty());
    }

    #[test]
    fn builder_captures_args_in_order() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "http://10.0.0.9:8080/rc")
            .service(RendererService::RenderingControl)
            .action("SetVolume")
            .instance_id()
            .arg("Channel", "Master")
            .arg("DesiredVolume", "75")
            .into_parts();

        let (_, _, args) = parts.expect("should have parts");
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], ("InstanceID", "0".to_string()));
        assert_eq!(args[1], ("Channel", "Master".to_string()));
        assert_eq!(args[2], ("DesiredVolume", "75".to_string()));
    }

    #[test]
    fn into_parts_returns_none_without_service() {
        let client = test_client();
        let parts = SoapRequestBuilder::new(&client, "http://10.0.0.9:8080/rc")
            .action("GetVolume")
            .into_parts();
        assert!(parts.is_none());
    }

    #[test]
    fn fault_string_prefers_upnp_error_code() {
        let xml = r#"<s:Fault><faultstring>UPnPError</faultstring><detail><UPnPError><errorCode>402</errorCode><errorDescription>Invalid Args</errorDescription></UPnPError></detail></s:Fault>"#;
        assert_eq!(extract_fault_string(xml), Some("402 Invalid Args".into()));
    }

    #[test]
    fn fault_string_falls_back_to_faultstring() {
        let xml = r#"<s:Fault><faultstring>Action Failed</faultstring></s:Fault>"#;
        assert_eq!(extract_fault_string(xml), Some("Action Failed".into()));
    }

    #[test]
    fn fault_and_parse_errors_are_not_network() {
        assert!(!SoapError::Fault("701".into()).is_network());
        assert!(!SoapError::Parse.is_network());
        assert!(!SoapError::HttpStatus(500, String::new()).is_network());
    }

    #[test]
    fn timeout_is_network() {
        assert!(SoapError::Timeout.is_network());
        assert_eq!(SoapError::Timeout.code(), "request_timeout");
    }
}
