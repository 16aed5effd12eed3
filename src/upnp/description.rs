//! Device description document fetch and parsing.
//!
//! SSDP only tells us *where* a device is (the LOCATION header); the
//! description document at that URL tells us *what* it is and where its
//! control endpoints live. Each device publishes its own `controlURL`s,
//! so they must be parsed per device rather than assumed from a fixed
//! path layout.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use thiserror::Error;

use crate::upnp::utils::resolve_url;

/// Errors fetching or parsing a description document.
///
/// These never leave the discovery engine; a device with a bad description
/// is logged and skipped, not surfaced to dispatch callers.
#[derive(Debug, Error)]
pub enum DescriptionError {
    /// HTTP fetch of the description document failed.
    #[error("description fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Document is not usable as a media renderer description.
    #[error("malformed description document: {0}")]
    Malformed(&'static str),
}

/// Parsed contents of a device description document.
#[derive(Debug, Clone)]
pub struct DeviceDescription {
    /// Unique device name from the root device's UDN element.
    pub udn: String,
    /// Friendly name for display.
    pub friendly_name: String,
    /// Absolute RenderingControl control URL, if the service is published.
    pub rendering_control_url: Option<String>,
    /// Absolute AVTransport control URL, if the service is published.
    pub av_transport_url: Option<String>,
}

/// Fetches and parses the description document at an SSDP LOCATION URL.
pub async fn fetch_description(
    client: &Client,
    location: &str,
    timeout: Duration,
) -> Result<DeviceDescription, DescriptionError> {
    let response = client.get(location).timeout(timeout).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(DescriptionError::Malformed("non-success HTTP status"));
    }

    parse_description(&body, location)
}

/// Parses a description document, resolving control URLs against `location`.
///
/// Takes the first `friendlyName` and `UDN` in document order (the root
/// device) and the first RenderingControl/AVTransport service found anywhere
/// in the document, including embedded devices - receivers commonly nest the
/// MediaRenderer device one level down.
pub fn parse_description(xml: &str, location: &str) -> Result<DeviceDescription, DescriptionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut friendly_name: Option<String> = None;
    let mut udn: Option<String> = None;
    let mut rendering_control_url: Option<String> = None;
    let mut av_transport_url: Option<String> = None;

    // State for the <service> block being parsed
    let mut in_service = false;
    let mut service_type: Option<String> = None;
    let mut control_url: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"service" => {
                    in_service = true;
                    service_type = None;
                    control_url = None;
                }
                b"serviceType" if in_service => {
                    service_type = read_element_text(&mut reader, e.name());
                }
                b"controlURL" if in_service => {
                    control_url = read_element_text(&mut reader, e.name());
                }
                b"friendlyName" if !in_service && friendly_name.is_none() => {
                    friendly_name = read_element_text(&mut reader, e.name());
                }
                b"UDN" if !in_service && udn.is_none() => {
                    udn = read_element_text(&mut reader, e.name());
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"service" => {
                if let (Some(svc_type), Some(url)) = (service_type.take(), control_url.take()) {
                    let absolute = resolve_url(location, url.trim());
                    if svc_type.contains(":RenderingControl:") && rendering_control_url.is_none() {
                        rendering_control_url = Some(absolute);
                    } else if svc_type.contains(":AVTransport:") && av_transport_url.is_none() {
                        av_transport_url = Some(absolute);
                    }
                }
                in_service = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => return Err(DescriptionError::Malformed("invalid XML")),
            _ => {}
        }
        buf.clear();
    }

    let udn = udn
        .filter(|u| !u.trim().is_empty())
        .ok_or(DescriptionError::Malformed("missing UDN"))?;
    let friendly_name = friendly_name
        .filter(|n| !n.trim().is_empty())
        .ok_or(DescriptionError::Malformed("missing friendlyName"))?;

    Ok(DeviceDescription {
        udn: udn.trim().to_string(),
        friendly_name: friendly_name.trim().to_string(),
        rendering_control_url,
        av_transport_url,
    })
}

/// Reads the decoded text content of the element just opened.
fn read_element_text(reader: &mut Reader<&[u8]>, name: quick_xml::name::QName) -> Option<String> {
    reader
        .read_text(name)
        .ok()
        .map(|text| html_escape::decode_html_entities(&text).to_string())
}
