//! XML and URL helpers shared by the SOAP and description-document code.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

// ─────────────────────────────────────────────────────────────────────────────
// XML Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Extracts text content from the first occurrence of an XML element.
///
/// Searches for an element by its local name (ignoring namespace prefixes)
/// and returns its decoded text content.
///
/// # Example
/// ```ignore
/// let xml = r#"<u:CurrentVolume>42</u:CurrentVolume>"#;
/// assert_eq!(extract_xml_text(xml, "CurrentVolume"), Some("42".to_string()));
/// ```
pub fn extract_xml_text(xml: &str, element_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let target_bytes = element_name.as_bytes();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == target_bytes => {
                if let Ok(text) = reader.read_text(e.name()) {
                    let decoded = html_escape::decode_html_entities(&text);
                    return Some(decoded.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// XML Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Escapes XML special characters for embedding in XML content.
///
/// Escapes all five XML special characters as required by the XML spec.
/// Used for SOAP argument values.
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves a possibly-relative URL from a description document against the
/// document's own location.
///
/// Devices publish `controlURL` values in three shapes: absolute
/// (`http://host/path`), host-relative (`/path`), and document-relative
/// (`path`). All three occur in the wild.
pub fn resolve_url(location: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let base = base_of(location);
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        // Document-relative: replace the last path segment of the location.
        match location.rfind('/') {
            Some(idx) if idx > base.len() => format!("{}/{}", &location[..idx], url),
            _ => format!("{}/{}", base, url),
        }
    }
}

/// Returns the `scheme://host[:port]` portion of a URL.
fn base_of(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(idx) => &url[..after_scheme + idx],
        None => url,
    }
}
