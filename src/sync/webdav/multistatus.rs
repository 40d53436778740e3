//! Parsing of PROPFIND multistatus responses.
//!
//! Elements are matched by local name, so `<D:href>`, `<d:href>` and a
//! default-namespace `<href>` are all accepted.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::client::WebDavError;

/// One `<response>` block of a multistatus listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub href: String,
    /// Text of the first `<status>` element in the block
    pub status: String,
}

impl ListingEntry {
    pub fn is_ok(&self) -> bool {
        self.status.contains("200 OK")
    }

    /// Note id for a successful entry naming a `<id>.<extension>` file
    pub fn note_uuid(&self, extension: &str) -> Option<String> {
        if !self.is_ok() {
            return None;
        }
        note_uuid_from_href(&self.href, extension)
    }
}

#[derive(Clone, Copy)]
enum Capture {
    Href,
    Status,
}

/// Parse a multistatus body into its response entries.
///
/// Blocks without an href are dropped.
pub fn parse_multistatus(xml: &str) -> Result<Vec<ListingEntry>, WebDavError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_response = false;
    let mut href = String::new();
    let mut status: Option<String> = None;
    let mut text = String::new();
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => {
                    in_response = true;
                    href.clear();
                    status = None;
                }
                b"href" if in_response => {
                    capture = Some(Capture::Href);
                    text.clear();
                }
                b"status" if in_response => {
                    capture = Some(Capture::Status);
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if capture.is_some() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| WebDavError::XmlParse(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"href" => {
                    if let Some(Capture::Href) = capture.take() {
                        href = text.trim().to_string();
                    }
                }
                b"status" => {
                    if let Some(Capture::Status) = capture.take() {
                        if status.is_none() {
                            status = Some(text.trim().to_string());
                        }
                    }
                }
                b"response" => {
                    if in_response && !href.is_empty() {
                        entries.push(ListingEntry {
                            href: std::mem::take(&mut href),
                            status: status.take().unwrap_or_default(),
                        });
                    }
                    in_response = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(WebDavError::XmlParse(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    log::debug!("WebDAV: parsed {} multistatus entries", entries.len());
    Ok(entries)
}

/// Extract `<id>` from an href ending in `<id>.<extension>`.
///
/// Accepts absolute paths and full URLs; the file name is percent-decoded.
pub fn note_uuid_from_href(href: &str, extension: &str) -> Option<String> {
    let path = match href.find("://") {
        Some(scheme_end) => {
            let after_scheme = &href[scheme_end + 3..];
            after_scheme.find('/').map(|i| &after_scheme[i..]).unwrap_or("")
        }
        None => href,
    };
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file_name = path.rsplit('/').next()?;
    let file_name = urlencoding::decode(file_name)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| file_name.to_string());

    let stem = file_name.strip_suffix(&format!(".{}", extension))?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}
