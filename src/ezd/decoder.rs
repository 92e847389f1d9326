//! Response decoder: raw EZD response → [`RegistrationResult`].
//!
//! The body is parsed into a small element tree with quick-xml and markers
//! are looked up by local name (namespace prefixes ignored), first match in
//! document order. Decoding is total: any input yields a result, never an
//! error or panic.

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::EzdError;
use crate::models::result::{Registration, RegistrationResult};

/// Success marker carrying the RPW number.
pub const RPW_NUMBER_TAG: &str = "ZnakWplywu";
/// Error marker carrying the upstream message.
pub const RESULT_MESSAGE_TAG: &str = "ResultMessage";
pub const DOCUMENT_ID_TAG: &str = "IdDokumentu";
pub const INFLOW_ID_TAG: &str = "IdWplywu";
pub const FOLDER_ID_TAG: &str = "IdKoszulki";

/// Deepest element nesting accepted in a response.
const MAX_DEPTH: usize = 256;

const UNINTERPRETABLE: &str = "could not interpret response (no ZnakWplywu or ResultMessage)";

/// Decode an EZD response.
///
/// A non-success status short-circuits without looking at the body. A
/// success marker wins over an error marker when both are present.
pub fn decode_register_inflow(body: &str, status: StatusCode) -> RegistrationResult {
    if !status.is_success() {
        return RegistrationResult::failure(
            EzdError::Status {
                status: status.as_u16(),
            }
            .to_string(),
        );
    }

    let roots = match parse_tree(body) {
        Ok(roots) => roots,
        Err(reason) => {
            debug!("Unparseable EZD response: {reason}");
            return RegistrationResult::failure(EzdError::UnparseableResponse(reason).to_string());
        }
    };

    if let Some(rpw_number) = find_text(&roots, RPW_NUMBER_TAG).filter(|s| !s.is_empty()) {
        return Registration {
            rpw_number,
            document_id: find_number(&roots, DOCUMENT_ID_TAG),
            inflow_id: find_number(&roots, INFLOW_ID_TAG),
            folder_id: find_number(&roots, FOLDER_ID_TAG),
        }
        .into();
    }

    if let Some(message) = find_text(&roots, RESULT_MESSAGE_TAG) {
        return RegistrationResult::failure(message);
    }

    debug!("EZD response carried neither {RPW_NUMBER_TAG} nor {RESULT_MESSAGE_TAG}");
    RegistrationResult::failure(EzdError::UnparseableResponse(UNINTERPRETABLE.to_string()).to_string())
}

// ── Element tree ────────────────────────────────────────────────────

/// A parsed element: local name, direct text content, children.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

/// Parse markup into a forest of elements.
///
/// Several top-level elements are accepted (bare fragments are common in
/// test doubles and proxies). Mismatched or unclosed tags are errors.
fn parse_tree(body: &str) -> Result<Vec<Element>, String> {
    let mut reader = Reader::from_str(body);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Element> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.error_position()))?;

        match event {
            Event::Start(_) if stack.len() >= MAX_DEPTH => {
                return Err(format!("nesting too deep (more than {MAX_DEPTH} levels)"));
            }
            Event::Start(start) => stack.push(Element {
                name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                ..Element::default()
            }),
            Event::Empty(start) => {
                let element = Element {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
                    ..Element::default()
                };
                attach(&mut stack, &mut roots, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without an opening tag".to_string())?;
                attach(&mut stack, &mut roots, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    let text = cdata.decode().map_err(|e| e.to_string())?;
                    current.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    Ok(roots)
}

fn attach(stack: &mut [Element], roots: &mut Vec<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

/// Depth-first, document-order search by local name.
fn find<'a>(elements: &'a [Element], name: &str) -> Option<&'a Element> {
    elements.iter().find_map(|el| {
        if el.name == name {
            Some(el)
        } else {
            find(&el.children, name)
        }
    })
}

fn find_text(elements: &[Element], name: &str) -> Option<String> {
    find(elements, name).map(|el| el.text.trim().to_string())
}

/// Missing element or non-numeric content both yield `None`.
fn find_number<T: std::str::FromStr>(elements: &[Element], name: &str) -> Option<T> {
    find_text(elements, name).and_then(|s| s.parse().ok())
}
