//! Magnet extraction from RSS/XML feed bodies
//!
//! Candidates come from two places:
//! - the `url` attribute of any `<enclosure>` element, wherever it is nested
//! - the text of any `<link>` element that has an `<item>` ancestor
//!
//! Candidates are entity-unescaped, then kept only if they are magnet links.

use crate::error::{Error, Result};
use crate::magnet::{MagnetLink, is_magnet_candidate};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Extract the distinct magnet links of a feed, in document order
///
/// # Errors
/// Returns [`Error::FeedParse`] if the document is not well-formed XML. Individual
/// candidates that fail to parse as URIs are logged and dropped.
pub fn extract_magnets(xml: &str) -> Result<Vec<MagnetLink>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut saw_root = false;
    // Number of currently open <item> elements
    let mut item_depth = 0usize;
    // Text collected for the innermost open <item><link>, with its element depth
    let mut link_text: Option<(usize, String)> = None;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut accept = |candidate: String| {
        let candidate = candidate.trim();
        if !is_magnet_candidate(candidate) || seen.contains(candidate) {
            return;
        }
        match MagnetLink::parse(candidate) {
            Ok(link) => {
                seen.insert(candidate.to_string());
                links.push(link);
            }
            Err(e) => warn!(error = %e, "Dropping unparseable magnet candidate"),
        }
    };

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::FeedParse(format!(
                "malformed XML at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(ref e) => {
                depth += 1;
                saw_root = true;
                match e.name().as_ref() {
                    b"item" => item_depth += 1,
                    b"link" if item_depth > 0 && link_text.is_none() => {
                        link_text = Some((depth, String::new()));
                    }
                    b"enclosure" => {
                        if let Some(url) = enclosure_url(e, &reader)? {
                            accept(url);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                saw_root = true;
                if e.name().as_ref() == b"enclosure"
                    && let Some(url) = enclosure_url(e, &reader)?
                {
                    accept(url);
                }
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"item" {
                    item_depth = item_depth.saturating_sub(1);
                }
                if let Some((open_depth, _)) = link_text
                    && open_depth == depth
                    && let Some((_, text)) = link_text.take()
                {
                    accept(text);
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(ref e) => {
                if let Some((_, text)) = link_text.as_mut() {
                    match e.unescape() {
                        Ok(unescaped) => text.push_str(&unescaped),
                        Err(err) => {
                            warn!(error = %err, "Dropping link text with invalid entity");
                            link_text = None;
                        }
                    }
                }
            }
            Event::CData(e) => {
                if let Some((_, text)) = link_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::FeedParse("document has no root element".to_string()));
    }
    if depth > 0 {
        return Err(Error::FeedParse(format!(
            "unexpected end of document with {depth} unclosed element(s)"
        )));
    }

    debug!(count = links.len(), "Extracted magnet links from feed");
    Ok(links)
}

fn enclosure_url(element: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<String>> {
    let attr = element.try_get_attribute("url").map_err(|e| {
        Error::FeedParse(format!(
            "malformed attribute at position {}: {}",
            reader.buffer_position(),
            e
        ))
    })?;

    let Some(attr) = attr else {
        return Ok(None);
    };
    match attr.unescape_value() {
        Ok(value) => Ok(Some(value.into_owned())),
        Err(e) => {
            warn!(error = %e, "Dropping enclosure url with invalid entity");
            Ok(None)
        }
    }
}
