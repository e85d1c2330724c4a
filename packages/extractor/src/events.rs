//! Streaming XML event source.
//!
//! Wraps `quick_xml::Reader` and turns a raw document into the flat,
//! depth-first sequence of events the extractors consume. No tree is built.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ExtractorError, Result};

/// One step of a depth-first walk over a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    /// An element start. Self-closing elements produce `Open` then `Close`.
    Open(&'a str),
    /// Character data, already unescaped. May arrive in several chunks.
    Text(&'a str),
    /// An element end.
    Close(&'a str),
}

/// Strip a namespace prefix from a tag name.
///
/// # Examples
/// ```
/// use sempwatch_extractor::events::local_name;
///
/// assert_eq!(local_name("semp:queue"), "queue");
/// assert_eq!(local_name("queue"), "queue");
/// ```
pub fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}

/// Walk `document` and feed every event to `sink`.
///
/// Fails with `MalformedDocument` when the reader cannot tokenize the input,
/// when end tags do not match, when the document holds no element at all,
/// or when the input ends while elements are still open.
pub fn read_events<F>(document: &[u8], mut sink: F) -> Result<()>
where
    F: FnMut(XmlEvent<'_>),
{
    let mut reader = Reader::from_reader(document);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut open_elements: usize = 0;
    let mut seen_element = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ExtractorError::malformed(position(&reader), e.to_string()))?;

        match event {
            Event::Start(start) => {
                let name = decode_name(start.local_name().into_inner(), &reader)?;
                open_elements += 1;
                seen_element = true;
                sink(XmlEvent::Open(name));
            }
            Event::Empty(start) => {
                let name = decode_name(start.local_name().into_inner(), &reader)?;
                seen_element = true;
                sink(XmlEvent::Open(name));
                sink(XmlEvent::Close(name));
            }
            Event::End(end) => {
                let name = decode_name(end.local_name().into_inner(), &reader)?;
                open_elements = open_elements.checked_sub(1).ok_or_else(|| {
                    ExtractorError::malformed(position(&reader), format!("unmatched </{name}>"))
                })?;
                sink(XmlEvent::Close(name));
            }
            Event::Text(text) => {
                if open_elements > 0 {
                    let text = text.unescape().map_err(|e| {
                        ExtractorError::malformed(position(&reader), e.to_string())
                    })?;
                    sink(XmlEvent::Text(&text));
                }
            }
            Event::CData(data) => {
                if open_elements > 0 {
                    let text: Cow<'_, str> = match std::str::from_utf8(&data) {
                        Ok(s) => Cow::Borrowed(s),
                        Err(e) => {
                            return Err(ExtractorError::malformed(
                                position(&reader),
                                format!("CDATA is not valid UTF-8: {e}"),
                            ))
                        }
                    };
                    sink(XmlEvent::Text(&text));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
        buf.clear();
    }

    if !seen_element {
        return Err(ExtractorError::malformed(
            position(&reader),
            "document contains no element",
        ));
    }
    if open_elements > 0 {
        return Err(ExtractorError::malformed(
            position(&reader),
            format!("document truncated with {open_elements} element(s) still open"),
        ));
    }

    Ok(())
}

fn decode_name<'a, R>(raw: &'a [u8], reader: &Reader<R>) -> Result<&'a str> {
    std::str::from_utf8(raw).map_err(|e| {
        ExtractorError::malformed(position(reader), format!("tag name is not valid UTF-8: {e}"))
    })
}

fn position<R>(reader: &Reader<R>) -> u64 {
    u64::try_from(reader.buffer_position()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Result<Vec<String>> {
        let mut events = Vec::new();
        read_events(xml.as_bytes(), |event| {
            events.push(match event {
                XmlEvent::Open(tag) => format!("+{tag}"),
                XmlEvent::Text(text) => format!("'{text}'"),
                XmlEvent::Close(tag) => format!("-{tag}"),
            });
        })?;
        Ok(events)
    }

    #[test]
    fn test_depth_first_order() {
        let events = collect("<a><b>x</b><c/></a>").unwrap();
        assert_eq!(events, vec!["+a", "+b", "'x'", "-b", "+c", "-c", "-a"]);
    }

    #[test]
    fn test_entities_are_unescaped() {
        let events = collect("<a>Q&amp;A &lt;1&gt;</a>").unwrap();
        assert!(events.contains(&"'Q&A <1>'".to_string()));
    }

    #[test]
    fn test_cdata_is_text() {
        let events = collect("<a><![CDATA[<raw>]]></a>").unwrap();
        assert_eq!(events, vec!["+a", "'<raw>'", "-a"]);
    }

    #[test]
    fn test_namespace_prefix_stripped() {
        let events = collect(r#"<s:a xmlns:s="urn:x"><s:b/></s:a>"#).unwrap();
        assert_eq!(events, vec!["+a", "+b", "-b", "-a"]);
    }

    #[test]
    fn test_declaration_and_comments_ignored() {
        let events = collect("<?xml version=\"1.0\"?><!-- hi --><a/>").unwrap();
        assert_eq!(events, vec!["+a", "-a"]);
    }

    #[test]
    fn test_truncated_document_fails() {
        let err = collect("<a><b>x</b>").unwrap_err();
        assert!(matches!(err, ExtractorError::MalformedDocument { .. }));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_mismatched_end_tag_fails() {
        let err = collect("<a><b></a></b>").unwrap_err();
        assert!(matches!(err, ExtractorError::MalformedDocument { .. }));
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(collect("").is_err());
        assert!(collect("   ").is_err());
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("a:b:c"), "c");
        assert_eq!(local_name(""), "");
    }
}
