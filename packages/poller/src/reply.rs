//! Reply status check.
//!
//! A SEMP reply ends with `<execute-result code="ok"/>` when the broker ran
//! the command. Anything else means the rows (if any) cannot be trusted.
//! The check streams the reply and stops at the first `execute-result`; it
//! runs after extraction, so a truncated reply has already been reported as
//! malformed by then.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PollerError, Result};

/// Element carrying the broker's verdict.
const EXECUTE_RESULT: &str = "execute-result";

/// Result code of a successful request.
pub const EXECUTE_RESULT_OK: &str = "ok";

/// Check the `execute-result` of a reply.
///
/// # Returns
/// * `Ok(())` when the code is `ok`, or when the reply carries no result
/// * `Err(PollerError::SempRejected)` with the broker's code and reason
/// * `Err(PollerError::XmlParse)` when the reply cannot be tokenized
///
/// # Examples
/// ```
/// use sempwatch_poller::reply::check_reply;
///
/// assert!(check_reply(r#"<rpc-reply><execute-result code="ok"/></rpc-reply>"#).is_ok());
/// assert!(check_reply(r#"<rpc-reply><execute-result code="fail"/></rpc-reply>"#).is_err());
/// ```
pub fn check_reply(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == EXECUTE_RESULT.as_bytes() =>
            {
                let code = attribute(&element, "code")?.unwrap_or_default();
                if code == EXECUTE_RESULT_OK {
                    return Ok(());
                }
                return Err(PollerError::SempRejected {
                    code,
                    reason: attribute(&element, "reason")?,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tracing::warn!("Reply has no execute-result element, accepting as is");
    Ok(())
}

/// Unescaped value of attribute `name`, if present.
fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let Some(attr) = element
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?
    else {
        return Ok(None);
    };
    Ok(Some(attr.unescape_value()?.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_reply() {
        let xml = r#"<rpc-reply semp-version="soltr/9_8VMR"><rpc/><execute-result code="ok"/></rpc-reply>"#;
        assert!(check_reply(xml).is_ok());
    }

    #[test]
    fn test_rejected_reply_carries_reason() {
        let xml = r#"<rpc-reply><parse-error>bad</parse-error><execute-result code="parse-error" reason="unknown &lt;element&gt;"/></rpc-reply>"#;
        let err = check_reply(xml).unwrap_err();
        match err {
            PollerError::SempRejected { code, reason } => {
                assert_eq!(code, "parse-error");
                assert_eq!(reason.as_deref(), Some("unknown <element>"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_result_is_accepted() {
        assert!(check_reply("<rpc-reply><rpc/></rpc-reply>").is_ok());
    }

    #[test]
    fn test_missing_code_is_rejected() {
        let err = check_reply("<rpc-reply><execute-result/></rpc-reply>").unwrap_err();
        assert!(matches!(err, PollerError::SempRejected { .. }));
    }

    #[test]
    fn test_mismatched_tags() {
        let err = check_reply("<rpc-reply><rpc></show></rpc-reply>").unwrap_err();
        assert!(matches!(err, PollerError::XmlParse(_)));
    }
}
