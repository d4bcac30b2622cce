use super::document::Document;
use crate::error::PageError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Build a [`Document`] from XHTML. Void elements must be self-closed
/// (`<input/>`) and boolean attributes need a value (`hidden="hidden"`).
pub(crate) fn parse(markup: &str) -> Result<Document, PageError> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);

    let mut document = Document::default();
    let mut stack = vec![Document::root()];

    loop {
        let event = reader
            .read_event()
            .map_err(|err| markup_error(&reader, err))?;
        match event {
            Event::Start(element) => {
                let parent = current(&stack);
                let (tag, attrs) = element_parts(&element)?;
                let id = document.append_element(parent, &tag, attrs);
                stack.push(id);
            }
            Event::Empty(element) => {
                let parent = current(&stack);
                let (tag, attrs) = element_parts(&element)?;
                document.append_element(parent, &tag, attrs);
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Event::Text(text) => {
                let content = match text.unescape() {
                    Ok(unescaped) => unescaped.into_owned(),
                    // HTML named entities (&nbsp; and friends) are not XML.
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                let parent = current(&stack);
                if parent != Document::root() && !content.is_empty() {
                    document.append_text(parent, &content);
                }
            }
            Event::CData(data) => {
                let parent = current(&stack);
                if parent != Document::root() {
                    document.append_text(parent, &String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() > 1 {
        return Err(PageError::Markup("unclosed element at end of input".into()));
    }
    Ok(document)
}

fn current(stack: &[usize]) -> usize {
    stack.last().copied().unwrap_or_else(Document::root)
}

fn element_parts(element: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), PageError> {
    let tag = String::from_utf8_lossy(element.name().as_ref()).to_ascii_lowercase();
    let mut attrs = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|err| PageError::Markup(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = attr
            .unescape_value()
            .map(|value| value.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attrs.push((key, value));
    }
    Ok((tag, attrs))
}

fn markup_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> PageError {
    PageError::Markup(format!("at byte {}: {err}", reader.buffer_position()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_tree() {
        let document = parse(
            r#"<!DOCTYPE html>
<html><body><main id="content"><h1>Drama Society</h1><br/><p>Auditions &amp; rehearsals</p></main></body></html>"#,
        )
        .expect("markup parses");
        assert_eq!(document.len(), 6);
        let heading = document.select("main > h1").expect("selector")[0];
        assert_eq!(document.text(heading), Some("Drama Society"));
        let paragraph = document.select("p").expect("selector")[0];
        assert_eq!(document.text(paragraph), Some("Auditions & rehearsals"));
    }

    #[test]
    fn reports_mismatched_tags() {
        let err = parse("<div><span></div>").unwrap_err();
        assert!(matches!(err, PageError::Markup(_)));
    }

    #[test]
    fn reports_unclosed_elements() {
        let err = parse("<div><p>text</p>").unwrap_err();
        assert!(matches!(err, PageError::Markup(_)));
    }
}
