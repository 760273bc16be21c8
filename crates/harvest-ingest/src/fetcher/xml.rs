//! XML payloads as JSON records
//!
//! Elements become objects: attributes are plain keys, child elements are
//! keyed by tag name (repeated tags collect into a list) and character data
//! is stored under `text`. [`XmlOptions`] switches off attributes or keeps
//! separate runs of character data apart as `text`, `text2`, `text3` and on.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{HarvestError, Result};

/// Key holding an element's character data
pub const TEXT_KEY: &str = "text";

/// How elements are turned into objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlOptions {
    /// Copy attributes into the element's object
    pub attributes: bool,
    /// Store each run of character data between child elements under its
    /// own numbered key instead of joining them
    pub numbered_text: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            attributes: true,
            numbered_text: false,
        }
    }
}

/// Key of the `n`th text run (1-based)
pub fn text_key(n: usize) -> String {
    if n <= 1 {
        TEXT_KEY.to_string()
    } else {
        format!("{}{}", TEXT_KEY, n)
    }
}

struct Element {
    name: String,
    fields: Map<String, Value>,
    runs: Vec<String>,
    // A child closed since the last text event, so new text opens a run
    run_closed: bool,
}

impl Element {
    fn open(start: &BytesStart<'_>, options: XmlOptions) -> Result<Self> {
        let mut fields = Map::new();
        if options.attributes {
            for attr in start.attributes() {
                let attr = attr?;
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr.unescape_value()?.into_owned();
                fields.insert(key, Value::String(value));
            }
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            runs: Vec::new(),
            run_closed: true,
        })
    }

    fn push_text(&mut self, text: &str) {
        match self.runs.last_mut() {
            Some(run) if !self.run_closed => run.push_str(text),
            _ => self.runs.push(text.to_string()),
        }
        self.run_closed = false;
    }

    fn attach(&mut self, name: String, value: Value) {
        self.run_closed = true;
        match self.fields.get_mut(&name) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            },
            None => {
                self.fields.insert(name, value);
            },
        }
    }

    fn close(mut self, options: XmlOptions) -> (String, Value) {
        if options.numbered_text {
            let runs = self
                .runs
                .iter()
                .map(|run| run.trim())
                .filter(|run| !run.is_empty());
            for (i, run) in runs.enumerate() {
                self.fields
                    .insert(text_key(i + 1), Value::String(run.to_string()));
            }
        } else {
            let joined = self.runs.concat();
            let text = joined.trim();
            if !text.is_empty() {
                self.fields
                    .insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
            }
        }
        (self.name, Value::Object(self.fields))
    }
}

/// Parse a document into its root element name and body
pub fn to_json(xml: &str) -> Result<(String, Map<String, Value>)> {
    to_json_with(xml, XmlOptions::default())
}

/// [`to_json`] with explicit conversion options
pub fn to_json_with(xml: &str, options: XmlOptions) -> Result<(String, Map<String, Value>)> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::open(&start, options)?),
            Event::Empty(start) => {
                let (name, value) = Element::open(&start, options)?.close(options);
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, value),
                    None => root = Some((name, value)),
                }
            },
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&text.unescape()?);
                }
            },
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.push_text(&String::from_utf8_lossy(&data.into_inner()));
                }
            },
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| HarvestError::Xml("unbalanced closing tag".to_string()))?;
                let (name, value) = element.close(options);
                match stack.last_mut() {
                    Some(parent) => parent.attach(name, value),
                    None => root = Some((name, value)),
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    match root {
        Some((name, Value::Object(body))) => Ok((name, body)),
        _ => Err(HarvestError::Xml("document has no root element".to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_text_and_repeats() {
        let (root, body) = to_json(
            r#"<?xml version="1.0"?>
            <rsp stat="ok">
              <photos page="1" total="2">
                <photo id="1" title="a &amp; b"/>
                <photo id="2" title="c"/>
              </photos>
              <note lang="en">Hello <![CDATA[world]]></note>
            </rsp>"#,
        )
        .unwrap();

        assert_eq!(root, "rsp");
        assert_eq!(body["stat"], json!("ok"));
        assert_eq!(body["photos"]["total"], json!("2"));
        assert_eq!(
            body["photos"]["photo"],
            json!([{"id": "1", "title": "a & b"}, {"id": "2", "title": "c"}])
        );
        assert_eq!(body["note"], json!({"lang": "en", "text": "Hello world"}));
    }

    #[test]
    fn test_numbered_text_runs_without_attributes() {
        let options = XmlOptions {
            attributes: false,
            numbered_text: true,
        };
        let (root, body) = to_json_with(
            r#"<objects count="1">
              <object id="7">
                <maker role="publisher">Canada.<role>Publisher</role>War Finance Committee</maker>
                <title><![CDATA[Money is power.]]></title>
              </object>
            </objects>"#,
            options,
        )
        .unwrap();

        assert_eq!(root, "objects");
        assert!(body.get("count").is_none());
        let object = &body["object"];
        assert!(object.get("id").is_none());
        assert_eq!(
            object["maker"],
            json!({"text": "Canada.", "role": {"text": "Publisher"}, "text2": "War Finance Committee"})
        );
        assert_eq!(object["title"], json!({"text": "Money is power."}));
    }

    #[test]
    fn test_text_keys() {
        assert_eq!(text_key(1), "text");
        assert_eq!(text_key(3), "text3");
    }

    #[test]
    fn test_malformed_document() {
        assert!(to_json("").is_err());
        assert!(to_json("<a><b></a>").is_err());
    }
}
