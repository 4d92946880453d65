//! Flat record extraction from XML containers
//!
//! Gamelists and LaunchBox platform files share one shape: a root holding repeated
//! record elements whose children are simple text fields.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;

/// One record element
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmlRecord {
    pub attributes: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
    /// Empty child elements with their attributes, in document order
    pub elements: Vec<(String, BTreeMap<String, String>)>,
}

fn attributes(e: &BytesStart) -> Result<BTreeMap<String, String>, String> {
    let mut attributes = BTreeMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.to_string();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Collect the `record` elements that are direct children of a `parent` element.
///
/// Any syntax error or a document that ends inside an element fails the whole parse.
pub(crate) fn parse_records(
    xml: &str,
    parent: &str,
    record: &str,
) -> Result<Vec<XmlRecord>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut records = Vec::new();
    let mut current: Option<XmlRecord> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let in_parent = stack.last().is_some_and(|p| p.eq_ignore_ascii_case(parent));
                if in_parent && name.eq_ignore_ascii_case(record) {
                    current = Some(XmlRecord {
                        attributes: attributes(&e)?,
                        ..XmlRecord::default()
                    });
                }
                text.clear();
                stack.push(name);
            }
            Event::Empty(e) => {
                if let Some(rec) = current.as_mut()
                    && is_record_level(&stack, parent, record)
                {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    rec.fields.entry(name.clone()).or_default();
                    rec.elements.push((name, attributes(&e)?));
                }
            }
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err("unbalanced closing tag".to_string());
                };
                if is_record_level(&stack, parent, record) {
                    if let Some(rec) = current.as_mut() {
                        rec.fields
                            .entry(name)
                            .or_insert_with(|| text.trim().to_string());
                    }
                } else if name.eq_ignore_ascii_case(record)
                    && stack.last().is_some_and(|p| p.eq_ignore_ascii_case(parent))
                    && let Some(rec) = current.take()
                {
                    records.push(rec);
                }
                text.clear();
            }
            Event::Eof => {
                if let Some(open) = stack.last() {
                    return Err(format!("document ends inside <{open}>"));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(records)
}

/// True when the innermost open element is a record inside `parent`
fn is_record_level(stack: &[String], parent: &str, record: &str) -> bool {
    let n = stack.len();
    n >= 2 && stack[n - 1].eq_ignore_ascii_case(record) && stack[n - 2].eq_ignore_ascii_case(parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gamelist_records() {
        let xml = r#"<?xml version="1.0"?>
<alternativeEmulator><label>x</label></alternativeEmulator>
<gameList>
  <game id="123" source="ScreenScraper.fr">
    <path>./Super Mario World.zip</path>
    <name>Super Mario World &amp; Friends</name>
    <desc><![CDATA[Save <Princess>]]></desc>
    <favorite/>
  </game>
  <folder><path>./sub</path></folder>
  <game><path>./b.zip</path></game>
</gameList>"#;

        let records = parse_records(xml, "gameList", "game").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attributes["id"], "123");
        assert_eq!(records[0].fields["name"], "Super Mario World & Friends");
        assert_eq!(records[0].fields["desc"], "Save <Princess>");
        assert_eq!(records[0].fields["favorite"], "");
        assert_eq!(records[1].fields["path"], "./b.zip");
        assert_eq!(records[0].elements.len(), 1);
        assert_eq!(records[0].elements[0].0, "favorite");
    }

    #[test]
    fn test_empty_element_attributes() {
        let xml = r#"<datafile><machine name="pacman"><description>Pac-Man</description>
<rom name="pacman.zip" crc="C1E6AB10"/></machine></datafile>"#;
        let records = parse_records(xml, "datafile", "machine").unwrap();
        assert_eq!(records[0].attributes["name"], "pacman");
        let (name, attributes) = &records[0].elements[0];
        assert_eq!(name, "rom");
        assert_eq!(attributes["crc"], "C1E6AB10");
    }

    #[test]
    fn test_truncated_document_fails() {
        let xml = "<gameList><game><path>./a.zip</path>";
        assert!(parse_records(xml, "gameList", "game").is_err());
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let xml = "<gameList><game><path>./a.zip</name></game></gameList>";
        assert!(parse_records(xml, "gameList", "game").is_err());
    }
}
