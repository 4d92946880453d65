//! Small builder over quick-xml for indented documents

use crate::ConvertError;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

pub(crate) struct XmlDocument {
    writer: Writer<Vec<u8>>,
    open: Vec<String>,
}

impl XmlDocument {
    /// Start a document with an XML declaration and the root element
    pub(crate) fn new(root: &str) -> Result<Self, ConvertError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut doc = Self {
            writer,
            open: Vec::new(),
        };
        doc.start(root, &[])?;
        Ok(doc)
    }

    pub(crate) fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ConvertError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Start(element))?;
        self.open.push(name.to_string());
        Ok(())
    }

    /// Element without children
    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ConvertError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    /// `<name>value</name>`; blank values are skipped
    pub(crate) fn text(&mut self, name: &str, value: &str) -> Result<(), ConvertError> {
        if value.trim().is_empty() {
            return Ok(());
        }
        self.writer.write_event(Event::Start(BytesStart::new(name)))?;
        self.writer.write_event(Event::Text(BytesText::new(value)))?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn text_opt(&mut self, name: &str, value: Option<&str>) -> Result<(), ConvertError> {
        match value {
            Some(value) => self.text(name, value),
            None => Ok(()),
        }
    }

    pub(crate) fn end(&mut self) -> Result<(), ConvertError> {
        if let Some(name) = self.open.pop() {
            self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }

    /// Close every open element and return the bytes, newline terminated
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        while !self.open.is_empty() {
            self.end()?;
        }
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_escapes_and_skips_blank() {
        let mut doc = XmlDocument::new("gameList").unwrap();
        doc.start("game", &[("id", "42")]).unwrap();
        doc.text("name", "Tom & Jerry").unwrap();
        doc.text("desc", "  ").unwrap();
        let bytes = doc.finish().unwrap();
        let xml = String::from_utf8(bytes).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<game id=\"42\">"));
        assert!(xml.contains("<name>Tom &amp; Jerry</name>"));
        assert!(!xml.contains("<desc>"));
        assert!(xml.trim_end().ends_with("</gameList>"));
    }
}
