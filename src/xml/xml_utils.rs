use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::io::Cursor;

use crate::core::{FacturaError, round_half_up};

pub type XmlResult = Result<String, FacturaError>;

fn xml_io(e: std::io::Error) -> FacturaError {
    FacturaError::Xml(format!("XML write error: {e}"))
}

/// Indenting writer whose text escaping matches canonical XML (see
/// [`escape_text`]).
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, FacturaError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, FacturaError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| FacturaError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, FacturaError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturaError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, FacturaError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    fn text(&mut self, text: &str) -> Result<(), FacturaError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(escape_text(text))))
            .map_err(xml_io)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, FacturaError> {
        self.start_element(name)?;
        self.text(text)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturaError> {
        self.start_element_with_attrs(name, attrs)?;
        self.text(text)?;
        self.end_element(name)
    }

    /// Write the element only when `text` is present and non-blank.
    pub fn optional_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, FacturaError> {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() => self.text_element(name, t),
            _ => Ok(self),
        }
    }

    /// Write a monetary amount with exactly 2 decimals.
    pub fn amount_element(&mut self, name: &str, amount: Decimal) -> Result<&mut Self, FacturaError> {
        self.text_element(name, &format_amount(amount))
    }

    /// Write a quantity, price or rate with 2 to 6 decimals.
    pub fn decimal_element(&mut self, name: &str, value: Decimal) -> Result<&mut Self, FacturaError> {
        self.text_element(name, &format_decimal(value))
    }
}

/// Escape character data as canonical XML writes it: `&`, `<`, `>` and `\r`.
///
/// Quotes stay literal. A raw carriage return would be folded into a line
/// feed by any parser before canonicalization, so it is written as `&#xD;`.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    let escaped = partial_escape(text);
    if escaped.contains('\r') {
        Cow::Owned(escaped.replace('\r', "&#xD;"))
    } else {
        escaped
    }
}

/// Format a monetary amount with exactly 2 decimal places (half-up).
pub fn format_amount(d: Decimal) -> String {
    let mut rounded = round_half_up(d, 2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Format a Decimal with at least 2 and at most 6 decimal places,
/// stripping trailing zeros beyond the second.
pub fn format_decimal(d: Decimal) -> String {
    let s = round_half_up(d, 6).normalize().to_string();
    if let Some(dot_pos) = s.find('.') {
        let decimals = s.len() - dot_pos - 1;
        if decimals < 2 {
            format!("{s}{}", "0".repeat(2 - decimals))
        } else {
            s
        }
    } else {
        format!("{s}.00")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_cases() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(1.5)), "1.50");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(1833.484)), "1833.48");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn format_decimal_cases() {
        assert_eq!(format_decimal(dec!(15)), "15.00");
        assert_eq!(format_decimal(dec!(2.5)), "2.50");
        assert_eq!(format_decimal(dec!(0.125)), "0.125");
        assert_eq!(format_decimal(dec!(1.1234567)), "1.123457");
        assert_eq!(format_decimal(dec!(3.000000)), "3.00");
    }

    #[test]
    fn text_escaping_leaves_quotes() {
        let mut w = XmlWriter::new().unwrap();
        w.text_element("razonSocial", "O'Brien \"&\" <Hijos>").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("<razonSocial>O'Brien \"&amp;\" &lt;Hijos&gt;</razonSocial>"));
    }

    #[test]
    fn carriage_returns_become_references() {
        assert_eq!(escape_text("Entregar en\r\nbodega 2"), "Entregar en&#xD;\nbodega 2");
        assert_eq!(escape_text("a\rb & c"), "a&#xD;b &amp; c");
        assert!(matches!(escape_text("sin cambios"), Cow::Borrowed(_)));

        let mut w = XmlWriter::new().unwrap();
        w.text_element("descripcion", "linea 1\r\nlinea 2").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("<descripcion>linea 1&#xD;\nlinea 2</descripcion>"));
        assert!(!xml.contains('\r'));
    }
}
