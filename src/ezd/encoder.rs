//! Request encoder: registration form → `RejestrujWplyw` SOAP envelope.
//!
//! Built with quick-xml's writer so every text node goes through its
//! escaper; nothing user-supplied is ever spliced into markup by hand.

use std::borrow::Cow;
use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::config::EzdConfig;
use crate::error::EzdError;
use crate::models::form::RegistrationForm;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const EZD_NS: &str = "http://ezd.gov.pl/";

/// Operation element name.
pub const REGISTER_INFLOW_OPERATION: &str = "RejestrujWplyw";
/// SOAPAction header value for the operation.
pub const REGISTER_INFLOW_ACTION: &str = "http://ezd.gov.pl/IIntegracja/RejestrujWplyw";

/// Addressee type sent with every inflow ("O" = osoba, a person).
const ADDRESSEE_TYPE: &str = "O";

const DOCUMENT_DATE_FORMAT: &str = "%Y-%m-%d";
const ARRIVAL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Encode a form as a complete `RejestrujWplyw` request document.
///
/// Office identity (CID, owner employee, owner position) comes from `config`.
/// The attachment count is the number of *selected* attachments.
pub fn encode_register_inflow(
    form: &RegistrationForm,
    config: &EzdConfig,
) -> Result<String, EzdError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);
    write_envelope(&mut writer, form, config).map_err(|e| EzdError::Encode(e.to_string()))?;
    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| EzdError::Encode(e.to_string()))
}

fn write_envelope<W: std::io::Write>(
    writer: &mut Writer<W>,
    form: &RegistrationForm,
    config: &EzdConfig,
) -> std::io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let envelope = BytesStart::new("soap:Envelope")
        .with_attributes([("xmlns:soap", SOAP_ENVELOPE_NS), ("xmlns:ezd", EZD_NS)]);
    writer.write_event(Event::Start(envelope))?;
    writer.write_event(Event::Start(BytesStart::new("soap:Body")))?;

    let operation = format!("ezd:{REGISTER_INFLOW_OPERATION}");
    writer.write_event(Event::Start(BytesStart::new(operation.as_str())))?;

    let document_date = form.document_date.format(DOCUMENT_DATE_FORMAT).to_string();
    let arrival_date = form.arrival_date.format(ARRIVAL_DATE_FORMAT).to_string();
    let cid = config.cid.to_string();
    let owner_employee = config.owner_employee_id.to_string();
    let owner_position = config.owner_position_id.to_string();
    let attachment_count = form.selected_attachment_count().to_string();
    let is_electronic = if form.is_electronic { "true" } else { "false" };

    let fields: [(&str, &str); 16] = [
        ("CID", cid.as_str()),
        ("IdPracownikaWlasciciela", owner_employee.as_str()),
        ("IdStanowiskaWlasciciela", owner_position.as_str()),
        ("AdresatNazwa", form.addressee_name.as_str()),
        ("AdresatImie", form.addressee_given_name.as_str()),
        ("AdresatNazwisko", form.addressee_family_name.as_str()),
        ("AdresatEmail", form.addressee_email.as_str()),
        ("AdresatTelefon", form.addressee_phone.as_str()),
        ("AdresatTyp", ADDRESSEE_TYPE),
        ("CzyDokumentElektroniczny", is_electronic),
        ("DataPisma", document_date.as_str()),
        ("DataWplywu", arrival_date.as_str()),
        ("SposobDostarczenia", form.delivery_method.as_str()),
        ("Tytul", form.title.as_str()),
        ("Uwagi", form.remarks.as_str()),
        ("LiczbaZalacznikow", attachment_count.as_str()),
    ];

    for (name, value) in fields {
        let value = xml_chars_only(value);
        writer
            .create_element(format!("ezd:{name}"))
            .write_text_content(BytesText::new(&value))?;
    }

    writer.write_event(Event::End(BytesEnd::new(operation.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Envelope")))?;
    Ok(())
}

/// Replace characters outside the XML 1.0 `Char` production with U+FFFD.
///
/// Escaping cannot represent them: XML 1.0 forbids them even as character
/// references.
fn xml_chars_only(value: &str) -> Cow<'_, str> {
    if value.chars().all(is_xml_char) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(
            value
                .chars()
                .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        )
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}
