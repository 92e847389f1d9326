//! RFC 5322 → [`EmailMessage`] conversion via mail-parser.

use chrono::{DateTime, Local, NaiveDateTime};
use mail_parser::{MessageParser, MimeHeaders};

use crate::models::email::{EmailAttachment, EmailMessage};

/// Parse a raw message. Returns `None` if the bytes are not a message at all.
///
/// The raw bytes are kept on the result for archival.
pub fn parse_message(unique_id: &str, raw: &[u8]) -> Option<EmailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let sender = parsed.from().and_then(|addr| addr.first());
    let from_email = sender
        .and_then(|a| a.address())
        .unwrap_or_default()
        .to_string();
    let from_name = sender
        .and_then(|a| a.name())
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .or_else(|| (!from_email.is_empty()).then(|| from_email.clone()))
        .unwrap_or_else(|| "Unknown".to_string());

    let subject = parsed.subject().unwrap_or("(no subject)").to_string();

    let date = parsed
        .date()
        .and_then(|d| to_local(d.to_timestamp()))
        .unwrap_or_else(|| Local::now().naive_local());

    // mail-parser synthesizes HTML for text-only messages; only take a real
    // text/html part here.
    let body = parsed
        .html_bodies()
        .find(|part| part.is_text_html())
        .and_then(|part| part.text_contents())
        .map(str::to_string)
        .or_else(|| parsed.body_text(0).map(|b| b.into_owned()))
        .unwrap_or_default();

    let attachments = parsed
        .attachments()
        .map(|part| {
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            EmailAttachment::new(
                part.attachment_name().unwrap_or("attachment"),
                part.contents().to_vec(),
                content_type,
            )
        })
        .collect();

    Some(EmailMessage {
        unique_id: unique_id.to_string(),
        from_email,
        from_name,
        subject,
        date,
        body,
        attachments,
        raw_message: Some(raw.to_vec()),
    })
}

fn to_local(timestamp: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(timestamp, 0).map(|utc| utc.with_timezone(&Local).naive_local())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    const SIMPLE: &str = "From: \"Jan Kowalski\" <jan@example.pl>\r\n\
To: kancelaria@urzad.test\r\n\
Subject: Wniosek o dowod\r\n\
Date: Tue, 05 Mar 2024 10:15:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Dzien dobry,\r\nw zalaczeniu wniosek.\r\n";

    const MULTIPART: &str = "From: urzad@example.pl\r\n\
Subject: Dokumenty\r\n\
Date: Wed, 06 Mar 2024 08:00:00 +0100\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: multipart/alternative; boundary=\"ALT\"\r\n\
\r\n\
--ALT\r\n\
Content-Type: text/plain\r\n\
\r\n\
tekst\r\n\
--ALT\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html</p>\r\n\
--ALT--\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"skan.pdf\"\r\n\
Content-Disposition: attachment; filename=\"skan.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--XYZ\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAEC\r\n\
--XYZ--\r\n";

    #[test]
    fn parses_simple_message() {
        let msg = parse_message("101", SIMPLE.as_bytes()).unwrap();
        assert_eq!(msg.unique_id, "101");
        assert_eq!(msg.from_email, "jan@example.pl");
        assert_eq!(msg.from_name, "Jan Kowalski");
        assert_eq!(msg.subject, "Wniosek o dowod");
        assert!(msg.body.starts_with("Dzien dobry,"));
        assert!(!msg.body.contains("<br"));
        assert!(msg.attachments.is_empty());
        assert_eq!(msg.raw_message.as_deref(), Some(SIMPLE.as_bytes()));

        let expected = DateTime::parse_from_rfc2822("Tue, 05 Mar 2024 10:15:00 +0000")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(msg.date, expected);
    }

    #[test]
    fn prefers_html_and_decodes_attachments() {
        let msg = parse_message("102", MULTIPART.as_bytes()).unwrap();
        assert_eq!(msg.body.trim(), "<p>html</p>");
        assert_eq!(msg.attachments.len(), 2);

        let pdf = &msg.attachments[0];
        assert_eq!(pdf.file_name, "skan.pdf");
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.content, b"%PDF-1.4");

        let unnamed = &msg.attachments[1];
        assert_eq!(unnamed.file_name, "attachment");
        assert_eq!(unnamed.content, vec![0u8, 1, 2]);
    }

    #[test]
    fn name_falls_back_to_address() {
        let msg = parse_message("103", MULTIPART.as_bytes()).unwrap();
        assert_eq!(msg.from_name, "urzad@example.pl");
        assert_eq!(msg.from_email, "urzad@example.pl");
    }

    #[test]
    fn missing_headers_get_defaults() {
        let before = Utc::now().with_timezone(&Local).naive_local();
        let raw = b"X-Custom: 1\r\n\r\nbody only\r\n";
        let msg = parse_message("104", raw).unwrap();
        assert_eq!(msg.from_name, "Unknown");
        assert_eq!(msg.from_email, "");
        assert_eq!(msg.subject, "(no subject)");
        assert!(msg.date >= before);
    }
}
