//! IMAP mailbox: fetch recent messages and delete by UID.
//!
//! A small blocking IMAP4rev1 client over TLS (rustls) or plain TCP. Each
//! operation opens its own connection inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::config::MailboxConfig;
use crate::error::MailboxError;
use crate::mailbox::MailboxProvider;
use crate::mailbox::mime::parse_message;
use crate::models::email::EmailMessage;

const INBOX: &str = "INBOX";
const IO_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 8192;

// ── Provider ────────────────────────────────────────────────────────

/// Mailbox provider backed by an IMAP server.
pub struct ImapMailbox {
    config: MailboxConfig,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailboxProvider for ImapMailbox {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn fetch_recent(&self, count: usize) -> Result<Vec<EmailMessage>, MailboxError> {
        if !self.is_configured() {
            warn!("Mailbox is not configured; set MAILBOX_IMAP_HOST, MAILBOX_USERNAME and MAILBOX_PASSWORD");
            return Ok(Vec::new());
        }
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_recent_blocking(&cfg, count))
            .await
            .map_err(|e| MailboxError::Io(std::io::Error::other(e)))?
    }

    async fn delete(&self, unique_id: &str) -> Result<bool, MailboxError> {
        if !self.is_configured() {
            warn!("Mailbox is not configured");
            return Ok(false);
        }
        let Ok(uid) = unique_id.trim().parse::<u32>() else {
            warn!("Refusing to delete non-numeric UID {unique_id}");
            return Ok(false);
        };
        let cfg = self.config.clone();
        tokio::task::spawn_blocking(move || delete_blocking(&cfg, uid))
            .await
            .map_err(|e| MailboxError::Io(std::io::Error::other(e)))?
    }
}

fn fetch_recent_blocking(
    config: &MailboxConfig,
    count: usize,
) -> Result<Vec<EmailMessage>, MailboxError> {
    let mut session = connect(config)?;
    session.login(&config.username, config.password.expose_secret())?;
    session.examine(INBOX)?;

    let uids = session.uid_search_all()?;
    info!("Connected to IMAP. Inbox has {} messages", uids.len());

    let mut emails = Vec::new();
    for uid in most_recent(&uids, count) {
        match session.uid_fetch_message(uid) {
            Ok(Some(raw)) => match parse_message(&uid.to_string(), &raw) {
                Some(email) => emails.push(email),
                None => warn!("Could not parse message UID {uid}"),
            },
            Ok(None) => warn!("Server returned no body for UID {uid}"),
            Err(e @ MailboxError::Protocol { .. }) => {
                error!("Error processing message UID {uid}: {e}");
            }
            Err(e) => return Err(e),
        }
    }

    session.logout();
    Ok(emails)
}

fn delete_blocking(config: &MailboxConfig, uid: u32) -> Result<bool, MailboxError> {
    let mut session = connect(config)?;
    session.login(&config.username, config.password.expose_secret())?;
    session.select(INBOX)?;
    session.uid_mark_deleted(uid)?;
    session.expunge()?;
    session.logout();

    info!("Email UID {uid} deleted successfully");
    Ok(true)
}

/// The last `count` UIDs in ascending order, returned newest first.
pub fn most_recent(uids: &[u32], count: usize) -> Vec<u32> {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.into_iter().rev().take(count).collect()
}

// ── Connection ──────────────────────────────────────────────────────

/// TCP stream, optionally wrapped in TLS.
pub enum ImapStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for ImapStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for ImapStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}

fn connect(config: &MailboxConfig) -> Result<ImapSession<ImapStream>, MailboxError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).map_err(|e| {
        MailboxError::Connect {
            host: config.host.clone(),
            port: config.port,
            reason: e.to_string(),
        }
    })?;
    tcp.set_read_timeout(Some(IO_TIMEOUT))?;
    tcp.set_write_timeout(Some(IO_TIMEOUT))?;

    let stream = if config.use_tls {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| MailboxError::Tls(e.to_string()))?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = ClientConnection::new(Arc::new(tls_config), server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        ImapStream::Tls(Box::new(StreamOwned::new(conn, tcp)))
    } else {
        ImapStream::Plain(tcp)
    };

    let mut session = ImapSession::new(stream);
    session.read_greeting()?;
    debug!("IMAP connected to {}:{}", config.host, config.port);
    Ok(session)
}

// ── Session ─────────────────────────────────────────────────────────

/// One untagged server response, with any literals it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Untagged {
    pub text: String,
    pub literals: Vec<Vec<u8>>,
}

/// Blocking IMAP command/response loop over any byte stream.
pub struct ImapSession<S> {
    stream: S,
    buf: Vec<u8>,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            next_tag: 1,
        }
    }

    pub fn read_greeting(&mut self) -> Result<String, MailboxError> {
        let (greeting, _) = self.read_logical_line()?;
        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(greeting)
        } else {
            Err(MailboxError::Protocol {
                command: "greeting".into(),
                reason: greeting,
            })
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        let cmd = format!("LOGIN {} {}", quote(username), quote(password));
        match self.command(&cmd) {
            Ok(_) => Ok(()),
            Err(MailboxError::Protocol { .. }) => Err(MailboxError::Auth {
                username: username.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Open a mailbox read-only.
    pub fn examine(&mut self, mailbox: &str) -> Result<(), MailboxError> {
        self.command(&format!("EXAMINE {}", quote(mailbox))).map(|_| ())
    }

    /// Open a mailbox read-write.
    pub fn select(&mut self, mailbox: &str) -> Result<(), MailboxError> {
        self.command(&format!("SELECT {}", quote(mailbox))).map(|_| ())
    }

    pub fn uid_search_all(&mut self) -> Result<Vec<u32>, MailboxError> {
        let responses = self.command("UID SEARCH ALL")?;
        Ok(responses
            .iter()
            .filter_map(|r| r.text.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace().filter_map(|n| n.parse().ok()))
            .collect())
    }

    /// Full RFC 5322 source of a message, without setting `\Seen`.
    pub fn uid_fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailboxError> {
        let responses = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        Ok(responses
            .into_iter()
            .filter(|r| r.text.contains("FETCH"))
            .find_map(|r| r.literals.into_iter().next()))
    }

    pub fn uid_mark_deleted(&mut self, uid: u32) -> Result<(), MailboxError> {
        self.command(&format!("UID STORE {uid} +FLAGS.SILENT (\\Deleted)"))
            .map(|_| ())
    }

    pub fn expunge(&mut self) -> Result<(), MailboxError> {
        self.command("EXPUNGE").map(|_| ())
    }

    /// Best-effort LOGOUT; errors are ignored.
    pub fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!("IMAP logout: {e}");
        }
    }

    /// Send one tagged command and collect untagged responses until the
    /// tagged completion. Non-OK completion is a protocol error.
    fn command(&mut self, cmd: &str) -> Result<Vec<Untagged>, MailboxError> {
        let tag = format!("A{:03}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let prefix = format!("{tag} ");
        let mut untagged = Vec::new();
        loop {
            let (text, literals) = self.read_logical_line()?;
            if let Some(rest) = text.strip_prefix(&prefix) {
                let (status, reason) = rest.split_once(' ').unwrap_or((rest, ""));
                if status.eq_ignore_ascii_case("OK") {
                    return Ok(untagged);
                }
                return Err(MailboxError::Protocol {
                    command: command_name(cmd),
                    reason: format!("{status} {reason}").trim().to_string(),
                });
            }
            untagged.push(Untagged { text, literals });
        }
    }

    /// Read a response line, pulling in any `{n}` literals it announces.
    fn read_logical_line(&mut self) -> Result<(String, Vec<Vec<u8>>), MailboxError> {
        let mut text = String::new();
        let mut literals = Vec::new();
        loop {
            let line = self.read_line()?;
            text.push_str(&line);
            match literal_length(&line) {
                Some(len) => literals.push(self.read_bytes(len)?),
                None => return Ok((text, literals)),
            }
        }
    }

    /// One CRLF-terminated line, without the CRLF.
    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut searched = 0;
        loop {
            if let Some(pos) = self.buf[searched..].windows(2).position(|w| w == b"\r\n") {
                let end = searched + pos;
                let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
                self.buf.drain(..end + 2);
                return Ok(line);
            }
            searched = self.buf.len().saturating_sub(1);
            self.fill()?;
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, MailboxError> {
        while self.buf.len() < len {
            self.fill()?;
        }
        Ok(self.buf.drain(..len).collect())
    }

    fn fill(&mut self) -> Result<(), MailboxError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut chunk)?;
        if n == 0 {
            return Err(MailboxError::Protocol {
                command: "read".into(),
                reason: "connection closed by server".into(),
            });
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}

/// `{123}` (or `{123+}`) at the end of a line announces a literal.
fn literal_length(line: &str) -> Option<usize> {
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].trim_end_matches('+').parse().ok()
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Command verb for error messages; never includes arguments (passwords).
fn command_name(cmd: &str) -> String {
    let mut words = cmd.split_whitespace();
    match words.next() {
        Some("UID") => format!("UID {}", words.next().unwrap_or_default()),
        Some(verb) => verb.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// In-memory stream: scripted server output, captured client input.
    struct ScriptedStream {
        server: Cursor<Vec<u8>>,
        client: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(script: &[u8]) -> Self {
            Self {
                server: Cursor::new(script.to_vec()),
                client: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            // Dribble a few bytes at a time to exercise buffering.
            let max = buf.len().min(7);
            self.server.read(&mut buf[..max])
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.client.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn session(script: &str) -> ImapSession<ScriptedStream> {
        ImapSession::new(ScriptedStream::new(script.as_bytes()))
    }

    fn sent(session: &ImapSession<ScriptedStream>) -> String {
        String::from_utf8(session.stream.client.clone()).unwrap()
    }

    #[test]
    fn fetch_flow_reads_literal_body() {
        let message = "From: a@b.pl\r\nSubject: Hej\r\n\r\nTresc {5}\r\n";
        let script = format!(
            "* OK IMAP4rev1 ready\r\n\
             A001 OK LOGIN completed\r\n\
             * 3 EXISTS\r\n\
             A002 OK [READ-ONLY] EXAMINE completed\r\n\
             * SEARCH 4 9 12\r\n\
             A003 OK SEARCH completed\r\n\
             * 3 FETCH (UID 12 BODY[] {{{}}}\r\n{})\r\n\
             A004 OK FETCH completed\r\n",
            message.len(),
            message
        );
        let mut s = session(&script);

        assert!(s.read_greeting().unwrap().starts_with("* OK"));
        s.login("kancelaria", "pa\"ss").unwrap();
        s.examine(INBOX).unwrap();
        assert_eq!(s.uid_search_all().unwrap(), vec![4, 9, 12]);
        let raw = s.uid_fetch_message(12).unwrap().unwrap();
        assert_eq!(raw, message.as_bytes());

        let sent = sent(&s);
        assert!(sent.contains("A001 LOGIN \"kancelaria\" \"pa\\\"ss\"\r\n"));
        assert!(sent.contains("A002 EXAMINE \"INBOX\"\r\n"));
        assert!(sent.contains("A003 UID SEARCH ALL\r\n"));
        assert!(sent.contains("A004 UID FETCH 12 BODY.PEEK[]\r\n"));
    }

    #[test]
    fn login_rejection_is_auth_error() {
        let mut s = session("* OK ready\r\nA001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n");
        s.read_greeting().unwrap();
        let err = s.login("user", "wrong").unwrap_err();
        assert!(matches!(err, MailboxError::Auth { ref username } if username == "user"));
        assert!(!err.to_string().contains("wrong"));
    }

    #[test]
    fn bad_greeting_is_rejected() {
        let mut s = session("* BYE go away\r\n");
        assert!(matches!(s.read_greeting(), Err(MailboxError::Protocol { .. })));
    }

    #[test]
    fn failed_command_reports_verb_and_reason() {
        let mut s = session("A001 NO [NONEXISTENT] Unknown mailbox\r\n");
        let err = s.select("Missing").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("SELECT"));
        assert!(text.contains("Unknown mailbox"));
    }

    #[test]
    fn delete_sends_store_and_expunge() {
        let mut s = session(
            "A001 OK STORE completed\r\n* 2 EXPUNGE\r\nA002 OK EXPUNGE completed\r\n* BYE\r\nA003 OK LOGOUT completed\r\n",
        );
        s.uid_mark_deleted(55).unwrap();
        s.expunge().unwrap();
        s.logout();
        let sent = sent(&s);
        assert!(sent.contains("A001 UID STORE 55 +FLAGS.SILENT (\\Deleted)\r\n"));
        assert!(sent.contains("A002 EXPUNGE\r\n"));
        assert!(sent.contains("A003 LOGOUT\r\n"));
    }

    #[test]
    fn closed_connection_is_an_error() {
        let mut s = session("* SEARCH 1 2");
        assert!(s.uid_search_all().is_err());
    }

    #[test]
    fn fetch_without_literal_returns_none() {
        let mut s = session("* 1 FETCH (UID 3 FLAGS ())\r\nA001 OK done\r\n");
        assert_eq!(s.uid_fetch_message(3).unwrap(), None);
    }

    #[test]
    fn literal_length_detection() {
        assert_eq!(literal_length("* 1 FETCH (BODY[] {342}"), Some(342));
        assert_eq!(literal_length("* 1 FETCH (BODY[] {12+}"), Some(12));
        assert_eq!(literal_length("A1 OK done"), None);
        assert_eq!(literal_length("weird }"), None);
    }

    #[test]
    fn most_recent_is_newest_first() {
        assert_eq!(most_recent(&[5, 1, 9, 3], 2), vec![9, 5]);
        assert_eq!(most_recent(&[1, 2], 10), vec![2, 1]);
        assert!(most_recent(&[], 3).is_empty());
        assert!(most_recent(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    fn command_name_hides_arguments() {
        assert_eq!(command_name("LOGIN \"u\" \"secret\""), "LOGIN");
        assert_eq!(command_name("UID FETCH 3 BODY.PEEK[]"), "UID FETCH");
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[tokio::test]
    async fn unconfigured_provider_does_nothing() {
        let mailbox = ImapMailbox::new(MailboxConfig::default());
        assert!(!mailbox.is_configured());
        assert!(mailbox.fetch_recent(10).await.unwrap().is_empty());
        assert!(!mailbox.delete("12").await.unwrap());
    }
}
