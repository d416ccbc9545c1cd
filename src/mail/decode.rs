use chrono::{DateTime, TimeZone, Utc};
use mailparse::{MailAddr, MailHeaderMap, ParsedMail};

use crate::error::{AppError, AppResult};

/// Stored bodies are capped; anything longer is cut at this many chars.
pub const MAX_BODY_CHARS: usize = 5000;

pub const NO_SUBJECT: &str = "(No Subject)";
pub const UNKNOWN_SENDER: &str = "(Unknown Sender)";
pub const UNKNOWN_RECIPIENT: &str = "(Unknown Recipient)";

/// A structured message as decoded from raw RFC822 bytes. Every field
/// has a fallback so any message that parses at all is thread-linkable.
#[derive(Debug, Clone)]
pub struct DecodedEmail {
    pub message_id: String,
    pub subject: String,
    /// Combined "Name <addr>" text of the first From address.
    pub from: String,
    /// Combined "Name <addr>" text of the first To address.
    pub to: String,
    pub date: DateTime<Utc>,
    pub body: String,
    pub in_reply_to: Option<String>,
}

pub fn decode_message(seq: u32, raw: &[u8]) -> AppResult<DecodedEmail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| AppError::Decode(e.to_string()))?;
    let headers = &parsed.headers;

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| format!("generated-{seq}-{}", Utc::now().timestamp_millis()));

    let subject = headers
        .get_first_value("Subject")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_string());

    let from = headers
        .get_first_value("From")
        .and_then(|v| first_address_text(&v))
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let to = headers
        .get_first_value("To")
        .and_then(|v| first_address_text(&v))
        .unwrap_or_else(|| UNKNOWN_RECIPIENT.to_string());

    let date = headers
        .get_first_value("Date")
        .and_then(|v| mailparse::dateparse(&v).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);

    let in_reply_to = headers
        .get_first_value("In-Reply-To")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let body = truncate_chars(&extract_body(&parsed), MAX_BODY_CHARS);

    Ok(DecodedEmail {
        message_id,
        subject,
        from,
        to,
        date,
        body,
        in_reply_to,
    })
}

/// First address of the header as "Name <addr>" (or bare addr when the
/// display name is absent). Groups are flattened to their first member.
fn first_address_text(header_value: &str) -> Option<String> {
    let addrs = mailparse::addrparse(header_value).ok()?;
    let single = addrs.iter().find_map(|a| match a {
        MailAddr::Single(info) => Some(info.clone()),
        MailAddr::Group(group) => group.addrs.first().cloned(),
    })?;
    match single.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            Some(format!("{} <{}>", name.trim(), single.addr))
        }
        _ => Some(single.addr),
    }
}

/// Plain text preferred, else HTML source, else empty. Multipart trees
/// are walked depth-first. A whitespace-only extraction counts as no
/// body at all.
fn extract_body(parsed: &ParsedMail) -> String {
    let body = find_part(parsed, "text/plain")
        .or_else(|| find_part(parsed, "text/html"))
        .unwrap_or_default();
    if body.trim().is_empty() {
        String::new()
    } else {
        body
    }
}

fn find_part(part: &ParsedMail, mimetype: &str) -> Option<String> {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
            return part.get_body().ok();
        }
        return None;
    }
    part.subparts.iter().find_map(|p| find_part(p, mimetype))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
