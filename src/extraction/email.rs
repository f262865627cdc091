//! Email parsing (.eml via mail-parser, .msg via msg_parser).

use crate::core::mime::{EML_MIME_TYPE, MSG_MIME_TYPE};
use crate::error::{KreuzbergError, Result};
use crate::types::{EmailAttachment, EmailExtractionResult};
use mail_parser::{MessageParser, MimeHeaders};

/// Parse raw email bytes into the structured result.
pub fn extract_email_content(content: &[u8], mime_type: &str) -> Result<EmailExtractionResult> {
    match mime_type {
        EML_MIME_TYPE => parse_eml(content),
        MSG_MIME_TYPE => parse_msg(content),
        other => Err(KreuzbergError::validation(format!(
            "Not an email MIME type: {other}"
        ))),
    }
}

fn parse_eml(content: &[u8]) -> Result<EmailExtractionResult> {
    let message = MessageParser::default()
        .parse(content)
        .ok_or_else(|| KreuzbergError::parsing("Failed to parse EML message"))?;

    let subject = message.subject().map(|s| s.to_string());

    let (from_name, from_email) = message
        .from()
        .and_then(|address| address.first())
        .map(|addr| {
            (
                addr.name().map(|n| n.to_string()),
                addr.address().map(|a| a.to_string()),
            )
        })
        .unwrap_or((None, None));

    let collect_addresses = |address: Option<&mail_parser::Address>| -> Vec<String> {
        address
            .map(|a| a.iter().filter_map(|addr| addr.address().map(|s| s.to_string())).collect())
            .unwrap_or_default()
    };

    let to_emails = collect_addresses(message.to());
    let cc_emails = collect_addresses(message.cc());
    let bcc_emails = collect_addresses(message.bcc());

    let date = message.date().map(|d| d.to_rfc3339());
    let message_id = message.message_id().map(|s| s.to_string());

    let plain_text = message.body_text(0).map(|t| t.into_owned());
    let html_content = message.body_html(0).map(|t| t.into_owned());

    let mut attachments = Vec::new();
    for part in message.attachments() {
        let filename = part.attachment_name().map(|n| n.to_string());
        let mime_type = part
            .content_type()
            .map(|ct| format!("{}/{}", ct.ctype(), ct.subtype().unwrap_or("octet-stream")));

        let data = part.contents().to_vec();
        let is_image = mime_type.as_deref().is_some_and(|m| m.starts_with("image/"));

        attachments.push(EmailAttachment {
            name: filename.clone(),
            filename,
            mime_type,
            size: Some(data.len()),
            is_image,
            data: Some(data),
        });
    }

    Ok(EmailExtractionResult {
        subject,
        from_email,
        from_name,
        to_emails,
        cc_emails,
        bcc_emails,
        date,
        message_id,
        plain_text,
        html_content,
        attachments,
    })
}

fn parse_msg(content: &[u8]) -> Result<EmailExtractionResult> {
    let outlook = msg_parser::Outlook::from_slice(content)
        .map_err(|e| KreuzbergError::parsing(format!("Failed to parse MSG message: {e}")))?;

    let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };

    let subject = non_empty(&outlook.subject);
    let from_email = non_empty(&outlook.sender.email);
    let from_name = non_empty(&outlook.sender.name);

    let collect = |people: &[msg_parser::Person]| -> Vec<String> {
        people
            .iter()
            .filter(|p| !p.email.is_empty())
            .map(|p| p.email.clone())
            .collect()
    };

    // Outlook stores BCC as a single display string.
    let bcc_emails = non_empty(&outlook.bcc).map(|bcc| vec![bcc]).unwrap_or_default();

    let date = non_empty(&outlook.headers.date);
    let message_id = non_empty(&outlook.headers.message_id);
    let body = non_empty(&outlook.body);

    let attachments = outlook
        .attachments
        .iter()
        .map(|attachment| {
            let filename = non_empty(&attachment.file_name).or_else(|| non_empty(&attachment.display_name));
            let mime_type = non_empty(&attachment.mime_tag);
            let is_image = mime_type.as_deref().is_some_and(|m| m.starts_with("image/"));

            // MSG payloads are hex-encoded in the container.
            let data = if attachment.payload.is_empty() {
                None
            } else {
                hex::decode(&attachment.payload).ok()
            };

            EmailAttachment {
                name: non_empty(&attachment.display_name),
                filename,
                mime_type,
                size: data.as_ref().map(Vec::len),
                is_image,
                data,
            }
        })
        .collect();

    Ok(EmailExtractionResult {
        subject,
        from_email,
        from_name,
        to_emails: collect(&outlook.to),
        cc_emails: collect(&outlook.cc),
        bcc_emails,
        date,
        message_id,
        plain_text: body,
        html_content: None,
        attachments,
    })
}

/// Render the canonical plain-text document: header lines, then the body.
pub fn build_email_text_output(email: &EmailExtractionResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("Subject: {}\n", email.subject.as_deref().unwrap_or("")));

    let from_line = match (&email.from_name, &email.from_email) {
        (Some(name), Some(addr)) => format!("{name} <{addr}>"),
        (None, Some(addr)) => addr.clone(),
        (Some(name), None) => name.clone(),
        (None, None) => String::new(),
    };
    output.push_str(&format!("From: {from_line}\n"));
    output.push_str(&format!("To: {}\n", email.to_emails.join(", ")));

    if let Some(date) = &email.date {
        output.push_str(&format!("Date: {date}\n"));
    }

    output.push('\n');

    if let Some(text) = &email.plain_text {
        output.push_str(text.trim_end());
    } else if let Some(html) = &email.html_content {
        output.push_str(strip_html_tags(html).trim_end());
    }

    output
}

fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    crate::text::normalize_spaces(&result)
}
