//! Email message extractor (.eml, .msg).

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::{DocumentExtractor, Plugin};
use crate::types::{EmailMetadata, ExtractedImage, ExtractionResult, Metadata};
use async_trait::async_trait;

pub struct EmailExtractor;

impl Default for EmailExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for EmailExtractor {
    fn name(&self) -> &str {
        "email-extractor"
    }

    fn description(&self) -> &str {
        "Extracts headers, body, and attachments from email messages"
    }
}

#[async_trait]
impl DocumentExtractor for EmailExtractor {
    async fn extract_bytes(
        &self,
        content: &[u8],
        mime_type: &str,
        config: &ExtractionConfig,
    ) -> Result<ExtractionResult> {
        let email = crate::extraction::email::extract_email_content(content, mime_type)?;
        let text = crate::extraction::email::build_email_text_output(&email);

        let attachment_names: Vec<String> = email
            .attachments
            .iter()
            .filter_map(|a| a.filename.clone().or_else(|| a.name.clone()))
            .collect();

        let mut result = ExtractionResult::new(text, "text/plain");
        result.metadata = Metadata {
            subject: email.subject.clone(),
            date: email.date.clone(),
            email: Some(EmailMetadata {
                from_email: email.from_email.clone(),
                from_name: email.from_name.clone(),
                to_emails: email.to_emails.clone(),
                cc_emails: email.cc_emails.clone(),
                bcc_emails: email.bcc_emails.clone(),
                message_id: email.message_id.clone(),
                attachments: attachment_names,
            }),
            ..Default::default()
        };

        // Binary image attachments surface in `images` when configured,
        // bounded by the per-image byte cap.
        if let Some(image_config) = &config.images {
            if image_config.extract_images {
                for (index, attachment) in email.attachments.iter().enumerate() {
                    if !attachment.is_image {
                        continue;
                    }
                    let Some(data) = &attachment.data else {
                        continue;
                    };

                    if data.len() > image_config.max_image_bytes {
                        tracing::warn!(
                            attachment = index,
                            size = data.len(),
                            cap = image_config.max_image_bytes,
                            "skipping oversized image attachment"
                        );
                        result.metadata.additional.insert(
                            format!("attachment_{index}_skipped"),
                            serde_json::json!({
                                "reason": "memory_limit",
                                "size": data.len(),
                                "max_image_bytes": image_config.max_image_bytes,
                            }),
                        );
                        continue;
                    }

                    let format = attachment
                        .mime_type
                        .as_deref()
                        .and_then(|m| m.split('/').nth(1))
                        .unwrap_or("bin")
                        .to_string();

                    result.images.push(ExtractedImage {
                        data: data.clone(),
                        format,
                        filename: attachment
                            .filename
                            .clone()
                            .or_else(|| Some(format!("attachment_image_{}", index + 1))),
                        page_number: None,
                        dimensions: None,
                        description: None,
                    });
                }
            }
        }

        Ok(result)
    }

    fn supported_mime_types(&self) -> &[&str] {
        &["message/rfc822", "application/vnd.ms-outlook"]
    }
}
