use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const IMAGE_HEADER_FORMAT: &str = "IMAGE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub to_name: String,
    pub to_number: String,
    pub message_template_id: String,
    pub channel_integration_id: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderSection>,

    pub body: Vec<BodyParam>,
}

impl Parameters {
    /// Appends one positional body parameter; the provider substitutes it
    /// into the template by position.
    pub fn push_body(&mut self, name: &str, value_text: impl Into<String>) {
        let position = (self.body.len() + 1).to_string();
        self.body.push(BodyParam {
            key: position,
            value: name.to_string(),
            value_text: value_text.into(),
        });
    }

    pub fn set_image_header(&mut self, url: String, filename: String) {
        self.header = Some(HeaderSection {
            format: IMAGE_HEADER_FORMAT.to_string(),
            params: vec![
                HeaderParam {
                    key: "url".to_string(),
                    value: url,
                },
                HeaderParam {
                    key: "filename".to_string(),
                    value: filename,
                },
            ],
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyParam {
    pub key: String,
    pub value: String,
    pub value_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderSection {
    pub format: String,
    pub params: Vec<HeaderParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderParam {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse<T> {
    pub status: Option<String>,
    pub data: Option<T>,
    pub error: Option<ProviderError>,
}

impl<T> ProviderResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastData {
    pub id: Option<String>,
    pub send_at: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: Option<i64>,

    #[serde(default)]
    pub messages: Vec<JsonValue>,
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.code {
            Some(code) => write!(f, "code {}", code)?,
            None => write!(f, "no code")?,
        }
        if !self.messages.is_empty() {
            let messages = self
                .messages
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, ": {}", messages)?;
        }
        Ok(())
    }
}
