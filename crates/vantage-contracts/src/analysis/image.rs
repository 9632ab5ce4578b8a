const DEFAULT_MIME: &str = "image/png";

/// Embeddable image: a mime type plus base64 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self {
            mime_type: if mime_type.trim().is_empty() {
                DEFAULT_MIME.to_string()
            } else {
                mime_type.trim().to_string()
            },
            data: data.into(),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Returns the base64 body of a data URL, or the input unchanged when it has no
/// `data:...,` prefix.
pub fn strip_data_url_prefix(raw: &str) -> &str {
    if raw.starts_with("data:") {
        if let Some((_, data)) = raw.split_once(',') {
            return data;
        }
    }
    raw
}
