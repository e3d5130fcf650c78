//! `multipart/form-data` bodies for actions that carry a supporting file.

use std::path::Path;

/// Largest supporting document accepted for upload: 10 MB.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// An uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Attachment {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let content_type = content_type_for(path);
        Ok(Attachment {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Text fields plus file parts, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    files: Vec<(String, Attachment)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn file(mut self, name: &str, attachment: Attachment) -> Self {
        self.files.push((name.to_string(), attachment));
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.files.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn content_type(boundary: &str) -> String {
        format!("multipart/form-data; boundary={}", boundary)
    }

    /// Serialize the form with the given boundary.
    pub fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quoted(name)
                )
                .as_bytes(),
            );
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        for (name, attachment) in &self.files {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quoted(name),
                    escape_quoted(&attachment.file_name)
                )
                .as_bytes(),
            );
            out.extend_from_slice(
                format!("Content-Type: {}\r\n\r\n", attachment.content_type).as_bytes(),
            );
            out.extend_from_slice(&attachment.bytes);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }
}

/// Boundary unlikely to occur inside any part.
pub fn random_boundary() -> String {
    format!("lgdesk-{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

fn escape_quoted(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_then_files() {
        let form = MultipartForm::new()
            .text("new_amount", "900.00")
            .file(
                "supporting_document",
                Attachment::new("memo.pdf", "application/pdf", b"%PDF".to_vec()),
            );
        let body = String::from_utf8(form.encode("XYZ")).unwrap();

        assert!(body.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"new_amount\"\r\n\r\n900.00\r\n"));
        assert!(body.contains("filename=\"memo.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF\r\n"));
        assert!(body.ends_with("--XYZ--\r\n"));
        assert!(!body.contains("reason"));
    }

    #[test]
    fn lookups() {
        let form = MultipartForm::new()
            .text("delivery_date", "2024-05-02")
            .file("delivery_document", Attachment::new("a.png", "image/png", vec![1]));
        assert_eq!(form.field("delivery_date"), Some("2024-05-02"));
        assert_eq!(form.attachment("delivery_document").map(|a| a.bytes.len()), Some(1));
        assert!(form.field("missing").is_none());
    }

    #[test]
    fn quotes_are_escaped_in_names() {
        let form = MultipartForm::new().file(
            "doc",
            Attachment::new("we\"ird.pdf", "application/pdf", vec![]),
        );
        let body = String::from_utf8(form.encode("B")).unwrap();
        assert!(body.contains("filename=\"we\\\"ird.pdf\""));
    }

    #[test]
    fn content_type_guess() {
        assert_eq!(content_type_for(Path::new("x.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("x")), "application/octet-stream");
    }

    #[test]
    fn boundaries_differ() {
        assert_ne!(random_boundary(), random_boundary());
    }
}
