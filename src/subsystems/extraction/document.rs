//! Uploaded document classification and content preparation.
//!
//! Only PDFs and PNG/JPEG images are accepted. For backends that read the
//! content, PDFs are reduced to their embedded text layer and images are
//! carried as base64 for vision requests. Backends that forward the original
//! bytes skip that step, so scans without a usable text layer still go out.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::debug;

/// Extensions accepted at the ingress.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("empty upload: {0}")]
    Empty(String),
    #[error("Error extracting PDF text: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

impl DocumentKind {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Image(fmt) => fmt.mime(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image(_) => "image",
        }
    }

    /// Classify by filename extension, falling back to magic bytes when the
    /// name carries no extension.
    pub fn detect(file_name: &str, bytes: &[u8]) -> Result<Self, DocumentError> {
        match extension(file_name) {
            Some(ext) => match ext.as_str() {
                "pdf" => Ok(Self::Pdf),
                "png" => Ok(Self::Image(ImageFormat::Png)),
                "jpg" | "jpeg" => Ok(Self::Image(ImageFormat::Jpeg)),
                _ => Err(DocumentError::Unsupported(ext)),
            },
            None => Self::sniff(bytes)
                .ok_or_else(|| DocumentError::Unsupported(file_name.to_string())),
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(Self::Pdf)
        } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(Self::Image(ImageFormat::Png))
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Image(ImageFormat::Jpeg))
        } else {
            None
        }
    }
}

/// Lowercased extension after the last dot, if any.
pub fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// `true` when the name carries one of [`ALLOWED_EXTENSIONS`].
pub fn allowed_file(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Strip directories and unsafe characters from a client-supplied filename.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars().filter(|c| *c != '\0') {
        let c = if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' };
        // Runs of dots collapse to one so `..` never survives.
        if c == '.' && cleaned.ends_with('.') {
            continue;
        }
        cleaned.push(c);
    }
    let cleaned: String = cleaned.chars().take(100).collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// A file received from the client, held in memory for the request.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Name as sent by the client; echoed back in results.
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Content ready to be placed in a model request.
#[derive(Debug, Clone)]
pub enum DocumentContent {
    /// Text layer of a PDF.
    Text(String),
    /// Base64 image payload.
    Image { mime: &'static str, base64: String },
    /// Not extracted; only the original bytes travel.
    Passthrough,
}

impl DocumentContent {
    /// `data:` URL for image content, `None` for text.
    pub fn data_url(&self) -> Option<String> {
        match self {
            Self::Image { mime, base64 } => Some(format!("data:{mime};base64,{base64}")),
            Self::Text(_) | Self::Passthrough => None,
        }
    }
}

/// An upload after classification.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub file_name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
    pub content: DocumentContent,
}

impl PreparedDocument {
    /// MIME type forwarded to the inference endpoint: the detected one, which
    /// is more reliable than whatever the browser sent.
    pub fn mime(&self) -> &'static str {
        self.kind.mime()
    }
}

/// Classify `doc` and, when `extract_content` is set, extract its
/// model-ready content. Without it the document is only classified and its
/// bytes are passed through untouched.
///
/// PDF text extraction runs on the blocking pool; a panic inside the PDF
/// parser surfaces as [`DocumentError::Pdf`].
pub async fn prepare(doc: UploadedDocument, extract_content: bool) -> Result<PreparedDocument, DocumentError> {
    if doc.bytes.is_empty() {
        return Err(DocumentError::Empty(doc.file_name));
    }
    let kind = DocumentKind::detect(&doc.file_name, &doc.bytes)?;

    let (bytes, content) = match kind {
        _ if !extract_content => (doc.bytes, DocumentContent::Passthrough),
        DocumentKind::Pdf => {
            let (bytes, text) = tokio::task::spawn_blocking(move || {
                let text = pdf_text(&doc.bytes);
                (doc.bytes, text)
            })
            .await
            .map_err(|e| DocumentError::Pdf(format!("text extraction aborted: {e}")))?;
            (bytes, DocumentContent::Text(text?))
        }
        DocumentKind::Image(fmt) => {
            let encoded = BASE64.encode(&doc.bytes);
            (doc.bytes, DocumentContent::Image { mime: fmt.mime(), base64: encoded })
        }
    };

    debug!(file_name = %doc.file_name, kind = kind.label(), size = bytes.len(), "document prepared");

    Ok(PreparedDocument { file_name: doc.file_name, kind, bytes, content })
}

/// Text layer of a PDF.
pub fn pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn detect_by_extension() {
        assert_eq!(DocumentKind::detect("a.PDF", b"").unwrap(), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::detect("scan.jpeg", b"").unwrap(),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            DocumentKind::detect("scan.jpg", b"").unwrap(),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            DocumentKind::detect("scan.png", b"").unwrap(),
            DocumentKind::Image(ImageFormat::Png)
        );
    }

    #[test]
    fn detect_rejects_other_extensions() {
        let err = DocumentKind::detect("notes.txt", b"hello").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: txt");
    }

    #[test]
    fn detect_sniffs_when_no_extension() {
        assert_eq!(DocumentKind::detect("upload", b"%PDF-1.4").unwrap(), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::detect("upload", PNG_MAGIC).unwrap(),
            DocumentKind::Image(ImageFormat::Png)
        );
        assert!(DocumentKind::detect("upload", b"plain").is_err());
    }

    #[test]
    fn allowed_file_checks_extension() {
        assert!(allowed_file("invoice.pdf"));
        assert!(allowed_file("INVOICE.JPG"));
        assert!(!allowed_file("invoice"));
        assert!(!allowed_file("invoice.gif"));
    }

    #[test]
    fn sanitize_strips_paths_and_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\inv 01.pdf"), "inv_01.pdf");
        assert_eq!(sanitize_filename("a..b.pdf"), "a.b.pdf");
        assert_eq!(sanitize_filename("invoice..pdf"), "invoice.pdf");
        assert_eq!(sanitize_filename(""), "document");
        assert_eq!(sanitize_filename("..."), "document");
    }

    #[test]
    fn sanitized_double_dot_name_keeps_extension() {
        assert!(allowed_file(&sanitize_filename("invoice..pdf")));
        assert!(allowed_file(&sanitize_filename("scan...PNG")));
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = format!("{}.pdf", "x".repeat(300));
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }

    #[tokio::test]
    async fn prepare_image_base64() {
        let doc = UploadedDocument {
            file_name: "scan.png".into(),
            content_type: Some("image/png".into()),
            bytes: PNG_MAGIC.to_vec(),
        };
        let prepared = prepare(doc, true).await.unwrap();
        assert_eq!(prepared.mime(), "image/png");
        let url = prepared.content.data_url().unwrap();
        assert_eq!(url, format!("data:image/png;base64,{}", BASE64.encode(PNG_MAGIC)));
    }

    #[tokio::test]
    async fn prepare_rejects_empty_upload() {
        let doc = UploadedDocument { file_name: "a.pdf".into(), content_type: None, bytes: vec![] };
        assert!(matches!(prepare(doc, true).await, Err(DocumentError::Empty(_))));
    }

    #[tokio::test]
    async fn prepare_invalid_pdf_errors() {
        let doc = UploadedDocument {
            file_name: "broken.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: b"not a pdf at all".to_vec(),
        };
        let err = prepare(doc, true).await.unwrap_err();
        assert!(err.to_string().starts_with("Error extracting PDF text"));
    }

    #[tokio::test]
    async fn passthrough_skips_pdf_text_extraction() {
        let bytes = b"%PDF-1.4\n% scanned page, no text layer\n".to_vec();
        let doc = UploadedDocument {
            file_name: "scan.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: bytes.clone(),
        };
        let prepared = prepare(doc, false).await.unwrap();
        assert_eq!(prepared.kind, DocumentKind::Pdf);
        assert_eq!(prepared.mime(), "application/pdf");
        assert_eq!(prepared.bytes, bytes);
        assert!(matches!(prepared.content, DocumentContent::Passthrough));
    }

    #[tokio::test]
    async fn passthrough_still_rejects_unsupported_and_empty() {
        let txt = UploadedDocument { file_name: "notes.txt".into(), content_type: None, bytes: b"hi".to_vec() };
        assert!(matches!(prepare(txt, false).await, Err(DocumentError::Unsupported(_))));
        let empty = UploadedDocument { file_name: "a.pdf".into(), content_type: None, bytes: vec![] };
        assert!(matches!(prepare(empty, false).await, Err(DocumentError::Empty(_))));
    }
}
