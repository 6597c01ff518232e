use std::collections::HashMap;

/// Maps a file extension to a MIME type
pub trait ContentTypeResolver: Send + Sync {
    /// `extension` comes without the leading dot. `None` means unknown.
    fn lookup(&self, extension: &str) -> Option<&str>;
}

const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("7z", "application/x-7z-compressed"),
    ("aac", "audio/aac"),
    ("avi", "video/x-msvideo"),
    ("avif", "image/avif"),
    ("bin", "application/octet-stream"),
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("heic", "image/heic"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("m4a", "audio/mp4"),
    ("md", "text/markdown"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("ogg", "audio/ogg"),
    ("otf", "font/otf"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("rar", "application/vnd.rar"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain"),
    ("wasm", "application/wasm"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// Static extension table, case-insensitive, with optional overrides
#[derive(Debug, Clone)]
pub struct ContentTypeTable {
    types: HashMap<String, String>,
}

impl Default for ContentTypeTable {
    fn default() -> Self {
        let types = DEFAULT_TYPES
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { types }
    }
}

impl ContentTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with no entries; every lookup falls back to the default type
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Add or replace a mapping
    pub fn with_mapping<E: AsRef<str>, M: Into<String>>(mut self, extension: E, mime: M) -> Self {
        self.types.insert(normalize(extension.as_ref()), mime.into());
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ContentTypeResolver for ContentTypeTable {
    fn lookup(&self, extension: &str) -> Option<&str> {
        self.types.get(&normalize(extension)).map(String::as_str)
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

/// Extension of the last path segment of `key`, without the dot
pub fn extension_of(key: &str) -> Option<&str> {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Caller value first, then the extension table, then `fallback`
pub fn resolve_content_type(
    requested: Option<&str>,
    key: &str,
    resolver: &dyn ContentTypeResolver,
    fallback: &str,
) -> String {
    if let Some(requested) = requested {
        return requested.to_string();
    }
    extension_of(key)
        .and_then(|ext| resolver.lookup(ext))
        .unwrap_or(fallback)
        .to_string()
}
