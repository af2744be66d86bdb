//! Mime detection and text/binary classification.
//!
//! Classification is by extension only; file contents are never sniffed.
//! Unknown extensions are treated as `text/plain` unless the name looks like
//! a known binary artifact.

use std::path::Path;

use crate::models::ContentKind;

/// Mime type for a file path, from its extension.
pub fn detect_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("md" | "markdown") => "text/markdown",
        Some("txt" | "log") => "text/plain",
        Some("rs") => "text/x-rust",
        Some("ts" | "tsx") => "text/typescript",
        Some("js" | "mjs" | "cjs" | "jsx") => "text/javascript",
        Some("py") => "text/x-python",
        Some("go") => "text/x-go",
        Some("c" | "h") => "text/x-c",
        Some("cpp" | "cc" | "hpp") => "text/x-c++",
        Some("java") => "text/x-java",
        Some("sh" | "bash" | "zsh") => "text/x-shellscript",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("yaml" | "yml") => "text/yaml",
        Some("xml") => "application/xml",
        Some("csv") => "text/csv",
        Some("rst") => "text/x-rst",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("pdf") => "application/pdf",
        Some(
            "zip" | "gz" | "tgz" | "tar" | "bz2" | "xz" | "7z" | "exe" | "dll" | "so" | "dylib"
            | "o" | "a" | "bin" | "class" | "jar" | "wasm" | "woff" | "woff2" | "ttf" | "otf"
            | "sqlite" | "db",
        ) => "application/octet-stream",
        _ => "text/plain",
    }
}

/// Whether content with this mime type must be handled as raw bytes.
pub fn is_binary_mime(mime: &str) -> bool {
    if mime == "image/svg+xml" {
        return false;
    }
    mime.starts_with("image/")
        || mime.starts_with("audio/")
        || mime.starts_with("video/")
        || mime == "application/pdf"
        || mime == "application/octet-stream"
}

pub fn content_kind(mime: &str) -> ContentKind {
    if mime.starts_with("image/") && mime != "image/svg+xml" {
        ContentKind::Image
    } else if is_binary_mime(mime) {
        ContentKind::Binary
    } else {
        ContentKind::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(detect_mime(Path::new("a/b.MD")), "text/markdown");
        assert_eq!(detect_mime(Path::new("logo.png")), "image/png");
        assert_eq!(detect_mime(Path::new("Makefile")), "text/plain");
    }

    #[test]
    fn binary_prefixes() {
        assert!(is_binary_mime("image/png"));
        assert!(is_binary_mime("application/pdf"));
        assert!(is_binary_mime("application/octet-stream"));
        assert!(!is_binary_mime("image/svg+xml"));
        assert!(!is_binary_mime("application/json"));
        assert_eq!(content_kind("image/jpeg"), ContentKind::Image);
        assert_eq!(content_kind("video/mp4"), ContentKind::Binary);
    }
}
