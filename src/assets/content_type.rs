//! Content type lookup for release assets

use std::path::Path;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Detect the MIME type of an asset from its file name
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();

    // Compound extensions first
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        return "application/gzip";
    }
    if lower.ends_with(".tar.xz") {
        return "application/x-xz";
    }

    let extension = Path::new(&lower)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    match extension {
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "7z" => "application/x-7z-compressed",
        "deb" => "application/vnd.debian.binary-package",
        "rpm" => "application/x-rpm",
        "exe" | "msi" | "dll" => "application/x-msdownload",
        "dmg" => "application/x-apple-diskimage",
        "appimage" => "application/x-executable",
        "jar" => "application/java-archive",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "txt" | "sha256" | "sig" | "asc" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
