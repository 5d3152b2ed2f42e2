//! Utility functions for Session Vault
//!
//! Key derivation, content-type inference and path segment validation.

use crate::core::error::{Result, VaultError};

/// Content type used when the extension is unknown
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Derive the asset key from a filename: everything before the first `.`
///
/// `a.b.wav` and `a.c.wav` both map to `a`; that collision is part of the
/// addressing contract.
pub fn asset_key(filename: &str) -> &str {
    filename.split('.').next().unwrap_or(filename)
}

/// Extract the extension (after the last `.`), lowercased
pub fn get_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Infer a content type from the filename extension
pub fn mime_for_filename(filename: &str) -> &'static str {
    match get_extension(filename).as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mid" | "midi" => "audio/midi",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => DEFAULT_MIME,
    }
}

/// Reject path segments that would escape the session directory
///
/// `what` names the segment in the error message ("session", "filename").
pub fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(VaultError::invalid(format!("{} must not be empty", what)));
    }
    if value == "." || value == ".." {
        return Err(VaultError::invalid(format!("{} must not be '{}'", what, value)));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(VaultError::invalid(format!(
            "{} must not contain path separators: {}",
            what, value
        )));
    }
    Ok(())
}

/// Format file size for display
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
