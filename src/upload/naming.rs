//! Destination naming
//!
//! File names are taken from the source URL; folders are caller-supplied
//! prefixes with surrounding slashes trimmed.

use reqwest::Url;

/// Name used when the URL does not yield one
pub const FALLBACK_FILENAME: &str = "file";

/// Derive the destination file name from a source URL and content type
pub fn derive_filename(source_url: &str, content_type: &str) -> String {
    let Ok(url) = Url::parse(source_url) else {
        return FALLBACK_FILENAME.to_string();
    };

    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let mut filename = match urlencoding::decode(segment) {
        Ok(decoded) if !decoded.contains('/') => decoded.into_owned(),
        _ => segment.to_string(),
    };
    if filename.is_empty() {
        filename = FALLBACK_FILENAME.to_string();
    }

    if !filename.contains('.') {
        if let Some(ext) = extension_for(content_type) {
            filename = format!("{}.{}", filename, ext);
        }
    }

    filename
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let known = match mime.as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "video/mp4" => Some("mp4"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "text/plain" => Some("txt"),
        // Says nothing about the file, so no extension
        "application/octet-stream" => return None,
        _ => None,
    };

    known.or_else(|| {
        mime_guess::get_mime_extensions_str(&mime).and_then(|exts| exts.first().copied())
    })
}

/// Strip leading and trailing `/` from a folder
pub fn normalize_folder(folder: &str) -> String {
    folder.trim_matches('/').to_string()
}

/// Object key for `filename` inside `folder`
pub fn destination_key(folder: &str, filename: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", folder, filename)
    }
}
