// URL normalisation, resolution and file naming

use crate::error::{Result, ScanError};
use crate::result::ResourceType;
use url::Url;

/// Normalize user input into an absolute https URL.
///
/// `http://` is upgraded to `https://`, input without any scheme separator gets
/// `https://` prepended, and every other scheme is left untouched.
pub fn normalize(input: &str) -> Result<Url> {
    let trimmed = input.trim();

    let candidate = if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("https://{}", rest)
    } else if !trimmed.contains("://") {
        format!("https://{}", trimmed)
    } else {
        trimmed.to_string()
    };

    Url::parse(&candidate).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", trimmed, e)))
}

/// Resolve a reference found in a page against the page URL.
///
/// Returns `None` for empty references and for anything that does not resolve
/// to an http(s) URL (data:, javascript:, mailto:, blob:, ...).
pub fn resolve(base: &Url, relative: &str) -> Option<String> {
    let trimmed = relative.trim();
    if trimmed.is_empty() {
        return None;
    }

    let resolved = if trimmed.starts_with("//") {
        Url::parse(&format!("{}:{}", base.scheme(), trimmed)).ok()?
    } else {
        base.join(trimmed).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        _ => None,
    }
}

/// Derive a display file name from a resource URL.
pub fn file_name(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.rsplit('/').next().unwrap_or(url).to_string();
    };

    let path = parsed.path();
    if path.is_empty() || path == "/" {
        return format!("{}.html", parsed.host_str().unwrap_or("index"));
    }

    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "index.html".to_string(),
    }
}

/// Classify a resource by the extension of its file name.
pub fn resource_type(url: &str) -> ResourceType {
    let name = file_name(url).to_lowercase();
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension {
        "html" | "htm" => ResourceType::Html,
        "css" => ResourceType::Css,
        "js" => ResourceType::Js,
        "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" | "ico" | "bmp" => ResourceType::Image,
        "mp4" | "webm" | "ogg" | "avi" | "mov" => ResourceType::Video,
        "mp3" | "wav" | "m4a" => ResourceType::Audio,
        "woff" | "woff2" | "ttf" | "eot" | "otf" => ResourceType::Font,
        _ => ResourceType::Other,
    }
}
