//! Request URL to manifest key normalization.
//!
//! Cache entries are keyed by absolute URL while the manifest lists
//! origin-relative paths. These helpers convert between the two forms.

/// Derives the manifest key for a stored cache entry URL.
///
/// Strips the origin and the slash after it; an empty remainder maps to
/// `"/"`. Returns `None` when the URL is not under the origin, which callers
/// treat as an entry with no manifest counterpart.
#[must_use]
pub fn resource_key(url: &str, origin: &str) -> Option<String> {
    let rest = if url == origin {
        ""
    } else {
        url.strip_prefix(origin)?.strip_prefix('/')?
    };
    if rest.is_empty() {
        return Some("/".to_string());
    }
    Some(rest.to_string())
}

/// Derives the manifest key for an incoming request URL.
///
/// Like [`resource_key`], but additionally drops a version query suffix
/// (`?v=...` for the default parameter name) and maps fragment navigations
/// (`origin/#...`) to `"/"`.
#[must_use]
pub fn request_key(url: &str, origin: &str, version_param: &str) -> Option<String> {
    let rest = if url == origin {
        ""
    } else {
        url.strip_prefix(origin)?.strip_prefix('/')?
    };
    let marker = format!("?{version_param}=");
    let rest = rest.split_once(marker.as_str()).map_or(rest, |(path, _)| path);
    if rest.is_empty() || rest.starts_with('#') {
        return Some("/".to_string());
    }
    Some(rest.to_string())
}

/// Builds the absolute URL for a manifest path.
#[must_use]
pub fn resource_url(origin: &str, path: &str) -> String {
    if path == "/" {
        format!("{origin}/")
    } else {
        format!("{origin}/{path}")
    }
}
