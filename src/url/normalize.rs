use url::Url;

/// Makes a product link absolute against the site origin
///
/// Links that already carry an http(s) scheme are returned unchanged.
/// Root-relative, path-relative and scheme-relative links are resolved
/// against `origin`.
///
/// # Examples
///
/// ```
/// use listing_harvester::url::absolutize_url;
/// use url::Url;
///
/// let origin = Url::parse("https://www.example.com").unwrap();
/// assert_eq!(
///     absolutize_url("/shopping/item-1.aspx", &origin),
///     "https://www.example.com/shopping/item-1.aspx"
/// );
/// assert_eq!(
///     absolutize_url("https://cdn.example.com/x", &origin),
///     "https://cdn.example.com/x"
/// );
/// ```
pub fn absolutize_url(link: &str, origin: &Url) -> String {
    if let Ok(parsed) = Url::parse(link) {
        if parsed.scheme() == "http" || parsed.scheme() == "https" {
            return link.to_string();
        }
    }

    match origin.join(link) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            tracing::debug!("Failed to join {} onto {}: {}", link, origin, e);
            format!("{}{}", origin.as_str().trim_end_matches('/'), link)
        }
    }
}

/// Normalizes a listing image URL
///
/// 1. Scheme-relative URLs (`//host/...`) get an `https:` prefix
/// 2. Everything from the first `?` onwards is dropped
///
/// Missing and empty inputs yield `None`.
pub fn normalize_image_url(image_url: Option<&str>) -> Option<String> {
    let raw = image_url.map(str::trim).filter(|s| !s.is_empty())?;

    let with_scheme = if raw.starts_with("//") {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    };

    let without_query = match with_scheme.split_once('?') {
        Some((head, _)) => head.to_string(),
        None => with_scheme,
    };

    Some(without_query)
}
