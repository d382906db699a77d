use url::Url;

/// Resolves an `href`/`src` attribute against the page it was found on
///
/// Protocol-relative links get `https:`. Fragments, `javascript:` and
/// `data:` links resolve to nothing.
///
/// # Examples
///
/// ```
/// use manga_conduit::url::absolutize;
///
/// let url = absolutize("/manga/one-piece", "https://mangahub.us/search?q=x").unwrap();
/// assert_eq!(url, "https://mangahub.us/manga/one-piece");
/// ```
pub fn absolutize(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }

    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return Url::parse(href).ok().map(String::from);
    }

    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

/// Turns an image reference found in a script into a fully qualified URL
///
/// Accepts absolute URLs, protocol-relative `//host/path` and bare
/// `host.tld/path` forms; the latter two become HTTPS.
pub fn normalize_image_url(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return None;
    }

    let candidate = if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_string()
    } else if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        let host = raw.split('/').next().unwrap_or("");
        if !host.contains('.') || host.starts_with('.') {
            return None;
        }
        format!("https://{}", raw)
    };

    Url::parse(&candidate).ok().map(String::from)
}

/// Joins a base URL and a path with exactly one slash between them
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Last non-empty path segment of a URL, e.g. the slug of `/manga/berserk/`
pub fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Removes query and fragment, used as a de-duplication key
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_string(),
    }
}
