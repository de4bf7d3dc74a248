use url::Url;

// Post permalinks on the collected platform redirect to themselves; the
// only thing to remove is share tracking.
const CANONICAL_POST_HOSTS: &[&str] = &["twitter.com", "www.twitter.com", "x.com"];
const TRACKING_PARAMS: &[&str] = &["s", "t"];

/// Resolve a canonical short-post URL locally, without a network call, by
/// stripping known tracking query parameters. Returns `None` for any URL
/// that is not a post permalink.
pub fn resolve_locally(link: &str) -> Option<String> {
    let mut parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    if !CANONICAL_POST_HOSTS.contains(&host) || !parsed.path().contains("/status/") {
        return None;
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{key}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }

    Some(parsed.to_string())
}
