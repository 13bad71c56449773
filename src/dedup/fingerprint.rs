//! Request fingerprinting.
//!
//! A fingerprint is `METHOD url?query [#body]` where the query pairs are
//! stable-sorted by key and the body is canonical JSON. It is pure: no
//! clocks, no request IDs, no headers.

use std::fmt;
use url::form_urlencoded;

use crate::error::TransportError;
use crate::http::request::{resolve_url, RequestDescriptor};

/// Stable cache key for a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `request` as it would be sent against `base`.
pub fn fingerprint(request: &RequestDescriptor, base: &url::Url) -> Result<Fingerprint, TransportError> {
    let mut url = resolve_url(base, &request.url)?;

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.extend(request.query.iter().cloned());
    // Stable: repeated keys keep their relative order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    url.set_query(None);
    url.set_fragment(None);

    let mut key = format!("{} {}", request.method, url);
    if !pairs.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        key.push('?');
        key.push_str(&query);
    }
    if let Some(body) = &request.body {
        // serde_json's default map is ordered, so logically equal bodies
        // serialize identically.
        key.push_str(" #");
        key.push_str(&body.to_string());
    }

    Ok(Fingerprint(key))
}
