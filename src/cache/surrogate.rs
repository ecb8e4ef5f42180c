//! Surrogate-key tagging for Fastly-style edge caches.
//!
//! The edge reads two headers set by the origin:
//!
//! - `Surrogate-Key` — space-separated tags the cached object can later be
//!   purged by.
//! - `Surrogate-Control` — edge-only freshness directives, leaving
//!   `Cache-Control` for browsers.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::OriginCache;
use crate::http::{Request, Response};

/// Edge freshness directives written to `Surrogate-Control`.
///
/// All fields are seconds; `None` omits the directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub seconds: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
    pub stale_if_error: Option<u64>,
}

impl CachePolicy {
    /// Renders the `Surrogate-Control` value, or `None` when no directive is set.
    ///
    /// ```
    /// use origin_cache::cache::CachePolicy;
    ///
    /// let policy = CachePolicy { seconds: Some(86400), stale_if_error: Some(300), ..Default::default() };
    /// assert_eq!(policy.surrogate_control().as_deref(), Some("max-age=86400, stale-if-error=300"));
    /// assert_eq!(CachePolicy::default().surrogate_control(), None);
    /// ```
    pub fn surrogate_control(&self) -> Option<String> {
        let directives: Vec<String> = [
            ("max-age", self.seconds),
            ("stale-while-revalidate", self.stale_while_revalidate),
            ("stale-if-error", self.stale_if_error),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| format!("{name}={v}")))
        .collect();

        (!directives.is_empty()).then(|| directives.join(", "))
    }
}

/// An [`OriginCache`] that tags responses with surrogate keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurrogateKeyCache {
    policy: CachePolicy,
}

impl SurrogateKeyCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }
}

impl OriginCache for SurrogateKeyCache {
    /// Merges `keys` into `Surrogate-Key` (sorted, deduplicated) and writes
    /// `Surrogate-Control` when the policy has any directive.
    fn cache(&self, keys: &[String], request: &Request, response: &mut Response) {
        let mut all: BTreeSet<String> = response
            .headers()
            .get_all("surrogate-key")
            .flat_map(|value| value.split_whitespace())
            .map(str::to_owned)
            .collect();
        all.extend(keys.iter().cloned());

        let surrogate_key = all.into_iter().collect::<Vec<_>>().join(" ");
        tracing::debug!(
            path = request.path(),
            surrogate_key = %surrogate_key,
            "tagging response for origin cache"
        );
        response.headers_mut().set("Surrogate-Key", surrogate_key);

        if let Some(control) = self.policy.surrogate_control() {
            response.headers_mut().set("Surrogate-Control", control);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn tags_response_with_sorted_keys() {
        let cache = SurrogateKeyCache::default();
        let req = Request::new(Method::Get, "/");
        let mut res = Response::new(StatusCode::Ok);

        cache.cache(&keys(&["index.html", "all-html"]), &req, &mut res);

        assert_eq!(res.headers().get("surrogate-key"), Some("all-html index.html"));
        assert!(!res.headers().contains("surrogate-control"));
    }

    #[test]
    fn merges_with_existing_keys() {
        let cache = SurrogateKeyCache::default();
        let req = Request::new(Method::Get, "/project/foo/");
        let mut res = Response::new(StatusCode::Ok).header("Surrogate-Key", "project/foo all-html");

        cache.cache(&keys(&["all-html", "detail.html"]), &req, &mut res);

        assert_eq!(
            res.headers().get("surrogate-key"),
            Some("all-html detail.html project/foo")
        );
        assert_eq!(res.headers().get_all("surrogate-key").count(), 1);
    }

    #[test]
    fn writes_surrogate_control_from_policy() {
        let cache = SurrogateKeyCache::new(CachePolicy {
            seconds: Some(86400),
            stale_while_revalidate: Some(300),
            stale_if_error: Some(5 * 86400),
        });
        let req = Request::new(Method::Get, "/");
        let mut res = Response::new(StatusCode::Ok);

        cache.cache(&keys(&["all-html"]), &req, &mut res);

        assert_eq!(
            res.headers().get("surrogate-control"),
            Some("max-age=86400, stale-while-revalidate=300, stale-if-error=432000")
        );
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: CachePolicy = serde_json::from_str(r#"{"seconds": 60}"#).unwrap();
        assert_eq!(policy.seconds, Some(60));
        assert_eq!(policy.stale_while_revalidate, None);
        assert_eq!(policy.stale_if_error, None);
    }
}
