use crate::error::Result;
use crate::settings::{Settings, BRANCH_CACHE_TTL};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const PAGE_SIZE: usize = 100;
pub const DEFAULT_BRANCH: &str = "main";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of a branch listing. `error` is set when the remote call failed and
/// `branches` holds only the fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchListing {
    pub branches: Vec<String>,
    pub error: Option<String>,
}

impl BranchListing {
    fn fallback(error: String) -> Self {
        Self {
            branches: vec![DEFAULT_BRANCH.to_string()],
            error: Some(error),
        }
    }
}

#[derive(Deserialize)]
struct BranchEntry {
    name: String,
}

struct Cached {
    computed_at: Instant,
    listing: BranchListing,
}

/// Lists every branch of one GitHub repository, memoizing the result.
pub struct BranchLister {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    ttl: Duration,
    cache: Mutex<Option<Cached>>,
}

impl BranchLister {
    pub fn new(api_base: &str, owner: &str, repo: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: format!(
                "{}/repos/{owner}/{repo}/branches",
                api_base.trim_end_matches('/')
            ),
            token: token.filter(|t| !t.is_empty()),
            ttl: BRANCH_CACHE_TTL,
            cache: Mutex::new(None),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.github_api,
            &settings.owner,
            &settings.repo,
            settings.github_token.clone(),
        )
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// All branch names, "main" first if the remote list lacks it.
    ///
    /// Failures degrade to `["main"]` with the error attached. Whatever is
    /// computed is served for `ttl`; the cache lock is held across the fetch so
    /// callers arriving mid-request wait for that result instead of issuing
    /// their own.
    pub async fn list_branches(&self) -> BranchListing {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.computed_at.elapsed() < self.ttl {
                return cached.listing.clone();
            }
        }

        let listing = match self.fetch_all().await {
            Ok(names) => BranchListing {
                branches: ensure_default_branch(names),
                error: None,
            },
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "branch listing failed, using fallback");
                BranchListing::fallback(e.to_string())
            }
        };

        *cache = Some(Cached {
            computed_at: Instant::now(),
            listing: listing.clone(),
        });
        listing
    }

    async fn fetch_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page = 1u32;

        loop {
            let mut req = self
                .client
                .get(&self.url)
                .header(USER_AGENT, "deploydash")
                .header(ACCEPT, "application/vnd.github+json")
                .query(&[
                    ("per_page", PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ]);
            if let Some(token) = &self.token {
                req = req.header(AUTHORIZATION, format!("token {token}"));
            }

            let entries: Vec<BranchEntry> = req.send().await?.error_for_status()?.json().await?;
            let count = entries.len();
            names.extend(entries.into_iter().map(|b| b.name));

            // Short or empty page: last page.
            if count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        tracing::debug!(count = names.len(), pages = page, "listed branches");
        Ok(names)
    }
}

/// Insert the default branch at the front unless it is already listed.
pub fn ensure_default_branch(mut names: Vec<String>) -> Vec<String> {
    if !names.iter().any(|n| n == DEFAULT_BRANCH) {
        names.insert(0, DEFAULT_BRANCH.to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const PATH: &str = "/repos/acme/backend/branches";

    fn page_body(page: usize, count: usize) -> String {
        let entries: Vec<_> = (0..count)
            .map(|i| serde_json::json!({ "name": format!("feature/p{page}-{i}") }))
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    fn page_query(page: u32) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), page.to_string()),
        ])
    }

    fn lister(server: &mockito::ServerGuard, token: Option<&str>) -> BranchLister {
        BranchLister::new(&server.url(), "acme", "backend", token.map(String::from)).unwrap()
    }

    #[test]
    fn ensure_default_branch_inserts_at_front() {
        let out = ensure_default_branch(vec!["dev".into(), "release".into()]);
        assert_eq!(out, vec!["main", "dev", "release"]);
    }

    #[test]
    fn ensure_default_branch_does_not_duplicate() {
        let out = ensure_default_branch(vec!["dev".into(), "main".into()]);
        assert_eq!(out, vec!["dev", "main"]);
    }

    #[tokio::test]
    async fn paginates_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (page, count) in [(1u32, 100usize), (2, 100), (3, 37)] {
            mocks.push(
                server
                    .mock("GET", PATH)
                    .match_query(page_query(page))
                    .with_status(200)
                    .with_header("content-type", "application/json")
                    .with_body(page_body(page as usize, count))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }
        let page4 = server
            .mock("GET", PATH)
            .match_query(page_query(4))
            .expect(0)
            .create_async()
            .await;

        let listing = lister(&server, None).list_branches().await;

        assert!(listing.error.is_none());
        assert_eq!(listing.branches.len(), 238);
        assert_eq!(listing.branches[0], "main");
        assert_eq!(listing.branches[1], "feature/p1-0");
        assert_eq!(listing.branches.iter().filter(|b| *b == "main").count(), 1);
        for m in &mocks {
            m.assert_async().await;
        }
        page4.assert_async().await;
    }

    #[tokio::test]
    async fn empty_page_stops_pagination() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", PATH)
            .match_query(page_query(1))
            .with_status(200)
            .with_body(page_body(1, 100))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", PATH)
            .match_query(page_query(2))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let listing = lister(&server, None).list_branches().await;

        assert_eq!(listing.branches.len(), 101);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_falls_back_to_main() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let listing = lister(&server, None).list_branches().await;

        assert_eq!(listing.branches, vec!["main"]);
        assert!(listing.error.is_some());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_host_falls_back_to_main() {
        let lister = BranchLister::new("http://127.0.0.1:1", "acme", "backend", None).unwrap();
        let listing = lister.list_branches().await;
        assert_eq!(listing.branches, vec!["main"]);
        assert!(listing.error.is_some());
    }

    #[tokio::test]
    async fn token_is_sent_as_authorization_header() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .match_header("authorization", "token s3cret")
            .with_status(200)
            .with_body(r#"[{"name":"main"},{"name":"dev"}]"#)
            .expect(1)
            .create_async()
            .await;

        let listing = lister(&server, Some("s3cret")).list_branches().await;

        assert_eq!(listing.branches, vec!["main", "dev"]);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn result_is_cached_within_window() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"name":"dev"}]"#)
            .expect(1)
            .create_async()
            .await;

        let lister = lister(&server, None);
        let (a, b) = tokio::join!(lister.list_branches(), lister.list_branches());
        let c = lister.list_branches().await;

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.branches, vec!["main", "dev"]);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn fallback_is_cached_too() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(502)
            .expect(1)
            .create_async()
            .await;

        let lister = lister(&server, None);
        let first = lister.list_branches().await;
        let second = lister.list_branches().await;

        assert_eq!(first, second);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn expired_cache_refetches() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"name":"main"}]"#)
            .expect(2)
            .create_async()
            .await;

        let lister = lister(&server, None).with_ttl(Duration::ZERO);
        lister.list_branches().await;
        lister.list_branches().await;

        m.assert_async().await;
    }
}
