//! Tenant-wide site discovery
//!
//! Used when no scope was configured: every site the credential can see
//! becomes a target covering all of its drives.

use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, SharePointError};
use crate::graph::GraphClient;
use crate::retry::RetryingExecutor;
use crate::scope::ScopeTarget;
use crate::types::Site;

struct SiteStreamState {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
    buffer: VecDeque<Site>,
    next_link: Option<String>,
    done: bool,
    discovered: usize,
}

/// Lazily enumerates all sites of the tenant.
pub struct SiteEnumerator {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
}

impl SiteEnumerator {
    pub fn new(graph: Arc<dyn GraphClient>, retry: Arc<RetryingExecutor>) -> Self {
        Self { graph, retry }
    }

    /// Stream one whole-site target per tenant site.
    ///
    /// The next page is requested only after the previous one has been
    /// consumed. Fails with [`SharePointError::NoSitesFound`] if the last
    /// page is reached without a single site.
    pub fn targets(self) -> BoxStream<'static, Result<ScopeTarget>> {
        let state = SiteStreamState {
            graph: self.graph,
            retry: self.retry,
            buffer: VecDeque::new(),
            next_link: None,
            done: false,
            discovered: 0,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                if let Some(site) = state.buffer.pop_front() {
                    state.discovered += 1;
                    debug!(site = %site.web_url, "Discovered site");
                    return Ok(Some((ScopeTarget::site(site.web_url), state)));
                }

                if state.done {
                    if state.discovered == 0 {
                        return Err(SharePointError::NoSitesFound);
                    }
                    info!(sites = state.discovered, "Site enumeration complete");
                    return Ok(None);
                }

                let page = {
                    let graph = &state.graph;
                    let next_link = state.next_link.as_deref();
                    state
                        .retry
                        .execute("list_sites", || graph.list_sites_page(next_link))
                        .await?
                };

                state.done = page.next_link.is_none();
                state.next_link = page.next_link;
                state.buffer.extend(page.value);
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::types::{DriveItem, DriveItemsPage, DrivesPage, SitesPage};
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use std::sync::Mutex;

    struct PagedSites {
        pages: Vec<Vec<&'static str>>,
        requested: Mutex<Vec<Option<String>>>,
    }

    impl PagedSites {
        fn new(pages: Vec<Vec<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GraphClient for PagedSites {
        async fn resolve_site(&self, _site_url: &str) -> Result<Site> {
            unreachable!()
        }

        async fn list_drives_page(&self, _site_id: &str, _: Option<&str>) -> Result<DrivesPage> {
            unreachable!()
        }

        async fn list_sites_page(&self, next_link: Option<&str>) -> Result<SitesPage> {
            self.requested
                .lock()
                .unwrap()
                .push(next_link.map(str::to_string));
            let index: usize = next_link.map(|l| l.parse().unwrap()).unwrap_or(0);
            let value = self.pages[index]
                .iter()
                .map(|url| Site {
                    id: format!("id-{url}"),
                    web_url: url.to_string(),
                    display_name: None,
                })
                .collect();
            let next_link = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(SitesPage { value, next_link })
        }

        async fn get_child_by_path(&self, _: &str, _: &str, _: &str) -> Result<DriveItem> {
            unreachable!()
        }

        async fn list_children_page(
            &self,
            _: &str,
            _: &str,
            _: u32,
            _: Option<&str>,
        ) -> Result<DriveItemsPage> {
            unreachable!()
        }

        async fn get_content(&self, _: &str, _: &str) -> Result<Option<Bytes>> {
            unreachable!()
        }
    }

    fn enumerator(graph: Arc<PagedSites>) -> SiteEnumerator {
        SiteEnumerator::new(graph, Arc::new(RetryingExecutor::new(RetryPolicy::default())))
    }

    #[tokio::test]
    async fn test_all_pages_become_targets() {
        let graph = PagedSites::new(vec![
            vec!["https://t/sites/a", "https://t/sites/b"],
            vec![],
            vec!["https://t/sites/c"],
        ]);

        let targets: Vec<ScopeTarget> = enumerator(graph).targets().try_collect().await.unwrap();

        assert_eq!(
            targets,
            vec![
                ScopeTarget::site("https://t/sites/a"),
                ScopeTarget::site("https://t/sites/b"),
                ScopeTarget::site("https://t/sites/c"),
            ]
        );
    }

    #[tokio::test]
    async fn test_next_page_fetched_on_demand() {
        let graph = PagedSites::new(vec![vec!["https://t/sites/a"], vec!["https://t/sites/b"]]);
        let mut targets = enumerator(graph.clone()).targets();

        targets.next().await.unwrap().unwrap();
        assert_eq!(graph.requested.lock().unwrap().len(), 1);

        targets.next().await.unwrap().unwrap();
        assert_eq!(
            *graph.requested.lock().unwrap(),
            vec![None, Some("1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_tenant_is_fatal() {
        let graph = PagedSites::new(vec![vec![]]);

        let result: Result<Vec<ScopeTarget>> = enumerator(graph).targets().try_collect().await;

        assert!(matches!(result, Err(SharePointError::NoSitesFound)));
    }

    #[tokio::test]
    async fn test_empty_pages_with_continuation_are_fatal() {
        let graph = PagedSites::new(vec![vec![], vec![]]);

        let result: Result<Vec<ScopeTarget>> =
            enumerator(graph.clone()).targets().try_collect().await;

        assert!(matches!(result, Err(SharePointError::NoSitesFound)));
        assert_eq!(
            *graph.requested.lock().unwrap(),
            vec![None, Some("1".to_string())]
        );
    }
}
