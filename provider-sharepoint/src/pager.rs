//! Lazy recursive listing of a drive folder
//!
//! Graph only lists the direct children of a folder, one page at a time. The
//! pager walks the folder tree depth-first and fetches the next page of a
//! folder only once the items already buffered for it have been consumed.

use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

use crate::error::Result;
use crate::graph::GraphClient;
use crate::retry::RetryingExecutor;
use crate::types::DriveItem;

/// Items requested per listing page
pub const LISTING_PAGE_SIZE: u32 = 1000;

enum Cursor {
    /// First page not requested yet
    Start,
    /// Next page available at this link
    Next(String),
    /// Every page of the folder has been fetched
    Exhausted,
}

/// One folder on the walk stack.
struct Frame {
    folder_id: String,
    cursor: Cursor,
    buffer: VecDeque<DriveItem>,
}

impl Frame {
    fn new(folder_id: String) -> Self {
        Self {
            folder_id,
            cursor: Cursor::Start,
            buffer: VecDeque::new(),
        }
    }
}

struct PagerState {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
    drive_id: String,
    page_size: u32,
    stack: Vec<Frame>,
    pages_fetched: usize,
}

/// Depth-first file listing beneath one folder of a drive.
///
/// Files are yielded in server order within each folder; a subfolder is
/// walked completely before the siblings listed after it. Folders themselves
/// are not yielded. Every yielded item carries the drive id in its parent
/// reference.
pub struct RecursiveItemPager {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
    drive_id: String,
    page_size: u32,
}

impl RecursiveItemPager {
    pub fn new(
        graph: Arc<dyn GraphClient>,
        retry: Arc<RetryingExecutor>,
        drive_id: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            retry,
            drive_id: drive_id.into(),
            page_size: LISTING_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Stream every file beneath `folder_id` (`"root"` for the drive root).
    pub fn files_under(self, folder_id: impl Into<String>) -> BoxStream<'static, Result<DriveItem>> {
        let state = PagerState {
            graph: self.graph,
            retry: self.retry,
            drive_id: self.drive_id,
            page_size: self.page_size,
            stack: vec![Frame::new(folder_id.into())],
            pages_fetched: 0,
        };

        stream::try_unfold(state, |mut state| async move {
            loop {
                let Some(frame) = state.stack.last_mut() else {
                    trace!(pages = state.pages_fetched, "Drive listing complete");
                    return Ok(None);
                };

                if let Some(mut item) = frame.buffer.pop_front() {
                    if item.is_folder() {
                        state.stack.push(Frame::new(item.id));
                        continue;
                    }
                    if !item.is_file() {
                        continue;
                    }
                    if item.parent_reference.drive_id.is_none() {
                        item.parent_reference.drive_id = Some(state.drive_id.clone());
                    }
                    return Ok(Some((item, state)));
                }

                if matches!(frame.cursor, Cursor::Exhausted) {
                    state.stack.pop();
                    continue;
                }

                let next_link = match &frame.cursor {
                    Cursor::Next(link) => Some(link.clone()),
                    _ => None,
                };

                let folder_id = frame.folder_id.clone();
                let page = {
                    let graph = &state.graph;
                    let drive_id = state.drive_id.as_str();
                    let page_size = state.page_size;
                    state
                        .retry
                        .execute("list_children", || {
                            graph.list_children_page(
                                drive_id,
                                &folder_id,
                                page_size,
                                next_link.as_deref(),
                            )
                        })
                        .await?
                };
                state.pages_fetched += 1;

                if let Some(frame) = state.stack.last_mut() {
                    frame.buffer.extend(page.value);
                    frame.cursor = match page.next_link {
                        Some(link) => Cursor::Next(link),
                        None => Cursor::Exhausted,
                    };
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharePointError;
    use crate::retry::RetryPolicy;
    use crate::types::{DriveItemsPage, FileFacet, FolderFacet, ItemReference};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use futures::TryStreamExt;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::types::{DrivesPage, Site, SitesPage};

    fn file(id: &str) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: format!("{id}.txt"),
            size: Some(10),
            last_modified_date_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            web_url: None,
            parent_reference: ItemReference::default(),
            last_modified_by: None,
            file: Some(FileFacet::default()),
            folder: None,
        }
    }

    fn folder(id: &str) -> DriveItem {
        DriveItem {
            file: None,
            folder: Some(FolderFacet::default()),
            ..file(id)
        }
    }

    /// Pages keyed by (folder id, page index); page index n links to n+1.
    #[derive(Default)]
    struct PagedFolders {
        pages: HashMap<(String, usize), Vec<DriveItem>>,
        last_page: HashMap<String, usize>,
        requests: Mutex<Vec<String>>,
        fail_folder: Option<String>,
    }

    impl PagedFolders {
        fn page(mut self, folder_id: &str, index: usize, items: Vec<DriveItem>) -> Self {
            self.pages.insert((folder_id.to_string(), index), items);
            let last = self.last_page.entry(folder_id.to_string()).or_insert(0);
            *last = (*last).max(index);
            self
        }
    }

    #[async_trait]
    impl GraphClient for PagedFolders {
        async fn resolve_site(&self, _site_url: &str) -> Result<Site> {
            unreachable!()
        }

        async fn list_drives_page(&self, _site_id: &str, _: Option<&str>) -> Result<DrivesPage> {
            unreachable!()
        }

        async fn list_sites_page(&self, _next_link: Option<&str>) -> Result<SitesPage> {
            unreachable!()
        }

        async fn get_child_by_path(&self, _: &str, _: &str, _: &str) -> Result<DriveItem> {
            unreachable!()
        }

        async fn list_children_page(
            &self,
            _drive_id: &str,
            folder_id: &str,
            page_size: u32,
            next_link: Option<&str>,
        ) -> Result<DriveItemsPage> {
            assert_eq!(page_size, LISTING_PAGE_SIZE);
            let index = next_link
                .and_then(|link| link.rsplit('=').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0usize);
            self.requests
                .lock()
                .unwrap()
                .push(format!("{folder_id}#{index}"));

            if self.fail_folder.as_deref() == Some(folder_id) {
                return Err(SharePointError::Api {
                    status: 403,
                    message: "accessDenied".to_string(),
                    retry_after: None,
                });
            }

            let value = self
                .pages
                .get(&(folder_id.to_string(), index))
                .cloned()
                .unwrap_or_default();
            let last = self.last_page.get(folder_id).copied().unwrap_or(0);
            let next_link = (index < last).then(|| format!("next?folder={folder_id}&page={}", index + 1));

            Ok(DriveItemsPage { value, next_link })
        }

        async fn get_content(&self, _: &str, _: &str) -> Result<Option<Bytes>> {
            unreachable!()
        }
    }

    fn pager(graph: Arc<PagedFolders>) -> RecursiveItemPager {
        RecursiveItemPager::new(
            graph,
            Arc::new(RetryingExecutor::new(RetryPolicy::default())),
            "drive-1",
        )
    }

    #[tokio::test]
    async fn test_depth_first_server_order() {
        let graph = Arc::new(
            PagedFolders::default()
                .page("root", 0, vec![file("a"), folder("sub"), file("b")])
                .page("sub", 0, vec![file("c"), folder("deeper")])
                .page("deeper", 0, vec![file("d")])
                .page("root", 1, vec![file("e")]),
        );

        let ids: Vec<String> = pager(graph)
            .files_under("root")
            .map_ok(|item| item.id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids, vec!["a", "c", "d", "b", "e"]);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_lazily() {
        let graph = Arc::new(
            PagedFolders::default()
                .page("root", 0, vec![file("a")])
                .page("root", 1, vec![file("b")]),
        );

        let mut items = pager(graph.clone()).files_under("root");
        let first = items.next().await.unwrap().unwrap();

        assert_eq!(first.id, "a");
        assert_eq!(*graph.requests.lock().unwrap(), vec!["root#0"]);

        let second = items.next().await.unwrap().unwrap();
        assert_eq!(second.id, "b");
        assert_eq!(*graph.requests.lock().unwrap(), vec!["root#0", "root#1"]);
        assert!(items.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drive_id_is_filled_in() {
        let graph = Arc::new(PagedFolders::default().page("root", 0, vec![file("a")]));

        let items: Vec<DriveItem> = pager(graph)
            .files_under("root")
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items[0].drive_id(), Some("drive-1"));
    }

    #[tokio::test]
    async fn test_failure_surfaces_after_earlier_items() {
        let graph = Arc::new(PagedFolders {
            fail_folder: Some("locked".to_string()),
            ..PagedFolders::default()
                .page("root", 0, vec![file("a"), folder("locked"), file("b")])
        });

        let results: Vec<Result<DriveItem>> = pager(graph).files_under("root").collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().id, "a");
        assert_eq!(results[1].as_ref().unwrap_err().status(), Some(403));
    }
}
