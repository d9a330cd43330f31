//! Drive and folder traversal for one scope target
//!
//! For a [`ScopeTarget`] the traverser resolves the site, picks the requested
//! drives, descends to the requested folder, and streams every file beneath
//! it that passes the folder and time-window filters, paired with the
//! container label reported in document metadata.
//!
//! Failure policy:
//! - site resolution rejected as forbidden, not found, or bad credential:
//!   fatal, surfaced to the caller
//! - any other site failure: logged, target yields nothing
//! - any failure inside one drive: logged, the rest of that drive is skipped

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{Result, SharePointError};
use crate::graph::GraphClient;
use crate::pager::RecursiveItemPager;
use crate::retry::RetryingExecutor;
use crate::scope::{percent_decode, ScopeTarget};
use crate::types::{Drive, DriveItem};

/// Name of the default document library as Graph reports it
pub const DEFAULT_LIBRARY_NAME: &str = "Documents";

/// Name users see (and put in URLs) for the default document library
pub const DEFAULT_LIBRARY_LABEL: &str = "Shared Documents";

/// Item id Graph accepts for the root folder of a drive
const ROOT_FOLDER_ID: &str = "root";

const ROOT_MARKER: &str = "root:";

/// Observed parent paths kept for the empty-folder warning
const MAX_OBSERVED_PATHS: usize = 20;

/// Seconds since the Unix epoch, fractional part allowed.
pub type SecondsSinceUnixEpoch = f64;

/// Inclusive modification-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build a window from epoch seconds.
    ///
    /// # Errors
    ///
    /// `InvalidTimeWindow` when either bound is not finite or falls outside
    /// the representable timestamp range.
    pub fn from_epoch_seconds(
        start: SecondsSinceUnixEpoch,
        end: SecondsSinceUnixEpoch,
    ) -> Result<Self> {
        Ok(Self {
            start: epoch_to_utc(start, "start")?,
            end: epoch_to_utc(end, "end")?,
        })
    }

    /// `start <= timestamp <= end`
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start <= *timestamp && *timestamp <= self.end
    }
}

fn epoch_to_utc(seconds: f64, bound: &str) -> Result<DateTime<Utc>> {
    let invalid = || {
        SharePointError::InvalidTimeWindow(format!("{} bound {} is out of range", bound, seconds))
    };

    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
        return Err(invalid());
    }

    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos).ok_or_else(invalid)
}

/// Whether a drive satisfies a requested drive name. The default library is
/// named `Documents` in Graph but `Shared Documents` in site URLs.
pub fn drive_matches(drive_name: &str, requested: &str) -> bool {
    drive_name == requested
        || (drive_name == DEFAULT_LIBRARY_NAME && requested == DEFAULT_LIBRARY_LABEL)
}

/// Label reported for a drive in document metadata.
pub fn container_label(drive_name: &str) -> String {
    if drive_name == DEFAULT_LIBRARY_NAME {
        DEFAULT_LIBRARY_LABEL.to_string()
    } else {
        drive_name.to_string()
    }
}

/// Drive-relative folder path of a Graph parent path.
///
/// `/drives/b!x/root:/Reports/Q1%202024` becomes `Reports/Q1 2024`. Without a
/// `root:` marker the whole path is used, minus its leading `/`.
pub fn relative_parent_path(parent_path: &str) -> String {
    let tail = match parent_path.find(ROOT_MARKER) {
        Some(index) => &parent_path[index + ROOT_MARKER.len()..],
        None => parent_path,
    };
    percent_decode(tail.trim_start_matches('/'))
}

/// `relative == folder` or `relative` lies beneath `folder`.
pub fn in_folder(relative: &str, folder: &str) -> bool {
    relative == folder
        || relative
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Walks the drives of one target.
pub struct ItemTraverser {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
}

impl ItemTraverser {
    pub fn new(graph: Arc<dyn GraphClient>, retry: Arc<RetryingExecutor>) -> Self {
        Self { graph, retry }
    }

    /// Stream every matching `(item, container_label)` pair of `target`.
    ///
    /// Output order is drive order, then depth-first listing order.
    pub fn traverse(
        &self,
        target: ScopeTarget,
        window: Option<TimeWindow>,
    ) -> BoxStream<'static, Result<(DriveItem, String)>> {
        let graph = Arc::clone(&self.graph);
        let retry = Arc::clone(&self.retry);

        stream::once(async move {
            let drives = select_drives(graph.as_ref(), &retry, &target).await?;
            let folder_path = target.folder_path;

            let items = stream::iter(drives).flat_map(move |drive| {
                DriveWalk::new(
                    Arc::clone(&graph),
                    Arc::clone(&retry),
                    drive,
                    folder_path.clone(),
                    window,
                )
                .into_stream()
            });

            Ok::<_, SharePointError>(items.map(Ok::<_, SharePointError>))
        })
        .try_flatten()
        .boxed()
    }

    /// Collect every matching pair of `target`.
    pub async fn fetch_items(
        &self,
        target: ScopeTarget,
        window: Option<TimeWindow>,
    ) -> Result<Vec<(DriveItem, String)>> {
        self.traverse(target, window).try_collect().await
    }
}

/// Resolve the site of `target` and return the drives to walk.
async fn select_drives(
    graph: &dyn GraphClient,
    retry: &RetryingExecutor,
    target: &ScopeTarget,
) -> Result<Vec<Drive>> {
    let listed = async {
        let site = retry
            .execute("resolve_site", || graph.resolve_site(&target.root_url))
            .await?;

        // One retried call per page
        let mut drives = Vec::new();
        let mut next_link: Option<String> = None;
        loop {
            let link = next_link.as_deref();
            let page = retry
                .execute("list_drives", || graph.list_drives_page(&site.id, link))
                .await?;
            drives.extend(page.value);
            match page.next_link {
                Some(next) => next_link = Some(next),
                None => break,
            }
        }
        Ok::<_, SharePointError>(drives)
    }
    .await;

    let drives = match listed {
        Ok(drives) => drives,
        Err(err) if err.is_fatal_site_error() => {
            error!(site = %target.root_url, error = %err, "Site rejected the request");
            return Err(err);
        }
        Err(err) => {
            // Tenants contain sites without document libraries
            warn!(site = %target.root_url, error = %err, "Failed to process site");
            return Ok(Vec::new());
        }
    };

    debug!(
        site = %target.root_url,
        drives = ?drives.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "Found drives"
    );

    let Some(requested) = target.drive_name.as_deref() else {
        return Ok(drives);
    };

    let matching: Vec<Drive> = drives
        .into_iter()
        .filter(|drive| drive_matches(&drive.name, requested))
        .collect();

    if matching.is_empty() {
        warn!(site = %target.root_url, drive = requested, "Drive not found");
    }

    Ok(matching)
}

/// Descend from the drive root one folder segment at a time.
async fn locate_start_folder(
    graph: &dyn GraphClient,
    retry: &RetryingExecutor,
    drive_id: &str,
    folder_path: Option<&str>,
) -> Result<String> {
    let mut folder_id = ROOT_FOLDER_ID.to_string();

    for segment in folder_path
        .unwrap_or_default()
        .split('/')
        .filter(|segment| !segment.is_empty())
    {
        let child = retry
            .execute("get_child_by_path", || {
                graph.get_child_by_path(drive_id, &folder_id, segment)
            })
            .await?;
        folder_id = child.id;
    }

    Ok(folder_id)
}

enum WalkPhase {
    Locating,
    Listing(BoxStream<'static, Result<DriveItem>>),
}

/// Filtered listing of one drive; swallows its own failures.
struct DriveWalk {
    graph: Arc<dyn GraphClient>,
    retry: Arc<RetryingExecutor>,
    drive: Drive,
    label: String,
    folder_path: Option<String>,
    window: Option<TimeWindow>,
    phase: WalkPhase,
    listed: usize,
    in_folder: usize,
    kept: usize,
    observed_paths: Vec<String>,
}

impl DriveWalk {
    fn new(
        graph: Arc<dyn GraphClient>,
        retry: Arc<RetryingExecutor>,
        drive: Drive,
        folder_path: Option<String>,
        window: Option<TimeWindow>,
    ) -> Self {
        let label = container_label(&drive.name);
        Self {
            graph,
            retry,
            drive,
            label,
            folder_path,
            window,
            phase: WalkPhase::Locating,
            listed: 0,
            in_folder: 0,
            kept: 0,
            observed_paths: Vec::new(),
        }
    }

    fn into_stream(self) -> BoxStream<'static, (DriveItem, String)> {
        stream::unfold(self, |mut walk| async move {
            let item = walk.next_match().await?;
            let label = walk.label.clone();
            Some(((item, label), walk))
        })
        .boxed()
    }

    async fn next_match(&mut self) -> Option<DriveItem> {
        loop {
            if matches!(self.phase, WalkPhase::Locating) {
                let located = locate_start_folder(
                    self.graph.as_ref(),
                    &self.retry,
                    &self.drive.id,
                    self.folder_path.as_deref(),
                )
                .await;
                match located {
                    Ok(folder_id) => {
                        let pager = RecursiveItemPager::new(
                            Arc::clone(&self.graph),
                            Arc::clone(&self.retry),
                            self.drive.id.clone(),
                        );
                        self.phase = WalkPhase::Listing(pager.files_under(folder_id));
                    }
                    Err(err) => {
                        warn!(drive = %self.drive.name, error = %err, "Failed to process drive");
                        return None;
                    }
                }
            }

            let WalkPhase::Listing(items) = &mut self.phase else {
                return None;
            };

            match items.next().await {
                Some(Ok(item)) => {
                    self.listed += 1;
                    if self.keep(&item) {
                        self.kept += 1;
                        return Some(item);
                    }
                }
                Some(Err(err)) => {
                    warn!(drive = %self.drive.name, error = %err, "Failed to process drive");
                    return None;
                }
                None => {
                    self.log_summary();
                    return None;
                }
            }
        }
    }

    fn keep(&mut self, item: &DriveItem) -> bool {
        if let Some(folder) = &self.folder_path {
            let relative = item.parent_path().map(relative_parent_path);
            let inside = relative
                .as_deref()
                .is_some_and(|path| in_folder(path, folder));

            if !inside {
                if self.observed_paths.len() < MAX_OBSERVED_PATHS {
                    self.observed_paths
                        .push(item.parent_path().unwrap_or_default().to_string());
                }
                return false;
            }
            self.in_folder += 1;
        }

        match &self.window {
            Some(window) => window.contains(&item.last_modified_date_time),
            None => true,
        }
    }

    fn log_summary(&self) {
        debug!(
            drive = %self.drive.name,
            listed = self.listed,
            kept = self.kept,
            "Finished drive"
        );

        if let Some(folder) = &self.folder_path {
            if self.in_folder == 0 {
                warn!(
                    drive = %self.drive.name,
                    folder = %folder,
                    observed_paths = ?self.observed_paths,
                    "Nothing found for folder"
                );
            }
        }
    }
}
