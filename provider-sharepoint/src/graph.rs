//! Microsoft Graph client
//!
//! [`GraphClient`] is the narrow set of remote calls the connector makes.
//! Every method performs exactly one request; retry policy lives in
//! [`RetryingExecutor`](crate::retry::RetryingExecutor).
//! [`HttpGraphClient`] implements it over the host [`HttpClient`] bridge with
//! bearer tokens from a [`TokenProvider`].

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::TokenProvider;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{Result, SharePointError};
use crate::types::{DriveItem, DriveItemsPage, DrivesPage, GraphErrorResponse, Site, SitesPage};

/// Graph v1.0 endpoint
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Per-request timeout for metadata calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Content downloads can be large; give them more time
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Remote operations against SharePoint sites and drives.
///
/// Errors carry the HTTP status and any `Retry-After` delay as
/// [`SharePointError::Api`].
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Resolve a site from its absolute URL, e.g.
    /// `https://contoso.sharepoint.com/sites/hr`.
    async fn resolve_site(&self, site_url: &str) -> Result<Site>;

    /// Fetch one page of the document libraries of a site. `None` fetches
    /// the first page, otherwise the given `@odata.nextLink` is followed.
    async fn list_drives_page(&self, site_id: &str, next_link: Option<&str>)
        -> Result<DrivesPage>;

    /// Fetch one page of all tenant sites. `None` fetches the first page,
    /// otherwise the given `@odata.nextLink` is followed.
    async fn list_sites_page(&self, next_link: Option<&str>) -> Result<SitesPage>;

    /// Look up the child named `name` of the item `parent_id` (`"root"` for
    /// the drive root).
    async fn get_child_by_path(&self, drive_id: &str, parent_id: &str, name: &str)
        -> Result<DriveItem>;

    /// Fetch one page of the direct children of a folder.
    async fn list_children_page(
        &self,
        drive_id: &str,
        folder_id: &str,
        page_size: u32,
        next_link: Option<&str>,
    ) -> Result<DriveItemsPage>;

    /// Download the content of a file. `None` when the service returned no
    /// payload.
    async fn get_content(&self, drive_id: &str, item_id: &str) -> Result<Option<Bytes>>;
}

/// [`GraphClient`] over the host HTTP bridge.
pub struct HttpGraphClient {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

impl HttpGraphClient {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client,
            tokens,
            base_url: GRAPH_API_BASE.to_string(),
        }
    }

    /// Point the client at a different Graph endpoint (national clouds, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Graph address of a site given its web URL.
    ///
    /// `https://host/sites/hr` becomes `{base}/sites/host:/sites/hr`; a tenant
    /// root site becomes `{base}/sites/host`.
    fn site_lookup_url(&self, site_url: &str) -> Result<String> {
        let without_scheme = site_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(site_url);
        let (host, path) = without_scheme
            .split_once('/')
            .unwrap_or((without_scheme, ""));

        if host.is_empty() {
            return Err(SharePointError::Parse(format!(
                "Site URL has no host: {}",
                site_url
            )));
        }

        let path = encode_path(path.trim_matches('/'));
        if path.is_empty() {
            Ok(format!("{}/sites/{}", self.base_url, host))
        } else {
            Ok(format!("{}/sites/{}:/{}", self.base_url, host, path))
        }
    }

    async fn send(&self, url: String, timeout: Duration) -> Result<HttpResponse> {
        let token = self.tokens.access_token().await?;
        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(timeout);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        Err(api_error(&response))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self.send(url, REQUEST_TIMEOUT).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| SharePointError::Parse(format!("Unexpected Graph payload: {}", e)))
    }
}

fn api_error(response: &HttpResponse) -> SharePointError {
    let envelope: GraphErrorResponse = serde_json::from_slice(&response.body).unwrap_or_default();
    let message = if envelope.error.code.is_empty() {
        String::from_utf8_lossy(&response.body).trim().to_string()
    } else {
        format!("{}: {}", envelope.error.code, envelope.error.message)
    };

    SharePointError::Api {
        status: response.status,
        message,
        retry_after: response.retry_after(),
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl GraphClient for HttpGraphClient {
    #[instrument(skip(self))]
    async fn resolve_site(&self, site_url: &str) -> Result<Site> {
        let url = self.site_lookup_url(site_url)?;
        let site: Site = self.get_json(url).await?;
        debug!(site_id = %site.id, "Resolved site");
        Ok(site)
    }

    #[instrument(skip(self))]
    async fn list_drives_page(
        &self,
        site_id: &str,
        next_link: Option<&str>,
    ) -> Result<DrivesPage> {
        let url = match next_link {
            Some(link) => link.to_string(),
            None => format!("{}/sites/{}/drives", self.base_url, site_id),
        };
        let page: DrivesPage = self.get_json(url).await?;
        debug!(count = page.value.len(), "Listed drives");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn list_sites_page(&self, next_link: Option<&str>) -> Result<SitesPage> {
        let url = match next_link {
            Some(link) => link.to_string(),
            None => format!("{}/sites/getAllSites", self.base_url),
        };
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn get_child_by_path(
        &self,
        drive_id: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveItem> {
        let url = format!(
            "{}/drives/{}/items/{}:/{}",
            self.base_url,
            drive_id,
            parent_id,
            urlencoding::encode(name)
        );
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn list_children_page(
        &self,
        drive_id: &str,
        folder_id: &str,
        page_size: u32,
        next_link: Option<&str>,
    ) -> Result<DriveItemsPage> {
        let url = match next_link {
            Some(link) => link.to_string(),
            None => format!(
                "{}/drives/{}/items/{}/children?$top={}",
                self.base_url, drive_id, folder_id, page_size
            ),
        };
        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn get_content(&self, drive_id: &str, item_id: &str) -> Result<Option<Bytes>> {
        let url = format!(
            "{}/drives/{}/items/{}/content",
            self.base_url, drive_id, item_id
        );
        let response = self.send(url, DOWNLOAD_TIMEOUT).await?;

        if response.status == 204 || response.body.is_empty() {
            return Ok(None);
        }

        debug!(bytes = response.body.len(), "Downloaded item content");
        Ok(Some(response.body))
    }
}
