//! SharePoint connector
//!
//! Ties scope resolution, traversal, and conversion together into pull-driven
//! streams of document batches.

use bridge_traits::http::HttpClient;
use bridge_traits::time::Sleeper;
use core_auth::{ClientCredentials, ClientCredentialsProvider};
use core_runtime::config::ConnectorConfig;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::converter::{ConversionOutcome, DocumentConverter};
use crate::document::Document;
use crate::error::{Result, SharePointError};
use crate::extractor::{TextExtractor, Utf8TextExtractor};
use crate::graph::{GraphClient, HttpGraphClient};
use crate::retry::{RetryPolicy, RetryingExecutor};
use crate::scope::{resolve_scope, ScopeTarget};
use crate::sites::SiteEnumerator;
use crate::traverser::{ItemTraverser, SecondsSinceUnixEpoch, TimeWindow};

/// Lazy stream of document batches.
///
/// Every batch holds at most `batch_size` documents. The last batch is
/// yielded even when empty. A fatal error is yielded once and ends the
/// stream.
pub type DocumentBatchStream = BoxStream<'static, Result<Vec<Document>>>;

/// Document connector for SharePoint Online.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
/// use provider_sharepoint::SharePointConnector;
///
/// let mut connector = SharePointConnector::new(config)?;
/// connector.load_credentials(credentials, http_client);
///
/// let mut batches = connector.poll_source(1_700_000_000.0, 1_700_086_400.0)?;
/// while let Some(batch) = batches.next().await {
///     index(batch?).await;
/// }
/// ```
pub struct SharePointConnector {
    /// Resolved scope; empty means every site of the tenant
    targets: Vec<ScopeTarget>,
    batch_size: usize,
    size_threshold: u64,
    retry: Arc<RetryingExecutor>,
    extractor: Arc<dyn TextExtractor>,
    graph: Option<Arc<dyn GraphClient>>,
}

impl SharePointConnector {
    /// Create a connector from a validated configuration.
    ///
    /// Scope strings are resolved here, once. No remote call is made until
    /// a returned stream is polled.
    pub fn new(config: ConnectorConfig) -> Result<Self> {
        config.validate()?;

        let targets = resolve_scope(&config.sites);
        if !config.sites.is_empty() && targets.is_empty() {
            warn!(
                configured = config.sites.len(),
                "No configured scope names a site, falling back to all sites"
            );
        }

        Ok(Self {
            targets,
            batch_size: config.batch_size,
            size_threshold: config.size_threshold_bytes,
            retry: Arc::new(RetryingExecutor::new(RetryPolicy::from_config(&config))),
            extractor: Arc::new(Utf8TextExtractor),
            graph: None,
        })
    }

    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the sleeper used for retry backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        let policy = *self.retry.policy();
        self.retry = Arc::new(RetryingExecutor::with_sleeper(policy, sleeper));
        self
    }

    /// Install a graph client directly.
    pub fn with_graph_client(mut self, graph: Arc<dyn GraphClient>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Authenticate with an app registration's client credentials.
    ///
    /// Tokens are acquired lazily on the first Graph request.
    pub fn load_credentials(
        &mut self,
        credentials: ClientCredentials,
        http_client: Arc<dyn HttpClient>,
    ) {
        info!(client_id = %credentials.client_id, "Loading SharePoint credentials");
        let tokens = Arc::new(ClientCredentialsProvider::new(
            credentials,
            Arc::clone(&http_client),
        ));
        self.graph = Some(Arc::new(HttpGraphClient::new(http_client, tokens)));
    }

    pub fn targets(&self) -> &[ScopeTarget] {
        &self.targets
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Full load of every document in scope.
    ///
    /// # Errors
    ///
    /// `MissingCredential` if no credentials were loaded.
    pub fn load_from_state(&self) -> Result<DocumentBatchStream> {
        let graph = self.graph_client()?;
        info!(targets = self.targets.len(), "Starting full load");
        Ok(self.batches(graph, None))
    }

    /// Documents modified within `[start, end]`, both in epoch seconds.
    ///
    /// # Errors
    ///
    /// `InvalidTimeWindow` for bounds outside the timestamp range, and
    /// `MissingCredential` if no credentials were loaded.
    pub fn poll_source(
        &self,
        start: SecondsSinceUnixEpoch,
        end: SecondsSinceUnixEpoch,
    ) -> Result<DocumentBatchStream> {
        let window = TimeWindow::from_epoch_seconds(start, end)?;
        let graph = self.graph_client()?;
        info!(start = %window.start, end = %window.end, "Starting poll");
        Ok(self.batches(graph, Some(window)))
    }

    fn graph_client(&self) -> Result<Arc<dyn GraphClient>> {
        self.graph.clone().ok_or(SharePointError::MissingCredential)
    }

    fn batches(&self, graph: Arc<dyn GraphClient>, window: Option<TimeWindow>) -> DocumentBatchStream {
        let targets: BoxStream<'static, Result<ScopeTarget>> = if self.targets.is_empty() {
            SiteEnumerator::new(Arc::clone(&graph), Arc::clone(&self.retry)).targets()
        } else {
            stream::iter(self.targets.clone().into_iter().map(Ok)).boxed()
        };

        let traverser = ItemTraverser::new(Arc::clone(&graph), Arc::clone(&self.retry));
        let converter = Arc::new(DocumentConverter::new(
            graph,
            Arc::clone(&self.retry),
            Arc::clone(&self.extractor),
            self.size_threshold,
        ));

        let outcomes = targets
            .map_ok(move |target| {
                debug!(site = %target.root_url, "Traversing target");
                traverser.traverse(target, window)
            })
            .try_flatten()
            .and_then(move |(item, label)| {
                let converter = Arc::clone(&converter);
                async move { converter.convert(item, &label).await }
            })
            .boxed();

        batch_documents(outcomes, self.batch_size)
    }
}

struct BatchState {
    outcomes: BoxStream<'static, Result<ConversionOutcome>>,
    batch_size: usize,
    buffer: Vec<Document>,
    emitted: usize,
    finished: bool,
}

/// Group emitted documents into batches of `batch_size`.
fn batch_documents(
    outcomes: BoxStream<'static, Result<ConversionOutcome>>,
    batch_size: usize,
) -> DocumentBatchStream {
    let state = BatchState {
        outcomes,
        batch_size,
        buffer: Vec::with_capacity(batch_size),
        emitted: 0,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            match state.outcomes.next().await {
                Some(Ok(ConversionOutcome::Emitted(document))) => {
                    state.buffer.push(document);
                    if state.buffer.len() >= state.batch_size {
                        let batch = mem::take(&mut state.buffer);
                        state.emitted += batch.len();
                        debug!(documents = batch.len(), "Yielding batch");
                        return Some((Ok(batch), state));
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "Stopping document stream");
                    state.finished = true;
                    return Some((Err(err), state));
                }
                None => {
                    let batch = mem::take(&mut state.buffer);
                    state.emitted += batch.len();
                    state.finished = true;
                    info!(documents = state.emitted, "Document stream complete");
                    return Some((Ok(batch), state));
                }
            }
        }
    })
    .boxed()
}
