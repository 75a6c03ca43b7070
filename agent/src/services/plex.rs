//! Plex Media Server API client
//!
//! Talks JSON to the server (`Accept: application/json`) and authenticates
//! with `X-Plex-Token`. Every payload is wrapped in a `MediaContainer`.
//!
//! Rate limiting and retries follow [rate_limiter](super::rate_limiter):
//! transient statuses are retried, 401/404 fail straight away. Creating a
//! collection is never retried, since a lost reply would otherwise leave two
//! collections with the same name on the server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::media_server::{Library, MediaServer, ServerStatus};
use super::rate_limiter::{RateLimitedClient, RetryConfig, is_transient_status, retry_async};
use crate::collections::{CollectionId, Item, ItemId, MediaKind, RemoteCollection};

/// Upper bound on item ids per collection request, keeps URLs a sane length
const ITEMS_PER_REQUEST: usize = 100;

type Query = Vec<(&'static str, String)>;

/// How a request may be repeated and which statuses count as done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallPolicy {
    /// Reads and other repeatable calls: transient failures are retried
    Idempotent,
    /// Creates server state: one attempt only
    Once,
    /// Removals: retried, and 404 means the target is already gone
    Delete,
}

impl CallPolicy {
    fn retries(self) -> bool {
        self != CallPolicy::Once
    }

    fn accepts(self, status: reqwest::StatusCode) -> bool {
        status.is_success() || (self == CallPolicy::Delete && status == reqwest::StatusCode::NOT_FOUND)
    }
}

/// Plex API client with rate limiting and retry logic
pub struct PlexClient {
    client: Arc<RateLimitedClient>,
    base_url: String,
    retry_config: RetryConfig,
    machine_id: OnceCell<String>,
}

/// Every Plex response body is `{"MediaContainer": {...}}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Default, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<PlexSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlexSection {
    key: String,
    title: String,
    #[serde(rename = "type")]
    section_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

/// Library item or collection as returned by listing endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PlexMetadata {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub metadata_type: Option<String>,
    pub year: Option<i32>,
    pub studio: Option<String>,
    pub rating: Option<f64>,
    #[serde(rename = "audienceRating")]
    pub audience_rating: Option<f64>,
    #[serde(rename = "Genre", default)]
    pub genres: Vec<PlexTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexTag {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
struct RootContainer {
    #[serde(rename = "friendlyName")]
    friendly_name: String,
    version: String,
    platform: Option<String>,
    #[serde(rename = "platformVersion")]
    platform_version: Option<String>,
    #[serde(rename = "machineIdentifier")]
    machine_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityContainer {
    #[serde(rename = "machineIdentifier")]
    machine_identifier: String,
}

impl PlexMetadata {
    /// Convert to an engine item, using the library kind when the listing
    /// omits the type
    pub fn into_item(self, library_kind: MediaKind) -> Item {
        let kind = self
            .metadata_type
            .as_deref()
            .and_then(MediaKind::from_server_type)
            .unwrap_or(library_kind);

        Item {
            id: self.rating_key,
            title: self.title,
            year: self.year,
            genres: self.genres.into_iter().map(|g| g.tag).collect(),
            studio: self.studio,
            rating: self.rating.or(self.audience_rating),
            kind,
        }
    }
}

/// `server://` URI that the collection endpoints take to reference items
pub fn metadata_uri(machine_id: &str, items: &[ItemId]) -> String {
    format!(
        "server://{}/com.plexapp.plugins.library/library/metadata/{}",
        machine_id,
        items.join(",")
    )
}

impl PlexClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = RateLimitedClient::for_media_server(timeout)?
            .with_header("X-Plex-Token", token)
            .with_header("Accept", "application/json")
            .with_header("X-Plex-Product", "curator")
            .with_header("X-Plex-Client-Identifier", "curator");

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
            machine_id: OnceCell::new(),
        })
    }

    /// Send a request, retrying transient failures when the policy allows,
    /// and fail on statuses the policy does not accept
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query,
        operation: &str,
        policy: CallPolicy,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let client = &self.client;
        let (url, query, method) = (&url, &query, &method);

        let retry_config = if policy.retries() {
            self.retry_config.clone()
        } else {
            RetryConfig {
                max_retries: 1,
                ..self.retry_config.clone()
            }
        };

        retry_async(
            || async move {
                let response = match client.request(method.clone(), url, query).await {
                    Ok(response) => response,
                    Err(e) => {
                        let err = e.context(format!("{} request failed", operation));
                        return Err(backoff::Error::transient(err));
                    }
                };

                let status = response.status();
                if policy.accepts(status) {
                    if !status.is_success() {
                        debug!(operation = %operation, status = %status, "Already applied");
                    }
                    return Ok(response);
                }

                let err = match status.as_u16() {
                    401 => anyhow!("{} rejected: invalid Plex token", operation),
                    404 => anyhow!("{} failed: not found", operation),
                    _ => anyhow!("{} failed with status: {}", operation, status),
                };
                if is_transient_status(status.as_u16()) {
                    Err(backoff::Error::transient(err))
                } else {
                    Err(backoff::Error::permanent(err))
                }
            },
            &retry_config,
            operation,
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: Query, operation: &str) -> Result<T> {
        let response = self
            .send(Method::GET, path, query, operation, CallPolicy::Idempotent)
            .await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", operation))?;
        Ok(envelope.media_container)
    }

    /// Machine identifier, fetched once and cached
    async fn machine_id(&self) -> Result<&str> {
        let id = self
            .machine_id
            .get_or_try_init(|| async {
                let identity: IdentityContainer = self
                    .get_json("/identity", Vec::new(), "identity")
                    .await?;
                Ok::<_, anyhow::Error>(identity.machine_identifier)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Check the server answers and the token is accepted
    pub async fn ping(&self) -> Result<String> {
        Ok(self.machine_id().await?.to_string())
    }

    async fn collection_members(&self, collection_id: &str) -> Result<Vec<ItemId>> {
        let container: MetadataContainer = self
            .get_json(
                &format!("/library/collections/{}/children", collection_id),
                Vec::new(),
                "list collection items",
            )
            .await?;
        Ok(container.metadata.into_iter().map(|m| m.rating_key).collect())
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn server_status(&self) -> Result<ServerStatus> {
        let root: RootContainer = self.get_json("/", Vec::new(), "server status").await?;
        if let Some(machine_id) = root.machine_identifier.clone() {
            let _ = self.machine_id.set(machine_id);
        }
        let libraries = self.list_libraries().await?.len();

        Ok(ServerStatus {
            server_name: root.friendly_name,
            version: root.version,
            platform: root.platform.unwrap_or_default(),
            platform_version: root.platform_version.unwrap_or_default(),
            libraries,
            updated_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        let container: SectionsContainer = self
            .get_json("/library/sections", Vec::new(), "list libraries")
            .await?;

        Ok(container
            .directory
            .into_iter()
            .map(|s| Library {
                id: s.key,
                title: s.title,
                section_type: s.section_type,
            })
            .collect())
    }

    async fn list_items(&self, library: &Library) -> Result<Vec<Item>> {
        let kind = library
            .kind()
            .with_context(|| format!("Library {} is not a movie or show library", library.title))?;

        let container: MetadataContainer = self
            .get_json(
                &format!("/library/sections/{}/all", library.id),
                Vec::new(),
                "list items",
            )
            .await?;

        debug!(library = %library.title, count = container.metadata.len(), "Fetched library items");
        Ok(container
            .metadata
            .into_iter()
            .map(|m| m.into_item(kind))
            .collect())
    }

    async fn list_collections(&self, library_id: &str) -> Result<Vec<RemoteCollection>> {
        let container: MetadataContainer = self
            .get_json(
                &format!("/library/sections/{}/collections", library_id),
                Vec::new(),
                "list collections",
            )
            .await?;

        let mut collections = Vec::with_capacity(container.metadata.len());
        for meta in container.metadata {
            let items = self.collection_members(&meta.rating_key).await?;
            collections.push(RemoteCollection {
                id: meta.rating_key,
                name: meta.title,
                items: items.into_iter().collect(),
            });
        }

        debug!(library_id = %library_id, count = collections.len(), "Fetched collections");
        Ok(collections)
    }

    async fn create_collection(
        &self,
        library: &Library,
        name: &str,
        items: &[ItemId],
    ) -> Result<CollectionId> {
        let kind = library
            .kind()
            .with_context(|| format!("Cannot create collections in {} library", library.section_type))?;
        let machine_id = self.machine_id().await?;

        let mut batches = items.chunks(ITEMS_PER_REQUEST);
        let first = batches.next().unwrap_or(&[]);

        let query: Query = vec![
            ("type", kind.server_type_code().to_string()),
            ("title", name.to_string()),
            ("smart", "0".to_string()),
            ("sectionId", library.id.clone()),
            ("uri", metadata_uri(machine_id, first)),
        ];
        let response = self
            .send(
                Method::POST,
                "/library/collections",
                query,
                "create collection",
                CallPolicy::Once,
            )
            .await?;
        let envelope: Envelope<MetadataContainer> = response
            .json()
            .await
            .context("Failed to parse create collection response")?;
        let collection_id = envelope
            .media_container
            .metadata
            .into_iter()
            .next()
            .map(|m| m.rating_key)
            .context("Create collection response did not include the new collection")?;

        for batch in batches {
            self.add_items_to_collection(&collection_id, batch).await?;
        }

        info!(name = %name, collection_id = %collection_id, items = items.len(), "Created collection");
        Ok(collection_id)
    }

    async fn add_items_to_collection(&self, collection_id: &str, items: &[ItemId]) -> Result<()> {
        let machine_id = self.machine_id().await?;
        for batch in items.chunks(ITEMS_PER_REQUEST) {
            self.send(
                Method::PUT,
                &format!("/library/collections/{}/items", collection_id),
                vec![("uri", metadata_uri(machine_id, batch))],
                "add collection items",
                CallPolicy::Idempotent,
            )
            .await?;
        }
        Ok(())
    }

    async fn remove_items_from_collection(
        &self,
        collection_id: &str,
        items: &[ItemId],
    ) -> Result<()> {
        for item in items {
            self.send(
                Method::DELETE,
                &format!("/library/collections/{}/items/{}", collection_id, item),
                Vec::new(),
                "remove collection item",
                CallPolicy::Delete,
            )
            .await?;
        }
        Ok(())
    }

    async fn scan_library(&self, library_id: &str) -> Result<()> {
        self.send(
            Method::GET,
            &format!("/library/sections/{}/refresh", library_id),
            Vec::new(),
            "scan library",
            CallPolicy::Idempotent,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct Reply {
        status: u16,
        body: &'static str,
        delay: Duration,
    }

    impl Reply {
        fn ok(body: &'static str) -> Self {
            Self {
                status: 200,
                body,
                delay: Duration::ZERO,
            }
        }

        fn status(status: u16) -> Self {
            Self {
                status,
                body: "{}",
                delay: Duration::ZERO,
            }
        }
    }

    const IDENTITY: &str = r#"{"MediaContainer": {"machineIdentifier": "abc123"}}"#;
    const CREATED: &str = r#"{"MediaContainer": {"Metadata": [{"ratingKey": "77", "title": "1990s Movies"}]}}"#;

    /// Minimal HTTP server answering each request line with `handler`.
    /// Returns the base URL and the request lines received so far.
    async fn serve(
        handler: impl Fn(&str) -> Reply + Send + Sync + 'static,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let log = log.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let line = String::from_utf8_lossy(&head)
                        .lines()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    log.lock().unwrap().push(line.clone());

                    let reply = (*handler)(&line);
                    tokio::time::sleep(reply.delay).await;
                    let response = format!(
                        "HTTP/1.1 {} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        reply.status,
                        reply.body.len(),
                        reply.body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (url, received)
    }

    fn client(url: &str, timeout: Duration) -> PlexClient {
        let mut client = PlexClient::new(url, "token", timeout).unwrap();
        client.retry_config = RetryConfig {
            max_retries: 3,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(10),
            multiplier: 1.0,
        };
        client
    }

    fn count(received: &Mutex<Vec<String>>, prefix: &str) -> usize {
        received
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }

    fn movies_library() -> Library {
        Library {
            id: "1".to_string(),
            title: "Movies".to_string(),
            section_type: "movie".to_string(),
        }
    }

    #[tokio::test]
    async fn test_slow_create_is_not_sent_twice() {
        let (url, received) = serve(|line| {
            if line.starts_with("GET /identity") {
                Reply::ok(IDENTITY)
            } else {
                Reply {
                    delay: Duration::from_millis(600),
                    ..Reply::ok(CREATED)
                }
            }
        })
        .await;
        let plex = client(&url, Duration::from_millis(200));

        let result = plex
            .create_collection(&movies_library(), "1990s Movies", &["1".to_string()])
            .await;

        assert!(result.is_err());
        assert_eq!(count(&received, "POST /library/collections"), 1);
    }

    #[tokio::test]
    async fn test_create_is_not_retried_on_server_error() {
        let (url, received) = serve(|line| {
            if line.starts_with("GET /identity") {
                Reply::ok(IDENTITY)
            } else {
                Reply::status(503)
            }
        })
        .await;
        let plex = client(&url, Duration::from_secs(5));

        let result = plex
            .create_collection(&movies_library(), "1990s Movies", &["1".to_string()])
            .await;

        assert!(result.is_err());
        assert_eq!(count(&received, "POST /library/collections"), 1);
    }

    #[tokio::test]
    async fn test_reads_are_retried_on_server_error() {
        let attempts = AtomicUsize::new(0);
        let (url, received) = serve(move |_| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::status(503)
            } else {
                Reply::ok(IDENTITY)
            }
        })
        .await;
        let plex = client(&url, Duration::from_secs(5));

        assert_eq!(plex.ping().await.unwrap(), "abc123");
        assert_eq!(count(&received, "GET /identity"), 2);
    }

    #[tokio::test]
    async fn test_remove_treats_already_removed_item_as_done() {
        let deletes = AtomicUsize::new(0);
        let (url, received) = serve(move |_| {
            if deletes.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::status(503)
            } else {
                Reply::status(404)
            }
        })
        .await;
        let plex = client(&url, Duration::from_secs(5));

        plex.remove_items_from_collection("77", &["5".to_string()])
            .await
            .unwrap();
        assert_eq!(count(&received, "DELETE /library/collections/77/items/5"), 2);
    }

    #[tokio::test]
    async fn test_remove_still_fails_on_rejected_token() {
        let (url, _) = serve(|_| Reply::status(401)).await;
        let plex = client(&url, Duration::from_secs(5));

        let err = plex
            .remove_items_from_collection("77", &["5".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid Plex token"));
    }

    #[tokio::test]
    async fn test_list_items_uses_library_kind_without_refetching_sections() {
        let (url, received) = serve(|_| {
            Reply::ok(r#"{"MediaContainer": {"Metadata": [{"ratingKey": "9", "title": "Heat", "year": 1995}]}}"#)
        })
        .await;
        let plex = client(&url, Duration::from_secs(5));

        let items = plex.list_items(&movies_library()).await.unwrap();

        assert_eq!(items, vec![Item::movie("9", "Heat").with_year(1995)]);
        assert_eq!(
            received.lock().unwrap().clone(),
            vec!["GET /library/sections/1/all HTTP/1.1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_large_create_is_split_into_batches() {
        let (url, received) = serve(|line| {
            if line.starts_with("GET /identity") {
                Reply::ok(IDENTITY)
            } else if line.starts_with("POST") {
                Reply::ok(CREATED)
            } else {
                Reply::ok("{}")
            }
        })
        .await;
        let plex = client(&url, Duration::from_secs(5));
        let items: Vec<ItemId> = (1..=250).map(|i| i.to_string()).collect();

        let id = plex
            .create_collection(&movies_library(), "1990s Movies", &items)
            .await
            .unwrap();

        assert_eq!(id, "77");
        assert_eq!(count(&received, "POST /library/collections?"), 1);
        assert_eq!(count(&received, "PUT /library/collections/77/items?"), 2);
    }

    #[test]
    fn test_parse_movie_listing() {
        let json = r#"{
            "MediaContainer": {
                "size": 2,
                "Metadata": [
                    {
                        "ratingKey": "101",
                        "title": "Heat",
                        "type": "movie",
                        "year": 1995,
                        "studio": "Warner Bros.",
                        "audienceRating": 8.6,
                        "Genre": [{"tag": "Crime"}, {"tag": "Thriller"}]
                    },
                    {
                        "ratingKey": "102",
                        "title": "Unknown"
                    }
                ]
            }
        }"#;

        let envelope: Envelope<MetadataContainer> = serde_json::from_str(json).unwrap();
        let items: Vec<Item> = envelope
            .media_container
            .metadata
            .into_iter()
            .map(|m| m.into_item(MediaKind::Movie))
            .collect();

        assert_eq!(
            items[0],
            Item::movie("101", "Heat")
                .with_year(1995)
                .with_studio("Warner Bros.")
                .with_rating(8.6)
                .with_genres(["Crime", "Thriller"])
        );
        assert_eq!(items[1], Item::movie("102", "Unknown"));
    }

    #[test]
    fn test_critic_rating_preferred_over_audience() {
        let json = r#"{"ratingKey": "1", "title": "A", "rating": 7.1, "audienceRating": 9.0}"#;
        let meta: PlexMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.into_item(MediaKind::Movie).rating, Some(7.1));
    }

    #[test]
    fn test_show_type_overrides_library_kind() {
        let json = r#"{"ratingKey": "5", "title": "The Wire", "type": "show", "studio": "HBO"}"#;
        let meta: PlexMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.into_item(MediaKind::Movie).kind, MediaKind::Show);
    }

    #[test]
    fn test_parse_sections() {
        let json = r#"{"MediaContainer": {"Directory": [
            {"key": "1", "title": "Movies", "type": "movie"},
            {"key": "3", "title": "Music", "type": "artist"}
        ]}}"#;
        let envelope: Envelope<SectionsContainer> = serde_json::from_str(json).unwrap();
        let sections = envelope.media_container.directory;
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].section_type, "artist");
    }

    #[test]
    fn test_empty_container_has_no_metadata() {
        let envelope: Envelope<MetadataContainer> =
            serde_json::from_str(r#"{"MediaContainer": {"size": 0}}"#).unwrap();
        assert!(envelope.media_container.metadata.is_empty());
    }

    #[test]
    fn test_metadata_uri() {
        assert_eq!(
            metadata_uri("abc123", &["1".to_string(), "2".to_string()]),
            "server://abc123/com.plexapp.plugins.library/library/metadata/1,2"
        );
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PlexClient::new("http://plex.local:32400/", "token", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://plex.local:32400");
    }
}
