//! The consumer-facing bridge.
//!
//! Accepts a stream of (topic, sample) observations from the host
//! pipeline and drives the full path: tag-cache lookup, remote
//! registration of unknown topics, dedup suppression, and the hub value
//! push. Per the error-propagation policy, nothing here returns an error
//! to the host for a sample that could not be delivered -- the outcome
//! enum says what happened, and failures of the CRUD wrappers degrade to
//! empty results after being logged.
//!
//! The host delivers one observation at a time and awaits each call, so
//! per-topic ordering follows from the call order. There is no
//! cross-topic ordering guarantee.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use llumin_api::hub::channel::DEFAULT_HUB_NAME;
use llumin_api::hub::{ChannelState, HubChannel, HubConfig, HubEvent, PushOutcome, TagValueUpdate};
use llumin_api::models::{NewServer, NewTag, ServerUpdate};
use llumin_api::transport::{TlsMode, TransportConfig};
use llumin_api::{RestClient, TokenManager};

use crate::cache::TagCache;
use crate::config::{BridgeConfig, TlsVerification};
use crate::error::CoreError;
use crate::events::{BridgeEvent, EventBus};
use crate::model::{Asset, RemoteServer, Sample, Tag, UpdateOutcome};

/// Page size used for asset searches (matches the interface default).
const ASSET_SEARCH_PAGE_SIZE: u32 = 100;

struct BridgeInner {
    config: BridgeConfig,
    rest: RestClient,
    hub: HubChannel,
    cache: Mutex<TagCache>,
    events: EventBus,
    cancel: CancellationToken,
    forward_task: Mutex<Option<JoinHandle<()>>>,
}

/// The main entry point for hosts. Cheaply cloneable.
///
/// Owns the token manager, REST client, hub channel, and tag cache for
/// one endpoint; at most one bridge instance should manage a given
/// service name.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Build a bridge from configuration. Does not connect -- the hub
    /// connection is established lazily by the first push, or eagerly
    /// via [`connect()`](Self::connect).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        if config.username.is_empty() {
            return Err(CoreError::Config {
                field: "username",
                reason: "must not be empty".into(),
            });
        }
        if config.service_name.is_empty() {
            return Err(CoreError::Config {
                field: "service_name",
                reason: "must not be empty".into(),
            });
        }

        let base_url = config.normalized_url();
        let transport = TransportConfig {
            tls: match &config.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: config.timeout,
        };
        let http = transport.build_client().map_err(CoreError::Api)?;

        let tokens = Arc::new(
            TokenManager::new(
                &base_url,
                config.username.clone(),
                config.password.clone(),
                http.clone(),
            )
            .map_err(CoreError::Api)?,
        );

        let rest = RestClient::with_client(
            http,
            base_url.clone(),
            config.service_name.clone(),
            Arc::clone(&tokens),
        );

        let hub_config = match &config.hub_url {
            Some(url) => HubConfig {
                url: url.clone(),
                hub_name: DEFAULT_HUB_NAME.into(),
                service_name: config.service_name.clone(),
                reconnect: config.reconnect.clone(),
            },
            None => {
                let mut hc = HubConfig::from_base_url(&base_url, config.service_name.clone())
                    .map_err(CoreError::Api)?;
                hc.reconnect = config.reconnect.clone();
                hc
            }
        };
        let hub = HubChannel::new(hub_config, tokens);

        let events = EventBus::new();
        let cancel = CancellationToken::new();
        let forward_task = tokio::spawn(forward_hub_events(
            hub.subscribe_events(),
            events.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                rest,
                hub,
                cache: Mutex::new(TagCache::new()),
                events,
                cancel,
                forward_task: Mutex::new(Some(forward_task)),
            }),
        })
    }

    // ── Sample processing ────────────────────────────────────────────

    /// Process one observation from the host pipeline.
    ///
    /// Unknown topics are registered remotely first; a registration that
    /// yields no id leaves the cache untouched so the next observation
    /// retries. Samples identical to the last pushed one are suppressed.
    /// The cache is committed only after the hub accepts the update, so
    /// a paused or disconnected drop leaves the dedup state unchanged.
    pub async fn process(&self, topic: &str, sample: Sample) -> UpdateOutcome {
        let Some(tag) = self.resolve_or_register(topic).await else {
            return UpdateOutcome::RegistrationFailed;
        };

        {
            let cache = self.inner.cache.lock().await;
            if !cache.needs_push(topic, &sample) {
                debug!(topic, "sample unchanged, suppressing push");
                return UpdateOutcome::Suppressed;
            }
        }

        let update = TagValueUpdate {
            id: tag.id,
            date_updated: sample.timestamp,
            value: sample.value.clone(),
            quality: sample.quality.clone(),
        };

        match self.inner.hub.push_value(&update).await {
            PushOutcome::Sent => {
                self.inner.cache.lock().await.record_push(topic, sample);
                UpdateOutcome::Sent
            }
            PushOutcome::DroppedPaused => UpdateOutcome::DroppedPaused,
            PushOutcome::DroppedDisconnected => UpdateOutcome::DroppedDisconnected,
        }
    }

    async fn resolve_or_register(&self, topic: &str) -> Option<Tag> {
        let cached = {
            let cache = self.inner.cache.lock().await;
            cache.resolve(topic).cloned()
        };
        if let Some(tag) = cached {
            return Some(tag);
        }
        self.register_tag(topic).await
    }

    /// Register an unknown topic with the remote system and cache the
    /// assigned identity.
    async fn register_tag(&self, topic: &str) -> Option<Tag> {
        info!(topic, "registering new tag");
        let new_tag = NewTag {
            server_id: self.inner.config.server_id,
            tag_name: topic.to_owned(),
            asset_code: String::new(),
            data_type: String::new(),
        };

        match self.inner.rest.add_tag(&new_tag).await {
            Ok(id) => {
                let tag = Tag {
                    id,
                    server_id: new_tag.server_id,
                    topic: topic.to_owned(),
                    asset_code: new_tag.asset_code,
                    data_type: new_tag.data_type,
                };
                self.inner.cache.lock().await.insert(tag.clone());
                Some(tag)
            }
            Err(e) => {
                warn!(topic, error = %e, "tag registration failed");
                None
            }
        }
    }

    /// Prime the cache with tags already registered for this bridge's
    /// interface server. Returns the number of entries seeded.
    ///
    /// Hosts call this at startup (and on [`BridgeEvent::TagListChanged`])
    /// so known topics skip re-registration.
    pub async fn load_tags(&self) -> usize {
        let records = match self.inner.rest.list_tags().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "could not load remote tag list");
                return 0;
            }
        };

        let server_id = self.inner.config.server_id;
        let mut cache = self.inner.cache.lock().await;
        let mut seeded = 0;
        for record in records {
            if record.server_id != server_id {
                continue;
            }
            let tag = Tag::from(record);
            // Keep existing entries: they carry dedup state.
            if cache.resolve(&tag.topic).is_none() {
                cache.insert(tag);
                seeded += 1;
            }
        }
        debug!(seeded, "tag cache primed from remote list");
        seeded
    }

    /// Administrative removal of a monitored tag by topic.
    pub async fn remove_tag(&self, topic: &str) -> bool {
        let tag = {
            let cache = self.inner.cache.lock().await;
            cache.resolve(topic).cloned()
        };
        let Some(tag) = tag else {
            warn!(topic, "cannot remove unknown topic");
            return false;
        };

        match self.inner.rest.remove_tag(tag.id).await {
            Ok(()) => {
                self.inner.cache.lock().await.remove(topic);
                info!(topic, id = tag.id, "tag removed");
                true
            }
            Err(e) => {
                warn!(topic, error = %e, "tag removal failed");
                false
            }
        }
    }

    // ── Server inventory (absorbing wrappers) ────────────────────────

    /// List the remote interface servers.
    ///
    /// Errors (including a non-array response) are reported via the log
    /// and degrade to an empty collection.
    pub async fn servers(&self) -> Vec<RemoteServer> {
        match self.inner.rest.list_servers().await {
            Ok(records) => records.into_iter().map(RemoteServer::from).collect(),
            Err(e) => {
                warn!(error = %e, "could not list interface servers");
                Vec::new()
            }
        }
    }

    /// Register a new interface server; `None` if the call failed.
    pub async fn add_server(
        &self,
        name: &str,
        connection_url: &str,
        protocol: &str,
    ) -> Option<RemoteServer> {
        let new_server = NewServer {
            server_name: name.to_owned(),
            connection_url: connection_url.to_owned(),
            protocol: protocol.to_owned(),
            connection_data: String::new(),
            is_inactive: false,
        };

        match self.inner.rest.add_server(&new_server).await {
            Ok(id) => Some(RemoteServer {
                id,
                name: new_server.server_name,
                connection_url: Some(new_server.connection_url),
                protocol: Some(new_server.protocol),
                connection_data: Some(new_server.connection_data),
                is_inactive: false,
            }),
            Err(e) => {
                warn!(name, error = %e, "could not add interface server");
                None
            }
        }
    }

    /// Update an interface server; `false` if the call failed.
    pub async fn update_server(&self, server: &RemoteServer) -> bool {
        match self
            .inner
            .rest
            .update_server(&ServerUpdate::from(server))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(id = server.id, error = %e, "could not update interface server");
                false
            }
        }
    }

    /// Delete an interface server; `false` if the call failed.
    pub async fn delete_server(&self, id: i64) -> bool {
        match self.inner.rest.delete_server(id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id, error = %e, "could not delete interface server");
                false
            }
        }
    }

    /// Search the asset register; errors degrade to an empty collection.
    pub async fn search_assets(&self, text: &str) -> Vec<Asset> {
        match self
            .inner
            .rest
            .search_assets(text, false, ASSET_SEARCH_PAGE_SIZE)
            .await
        {
            Ok(records) => records.into_iter().map(Asset::from).collect(),
            Err(e) => {
                warn!(text, error = %e, "asset search failed");
                Vec::new()
            }
        }
    }

    // ── Lifecycle & observation ──────────────────────────────────────

    /// Eagerly establish the hub connection.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.hub.connect().await.map_err(CoreError::Api)
    }

    /// The hub channel's current state.
    pub fn channel_state(&self) -> ChannelState {
        self.inner.hub.state()
    }

    /// Subscribe to hub channel state transitions (for status reporting).
    pub fn watch_channel(&self) -> watch::Receiver<ChannelState> {
        self.inner.hub.watch_state()
    }

    /// Subscribe to bridge notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    /// Tear down the hub connection and background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.hub.close().await;
        if let Some(handle) = self.inner.forward_task.lock().await.take() {
            let _ = handle.await;
        }
        debug!("bridge shut down");
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("server_id", &self.inner.config.server_id)
            .finish_non_exhaustive()
    }
}

/// Forward hub events onto the bridge event bus.
async fn forward_hub_events(
    mut rx: broadcast::Receiver<HubEvent>,
    events: EventBus,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(HubEvent::TagListReloaded) => {
                    events.emit(BridgeEvent::TagListChanged);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "hub event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
