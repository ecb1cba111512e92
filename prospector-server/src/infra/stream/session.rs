use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive};
use prospector_core::{
    database::ports::RunLogRepository,
    event_bus::{CrawlerEventBus, SubscriberId},
    types::{CrawlerEvent, CrawlerId, PageRequest},
};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const KEEP_ALIVE_TEXT: &str = "keep-alive";

/// One client connection following a crawler's runs.
///
/// The session subscribes first and only then reads the snapshot, so an event
/// published in between may show up both in `init` and as a live frame, but
/// is never lost.
pub struct StreamSession {
    bus: Arc<CrawlerEventBus>,
    runs: Arc<dyn RunLogRepository>,
    config_id: CrawlerId,
    page: PageRequest,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("config_id", &self.config_id)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    pub fn new(
        bus: Arc<CrawlerEventBus>,
        runs: Arc<dyn RunLogRepository>,
        config_id: CrawlerId,
        page: PageRequest,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bus,
            runs,
            config_id,
            page,
            shutdown,
        }
    }

    /// Subscribes to the crawler's topic and yields the `init` snapshot
    /// followed by live events until shutdown or until the stream is dropped.
    pub fn into_frames(self) -> impl Stream<Item = CrawlerEvent> + Send + 'static {
        let Self {
            bus,
            runs,
            config_id,
            page,
            shutdown,
        } = self;

        let topic = config_id.topic();
        let mut subscription = bus.subscribe(&topic);
        let guard = UnsubscribeGuard {
            bus,
            topic,
            id: subscription.id(),
        };
        info!(%config_id, subscriber = ?guard.id, "run stream opened");

        async_stream::stream! {
            let guard = guard;

            match runs.list_runs(config_id, page).await {
                Ok(snapshot) => yield CrawlerEvent::Init(snapshot),
                Err(err) => {
                    warn!(%config_id, error = %err, "run stream snapshot failed");
                    drop(guard);
                    yield CrawlerEvent::error("Failed to load run history");
                    return;
                }
            }

            loop {
                let next = tokio::select! {
                    _ = shutdown.cancelled() => None,
                    event = subscription.recv() => event,
                };
                match next {
                    Some(event) => yield event,
                    None => break,
                }
            }

            debug!(%config_id, subscriber = ?guard.id, "run stream finished");
        }
    }
}

/// Removes the session's subscription exactly once, whichever way the stream
/// ends.
struct UnsubscribeGuard {
    bus: Arc<CrawlerEventBus>,
    topic: String,
    id: SubscriberId,
}

impl Drop for UnsubscribeGuard {
    fn drop(&mut self) {
        let removed = self.bus.unsubscribe(&self.topic, self.id);
        info!(topic = %self.topic, subscriber = ?self.id, removed, "run stream closed");
    }
}

/// Encodes a frame as `event: <type>` plus JSON `data`.
pub fn frame_to_sse(frame: &CrawlerEvent) -> Option<Event> {
    match frame.data_json() {
        Ok(data) => Some(
            Event::default()
                .event(frame.event_type().event_name())
                .data(data),
        ),
        Err(err) => {
            warn!(event = %frame.event_type(), error = %err, "dropping unencodable frame");
            None
        }
    }
}

pub fn sse_events(
    frames: impl Stream<Item = CrawlerEvent> + Send + 'static,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    frames.filter_map(|frame| frame_to_sse(&frame).map(Ok))
}

pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text(KEEP_ALIVE_TEXT)
}
