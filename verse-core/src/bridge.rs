//! Request router and host-driven API: Bridge receives events from host, returns actions.

use std::collections::HashMap;
use std::time::Instant;

use crate::bible;
use crate::chunk::{self, VerseRange};
use crate::clean::clean_text;
use crate::config::Config;
use crate::favorite::{Favorite, FavoriteList, FavoriteStore};
use crate::protocol::{ControlSignal, ErrorClass, Packet, Payload, Request, Token};
use crate::queue::SendId;
use crate::registry::{DeliveryAction, QueueRegistry, SendOutcome};
use crate::verse::{self, FetchError, Verse, VerseCache};

/// Handle for one verse-source fetch issued by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchId(pub u64);

/// Action for host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    /// Send `packet` on the device channel and report the outcome with `send_id`.
    Send { send_id: SendId, packet: Packet },
    /// Fetch a chapter from the verse source and report it with `fetch_id`.
    Fetch {
        fetch_id: FetchId,
        book: String,
        chapter: u16,
    },
    /// A token's queue was dropped after exhausting its retries. Informational.
    Abandoned {
        token: Token,
        index: u32,
        tries: u32,
        abandoned: usize,
    },
}

impl From<DeliveryAction> for BridgeAction {
    fn from(action: DeliveryAction) -> Self {
        match action {
            DeliveryAction::Send { send_id, packet } => BridgeAction::Send { send_id, packet },
            DeliveryAction::Abandoned {
                token,
                index,
                tries,
                abandoned,
                ..
            } => BridgeAction::Abandoned {
                token,
                index,
                tries,
                abandoned,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchPurpose {
    Ranges,
    Viewer(VerseRange),
}

struct PendingFetch {
    token: Token,
    book: String,
    chapter: u16,
    purpose: FetchPurpose,
    /// Cleared when a newer request (or cancel) for the token arrives.
    live: bool,
}

/// Request router plus delivery state. Host passes events; bridge returns actions.
pub struct Bridge<S> {
    config: Config,
    registry: QueueRegistry,
    favorites: FavoriteList<S>,
    cache: VerseCache,
    fetches: HashMap<FetchId, PendingFetch>,
    next_fetch_id: u64,
}

impl<S: FavoriteStore> Bridge<S> {
    pub fn new(config: Config, store: S) -> Self {
        Self {
            registry: QueueRegistry::new(config.delivery.clone()),
            favorites: FavoriteList::new(store),
            cache: VerseCache::new(config.cache_chapters),
            fetches: HashMap::new(),
            next_fetch_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn favorites(&self) -> &FavoriteList<S> {
        &self.favorites
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    /// Announce readiness to the device. Single attempt, outside any token's queue.
    pub fn startup(&mut self, now: Instant) -> Vec<BridgeAction> {
        let packet = Packet {
            token: None,
            index: 0,
            payload: Payload::Control(ControlSignal::Initialized),
        };
        into_actions(self.registry.send_best_effort(packet, now))
    }

    /// Route one device request. Any request supersedes what is pending for its token.
    pub fn handle_request(
        &mut self,
        token: Token,
        request: Request,
        now: Instant,
    ) -> Vec<BridgeAction> {
        tracing::debug!(%token, kind = ?request.kind(), "request received");
        self.invalidate_fetches(token);
        match request {
            Request::ListBooksForTestament { testament } => {
                let payloads = match bible::books_for_testament(testament) {
                    Some(books) => books
                        .iter()
                        .map(|b| Payload::Book {
                            name: b.name.to_string(),
                            chapters: b.chapters,
                        })
                        .collect(),
                    None => vec![bad_request(format!(
                        "Error: Unknown testament {testament}"
                    ))],
                };
                self.deliver(token, payloads, now)
            }
            Request::RequestVerseRanges { book, chapter } => {
                self.with_chapter(token, book, chapter, FetchPurpose::Ranges, now)
            }
            Request::RequestViewerText {
                book,
                chapter,
                range,
            } => match range.parse::<VerseRange>() {
                Ok(range) => {
                    self.with_chapter(token, book, chapter, FetchPurpose::Viewer(range), now)
                }
                Err(e) => {
                    tracing::warn!(%token, error = %e, "rejecting viewer request");
                    self.deliver(token, vec![bad_request("Error: Invalid verse range!")], now)
                }
            },
            Request::RequestFavorites => {
                let payloads = self.favorite_payloads();
                self.deliver(token, payloads, now)
            }
            Request::ToggleFavorite {
                book,
                chapter,
                range,
            } => {
                let changed = self.toggle_favorite(Favorite::new(book, chapter, range));
                let payloads = if changed {
                    vec![Payload::Control(ControlSignal::FavoritesChanged)]
                } else {
                    vec![]
                };
                self.deliver(token, payloads, now)
            }
            Request::Cancel => {
                self.registry.cancel(token);
                vec![]
            }
        }
    }

    /// Verse source answered. Stale answers only warm the cache.
    pub fn on_verses_fetched(
        &mut self,
        fetch_id: FetchId,
        result: Result<Vec<Verse>, FetchError>,
        now: Instant,
    ) -> Vec<BridgeAction> {
        let Some(pending) = self.fetches.remove(&fetch_id) else {
            tracing::debug!(fetch_id = fetch_id.0, "result for unknown fetch ignored");
            return vec![];
        };
        if let Ok(verses) = &result {
            self.cache
                .insert(&pending.book, pending.chapter, verses.clone());
        }
        if !pending.live {
            tracing::debug!(token = %pending.token, fetch_id = fetch_id.0, "stale fetch discarded");
            return vec![];
        }
        let payloads = match result {
            Ok(verses) => self.render(pending.purpose, &verses),
            Err(e) => {
                tracing::warn!(
                    token = %pending.token,
                    book = %pending.book,
                    chapter = pending.chapter,
                    error = %e,
                    "verse fetch failed"
                );
                vec![Payload::Control(e.to_signal())]
            }
        };
        self.deliver(pending.token, payloads, now)
    }

    pub fn on_send_outcome(
        &mut self,
        send_id: SendId,
        outcome: SendOutcome,
        now: Instant,
    ) -> Vec<BridgeAction> {
        into_actions(self.registry.on_send_outcome(send_id, outcome, now))
    }

    /// Timer tick. Call at or after [`Bridge::next_deadline`].
    pub fn poll(&mut self, now: Instant) -> Vec<BridgeAction> {
        into_actions(self.registry.poll(now))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.registry.next_deadline()
    }

    fn with_chapter(
        &mut self,
        token: Token,
        book: String,
        chapter: u16,
        purpose: FetchPurpose,
        now: Instant,
    ) -> Vec<BridgeAction> {
        if let Some(info) = bible::find_book(&book) {
            if chapter == 0 || chapter > info.chapters {
                tracing::warn!(%token, %book, chapter, "chapter out of range");
                return self.deliver(token, vec![bad_request("Error: Invalid chapter!")], now);
            }
        }
        if let Some(verses) = self.cache.get(&book, chapter) {
            let payloads = self.render(purpose, verses);
            return self.deliver(token, payloads, now);
        }
        // Older content for this token is no longer wanted while we wait.
        self.registry.cancel(token);
        let fetch_id = FetchId(self.next_fetch_id);
        self.next_fetch_id += 1;
        self.fetches.insert(
            fetch_id,
            PendingFetch {
                token,
                book: book.clone(),
                chapter,
                purpose,
                live: true,
            },
        );
        tracing::debug!(%token, %book, chapter, fetch_id = fetch_id.0, "fetching chapter");
        vec![BridgeAction::Fetch {
            fetch_id,
            book,
            chapter,
        }]
    }

    fn render(&self, purpose: FetchPurpose, verses: &[Verse]) -> Vec<Payload> {
        match purpose {
            FetchPurpose::Ranges => chunk::batch_ranges(verses.len() as u32, self.config.verse_batch)
                .into_iter()
                .map(|r| Payload::VerseBatchName {
                    range: r.to_string(),
                })
                .collect(),
            FetchPurpose::Viewer(range) => {
                let text = clean_text(&verse::viewer_text(verses, range));
                chunk::split_text(&text, self.config.packet_length)
                    .into_iter()
                    .map(|content| Payload::ViewerContent { content })
                    .collect()
            }
        }
    }

    fn favorite_payloads(&self) -> Vec<Payload> {
        if self.favorites.is_empty() {
            return vec![Payload::Favorite(None)];
        }
        self.favorites
            .iter()
            .cloned()
            .map(|f| Payload::Favorite(Some(f)))
            .collect()
    }

    fn toggle_favorite(&mut self, favorite: Favorite) -> bool {
        if self.favorites.contains(&favorite) {
            let removed = self.favorites.remove(&favorite);
            if removed {
                tracing::info!(%favorite, "favorite removed");
            }
            removed
        } else {
            tracing::info!(%favorite, "favorite added");
            self.favorites.add(favorite)
        }
    }

    fn invalidate_fetches(&mut self, token: Token) {
        for pending in self.fetches.values_mut().filter(|p| p.token == token) {
            pending.live = false;
        }
    }

    fn deliver(&mut self, token: Token, payloads: Vec<Payload>, now: Instant) -> Vec<BridgeAction> {
        into_actions(self.registry.enqueue_and_dispatch(token, payloads, now))
    }
}

fn into_actions(actions: Vec<DeliveryAction>) -> Vec<BridgeAction> {
    actions.into_iter().map(BridgeAction::from).collect()
}

fn bad_request(message: impl Into<String>) -> Payload {
    Payload::Control(ControlSignal::error(ErrorClass::BadRequest, message))
}
