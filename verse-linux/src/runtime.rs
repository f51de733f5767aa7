//! Event loop: feeds device, source and timer events into the bridge and performs its actions.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use verse_core::{
    Bridge, BridgeAction, FavoriteStore, FetchError, FetchId, Request, SendId, SendOutcome,
    Token, Verse,
};

use crate::device::DeviceChannel;
use crate::source::VerseSource;

/// Everything the bridge reacts to.
#[derive(Debug)]
pub enum Event {
    /// A device (re)connected; it gets the startup signal.
    DeviceConnected,
    Request {
        token: Token,
        request: Request,
    },
    SendOutcome {
        send_id: SendId,
        outcome: SendOutcome,
    },
    VersesFetched {
        fetch_id: FetchId,
        result: Result<Vec<Verse>, FetchError>,
    },
}

/// Run until every event sender is gone. The bridge is owned by this task only.
pub async fn run<S, C, V>(
    mut bridge: Bridge<S>,
    channel: Arc<C>,
    source: Arc<V>,
    events_tx: mpsc::UnboundedSender<Event>,
    mut events_rx: mpsc::UnboundedReceiver<Event>,
) where
    S: FavoriteStore,
    C: DeviceChannel,
    V: VerseSource,
{
    // Keep only a weak handle so the loop ends once the listener and all in-flight tasks are gone.
    let weak_tx = events_tx.downgrade();
    drop(events_tx);
    loop {
        let deadline = bridge.next_deadline();
        let event = tokio::select! {
            ev = events_rx.recv() => match ev {
                Some(ev) => Some(ev),
                None => break,
            },
            _ = sleep_until(deadline) => None,
        };
        let now = Instant::now().into_std();
        let actions = match event {
            Some(Event::DeviceConnected) => bridge.startup(now),
            Some(Event::Request { token, request }) => bridge.handle_request(token, request, now),
            Some(Event::SendOutcome { send_id, outcome }) => {
                bridge.on_send_outcome(send_id, outcome, now)
            }
            Some(Event::VersesFetched { fetch_id, result }) => {
                bridge.on_verses_fetched(fetch_id, result, now)
            }
            None => bridge.poll(now),
        };
        let Some(tx) = weak_tx.upgrade() else {
            break;
        };
        perform(actions, &channel, &source, &tx);
    }
    tracing::info!("event loop stopped");
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

fn perform<C: DeviceChannel, V: VerseSource>(
    actions: Vec<BridgeAction>,
    channel: &Arc<C>,
    source: &Arc<V>,
    events: &mpsc::UnboundedSender<Event>,
) {
    for action in actions {
        match action {
            BridgeAction::Send { send_id, packet } => {
                tracing::debug!(
                    send_id = send_id.0,
                    token = ?packet.token,
                    index = packet.index,
                    kind = ?packet.kind(),
                    "sending packet"
                );
                let channel = channel.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let outcome = channel.send(packet).await;
                    let _ = events.send(Event::SendOutcome { send_id, outcome });
                });
            }
            BridgeAction::Fetch {
                fetch_id,
                book,
                chapter,
            } => {
                let source = source.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let result = source.fetch(&book, chapter).await;
                    let _ = events.send(Event::VersesFetched { fetch_id, result });
                });
            }
            BridgeAction::Abandoned {
                token,
                index,
                tries,
                abandoned,
            } => {
                tracing::warn!(%token, index, tries, abandoned, "device unreachable, response dropped");
            }
        }
    }
}
