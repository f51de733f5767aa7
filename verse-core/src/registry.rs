//! Queue registry: token -> delivery queue, plus the single device-channel slot.
//!
//! Host-driven like the rest of the core: every entry point takes `now` and returns the
//! actions the host must perform. At most one send is outstanding process-wide; queues for
//! different tokens interleave packet by packet and never block each other beyond that.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::config::DeliveryPolicy;
use crate::protocol::{ControlSignal, ErrorClass, Packet, Payload, Token};
use crate::queue::{DeliveryQueue, QueueStep, SendId};

/// Error text delivered when a queue is abandoned after exhausting its retries.
pub const EXHAUSTED_MESSAGE: &str = "Error: Failed to deliver!";

/// Result of one device-channel send, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success { transaction_id: u32 },
    Failure { transaction_id: u32, error: String },
}

/// Action for host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryAction {
    /// Hand `packet` to the device channel; report back with `send_id`.
    Send { send_id: SendId, packet: Packet },
    /// A queue ran out of attempts and was dropped.
    Abandoned {
        token: Token,
        index: u32,
        tries: u32,
        last_transaction_id: Option<u32>,
        abandoned: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Queue(Token),
    BestEffort,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    send_id: SendId,
    origin: Origin,
}

pub struct QueueRegistry {
    policy: DeliveryPolicy,
    queues: HashMap<Token, DeliveryQueue>,
    /// Single-attempt packets outside any queue; sent before queued packets.
    best_effort: VecDeque<Packet>,
    in_flight: Option<InFlight>,
    next_send_id: u64,
}

impl QueueRegistry {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            policy,
            queues: HashMap::new(),
            best_effort: VecDeque::new(),
            in_flight: None,
            next_send_id: 1,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn queue(&self, token: Token) -> Option<&DeliveryQueue> {
        self.queues.get(&token)
    }

    pub fn has_queue(&self, token: Token) -> bool {
        self.queues.contains_key(&token)
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// True if a send is outstanding on the device channel.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Install `payloads` as the token's queue, replacing any older one, and dispatch.
    /// An empty list only removes the older queue.
    pub fn enqueue_and_dispatch(
        &mut self,
        token: Token,
        payloads: Vec<Payload>,
        now: Instant,
    ) -> Vec<DeliveryAction> {
        if let Some(old) = self.queues.remove(&token) {
            tracing::debug!(%token, remaining = old.len(), "superseding pending queue");
        }
        if payloads.is_empty() {
            tracing::debug!(%token, "nothing to deliver");
        } else {
            tracing::debug!(%token, packets = payloads.len(), "queue installed");
            self.queues
                .insert(token, DeliveryQueue::new(token, payloads, now));
        }
        self.pump(now)
    }

    /// Drop the token's queue. An outstanding send for it becomes stale. Returns true if a queue existed.
    pub fn cancel(&mut self, token: Token) -> bool {
        match self.queues.remove(&token) {
            Some(old) => {
                tracing::debug!(%token, remaining = old.len(), "queue cancelled");
                true
            }
            None => false,
        }
    }

    /// Queue a packet for a single attempt, outside the per-token retry discipline.
    pub fn send_best_effort(&mut self, packet: Packet, now: Instant) -> Vec<DeliveryAction> {
        self.best_effort.push_back(packet);
        self.pump(now)
    }

    /// Apply a channel outcome. Outcomes whose queue is gone or superseded only free the channel.
    pub fn on_send_outcome(
        &mut self,
        send_id: SendId,
        outcome: SendOutcome,
        now: Instant,
    ) -> Vec<DeliveryAction> {
        let mut actions = Vec::new();
        let origin = match self.in_flight {
            Some(f) if f.send_id == send_id => f.origin,
            _ => {
                tracing::debug!(send_id = send_id.0, "outcome for unknown send ignored");
                return actions;
            }
        };
        self.in_flight = None;
        match origin {
            Origin::BestEffort => {
                if let SendOutcome::Failure {
                    transaction_id,
                    error,
                } = &outcome
                {
                    tracing::warn!(transaction_id, %error, "best-effort packet not delivered");
                }
            }
            Origin::Queue(token) => self.apply_outcome(token, send_id, outcome, now, &mut actions),
        }
        actions.extend(self.pump(now));
        actions
    }

    /// Timer tick: start the next due send if the channel is free.
    pub fn poll(&mut self, now: Instant) -> Vec<DeliveryAction> {
        self.pump(now)
    }

    /// Earliest time a `poll` could start a send. `None` while a send is outstanding or nothing waits.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.in_flight.is_some() {
            return None;
        }
        self.queues.values().filter_map(DeliveryQueue::ready_at).min()
    }

    fn apply_outcome(
        &mut self,
        token: Token,
        send_id: SendId,
        outcome: SendOutcome,
        now: Instant,
        actions: &mut Vec<DeliveryAction>,
    ) {
        let Some(queue) = self.queues.get_mut(&token) else {
            tracing::debug!(%token, send_id = send_id.0, "stale outcome, queue gone");
            return;
        };
        if !queue.is_sending(send_id) {
            tracing::debug!(%token, send_id = send_id.0, "stale outcome, queue superseded");
            return;
        }
        let step = match outcome {
            SendOutcome::Success { .. } => queue.on_success(now, &self.policy),
            SendOutcome::Failure {
                transaction_id,
                error,
            } => {
                tracing::warn!(%token, transaction_id, %error, "failed sending packet");
                queue.on_failure(transaction_id, now, &self.policy)
            }
        };
        match step {
            QueueStep::Continue => {}
            QueueStep::Drained => {
                self.queues.remove(&token);
                tracing::debug!(%token, "queue drained");
            }
            QueueStep::Exhausted {
                index,
                tries,
                last_transaction_id,
                abandoned,
            } => {
                self.queues.remove(&token);
                tracing::error!(
                    %token,
                    index,
                    tries,
                    ?last_transaction_id,
                    abandoned,
                    "giving up on queue"
                );
                actions.push(DeliveryAction::Abandoned {
                    token,
                    index,
                    tries,
                    last_transaction_id,
                    abandoned,
                });
                if self.policy.notify_on_exhaustion {
                    self.best_effort.push_back(Packet {
                        token: Some(token),
                        index,
                        payload: Payload::Control(ControlSignal::error(
                            ErrorClass::TransportExhausted,
                            EXHAUSTED_MESSAGE,
                        )),
                    });
                }
            }
        }
    }

    fn allocate_send_id(&mut self) -> SendId {
        let id = SendId(self.next_send_id);
        self.next_send_id += 1;
        id
    }

    fn pump(&mut self, now: Instant) -> Vec<DeliveryAction> {
        if self.in_flight.is_some() {
            return vec![];
        }
        if let Some(packet) = self.best_effort.pop_front() {
            let send_id = self.allocate_send_id();
            self.in_flight = Some(InFlight {
                send_id,
                origin: Origin::BestEffort,
            });
            return vec![DeliveryAction::Send { send_id, packet }];
        }
        let next = self
            .queues
            .values()
            .filter(|q| q.is_ready(now))
            .min_by_key(|q| (q.ready_at(), q.token()))
            .map(DeliveryQueue::token);
        let Some(token) = next else {
            return vec![];
        };
        let send_id = self.allocate_send_id();
        let Some(packet) = self
            .queues
            .get_mut(&token)
            .and_then(|q| q.begin_send(send_id))
        else {
            return vec![];
        };
        if let Some(head) = self.queues.get(&token).and_then(DeliveryQueue::head) {
            if head.num_tries > 0 {
                tracing::debug!(%token, index = packet.index, tries = head.num_tries, "resending packet");
            }
        }
        self.in_flight = Some(InFlight {
            send_id,
            origin: Origin::Queue(token),
        });
        vec![DeliveryAction::Send { send_id, packet }]
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}
