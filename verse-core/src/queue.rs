//! Delivery queue: one token's ordered packets and its send/retry state machine.
//!
//! `Idle` (head waiting for its ready time) -> `Sending` (head handed to the channel)
//! -> back to `Idle` on success (head popped, next after the inter-message delay) or on
//! failure (head kept, retried after the retry delay). A head that fails `max_tries`
//! times ends the queue: it and everything behind it are abandoned.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::DeliveryPolicy;
use crate::protocol::{Packet, Payload, Token};

/// Process-unique handle for one send attempt. Outcomes are matched by this id only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SendId(pub u64);

/// A packet plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    pub packet: Packet,
    /// Failed attempts so far.
    pub num_tries: u32,
    /// Transaction id the channel reported for the last failed attempt.
    pub last_transaction_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle { ready_at: Instant },
    Sending { send_id: SendId },
}

/// What a send outcome did to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStep {
    /// More packets (or a retry) are scheduled.
    Continue,
    /// Last packet acknowledged; the queue is done.
    Drained,
    /// Head ran out of attempts; `abandoned` packets (head included) are dropped.
    Exhausted {
        index: u32,
        tries: u32,
        last_transaction_id: Option<u32>,
        abandoned: usize,
    },
}

pub struct DeliveryQueue {
    token: Token,
    pending: VecDeque<PendingDelivery>,
    state: QueueState,
}

impl DeliveryQueue {
    /// Build a queue from payloads in order; indices are assigned 0..n-1. First send is due at `now`.
    pub fn new(token: Token, payloads: Vec<Payload>, now: Instant) -> Self {
        let pending = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| PendingDelivery {
                packet: Packet {
                    token: Some(token),
                    index: i as u32,
                    payload,
                },
                num_tries: 0,
                last_transaction_id: None,
            })
            .collect();
        Self {
            token,
            pending,
            state: QueueState::Idle { ready_at: now },
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn head(&self) -> Option<&PendingDelivery> {
        self.pending.front()
    }

    /// When the head may be sent, if the queue is idle and non-empty.
    pub fn ready_at(&self) -> Option<Instant> {
        match self.state {
            QueueState::Idle { ready_at } if !self.pending.is_empty() => Some(ready_at),
            _ => None,
        }
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.ready_at().is_some_and(|at| at <= now)
    }

    pub fn is_sending(&self, send_id: SendId) -> bool {
        self.state == QueueState::Sending { send_id }
    }

    /// Hand the head to the channel. Returns `None` if there is nothing idle to send.
    pub fn begin_send(&mut self, send_id: SendId) -> Option<Packet> {
        if !matches!(self.state, QueueState::Idle { .. }) {
            return None;
        }
        let packet = self.pending.front()?.packet.clone();
        self.state = QueueState::Sending { send_id };
        Some(packet)
    }

    /// Head acknowledged: pop it and schedule the next one.
    pub fn on_success(&mut self, now: Instant, policy: &DeliveryPolicy) -> QueueStep {
        debug_assert!(matches!(self.state, QueueState::Sending { .. }));
        self.pending.pop_front();
        self.state = QueueState::Idle {
            ready_at: now + policy.inter_message_delay,
        };
        if self.pending.is_empty() {
            QueueStep::Drained
        } else {
            QueueStep::Continue
        }
    }

    /// Head failed: count the attempt, then retry later or give up on the whole queue.
    pub fn on_failure(
        &mut self,
        transaction_id: u32,
        now: Instant,
        policy: &DeliveryPolicy,
    ) -> QueueStep {
        debug_assert!(matches!(self.state, QueueState::Sending { .. }));
        self.state = QueueState::Idle {
            ready_at: now + policy.retry_delay,
        };
        let abandoned = self.pending.len();
        let Some(head) = self.pending.front_mut() else {
            return QueueStep::Drained;
        };
        head.num_tries += 1;
        head.last_transaction_id = Some(transaction_id);
        if head.num_tries < policy.max_tries {
            return QueueStep::Continue;
        }
        let step = QueueStep::Exhausted {
            index: head.packet.index,
            tries: head.num_tries,
            last_transaction_id: head.last_transaction_id,
            abandoned,
        };
        self.pending.clear();
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payloads(n: usize) -> Vec<Payload> {
        (0..n)
            .map(|i| Payload::ViewerContent {
                content: format!("part {i}"),
            })
            .collect()
    }

    #[test]
    fn indices_follow_list_order() {
        let now = Instant::now();
        let mut q = DeliveryQueue::new(Token(5), payloads(3), now);
        assert_eq!(q.len(), 3);
        assert!(q.is_ready(now));
        let p = q.begin_send(SendId(1)).unwrap();
        assert_eq!(p.index, 0);
        assert_eq!(p.token, Some(Token(5)));
        assert!(q.is_sending(SendId(1)));
        assert!(q.begin_send(SendId(2)).is_none());
    }

    #[test]
    fn success_pops_and_waits_inter_message_delay() {
        let policy = DeliveryPolicy::default();
        let now = Instant::now();
        let mut q = DeliveryQueue::new(Token(1), payloads(2), now);
        q.begin_send(SendId(1));
        assert_eq!(q.on_success(now, &policy), QueueStep::Continue);
        assert_eq!(q.ready_at(), Some(now + policy.inter_message_delay));
        assert!(!q.is_ready(now));
        assert_eq!(q.head().unwrap().packet.index, 1);

        let later = now + policy.inter_message_delay;
        q.begin_send(SendId(2));
        assert_eq!(q.on_success(later, &policy), QueueStep::Drained);
        assert!(q.is_empty());
    }

    #[test]
    fn failure_keeps_head_and_waits_retry_delay() {
        let policy = DeliveryPolicy::default();
        let now = Instant::now();
        let mut q = DeliveryQueue::new(Token(1), payloads(2), now);
        q.begin_send(SendId(1));
        assert_eq!(q.on_failure(77, now, &policy), QueueStep::Continue);
        let head = q.head().unwrap();
        assert_eq!(head.packet.index, 0);
        assert_eq!(head.num_tries, 1);
        assert_eq!(head.last_transaction_id, Some(77));
        assert_eq!(q.ready_at(), Some(now + policy.retry_delay));
    }

    #[test]
    fn exhausting_tries_abandons_everything() {
        let policy = DeliveryPolicy {
            max_tries: 2,
            ..DeliveryPolicy::default()
        };
        let mut now = Instant::now();
        let mut q = DeliveryQueue::new(Token(1), payloads(4), now);
        q.begin_send(SendId(1));
        assert_eq!(q.on_success(now, &policy), QueueStep::Continue);

        q.begin_send(SendId(2));
        assert_eq!(q.on_failure(10, now, &policy), QueueStep::Continue);
        now += Duration::from_secs(3);
        q.begin_send(SendId(3));
        assert_eq!(
            q.on_failure(11, now, &policy),
            QueueStep::Exhausted {
                index: 1,
                tries: 2,
                last_transaction_id: Some(11),
                abandoned: 3,
            }
        );
        assert!(q.is_empty());
        assert!(q.ready_at().is_none());
    }
}
