//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::models::{
    CommandInvocation, Configuration, DestinationRef, InboundMessage, PollSpec,
};
use rollcall_core::scheduler::Clock;
use rollcall_core::transport::{Identity, PollTransport, TransportError, UpdateSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// One recorded `send_poll` call.
#[derive(Debug, Clone)]
pub struct PollCall {
    pub destination: DestinationRef,
    pub poll: PollSpec,
    pub at: tokio::time::Instant,
}

/// In-memory transport that records calls and replays queued inbound batches.
#[derive(Default)]
pub struct MockTransport {
    pub poll_calls: Mutex<Vec<PollCall>>,
    pub replies: Mutex<Vec<(CommandInvocation, String)>>,
    pub get_self_calls: AtomicUsize,
    /// Sends that ran to the end, after any configured delay
    pub completed_sends: AtomicUsize,
    pub closed: AtomicBool,
    send_failure: Mutex<Option<String>>,
    send_delay: Mutex<Option<Duration>>,
    panic_on_send: AtomicBool,
    panic_on_fetch: AtomicBool,
    fail_get_self: AtomicBool,
    fail_replies: AtomicBool,
    inbound: Mutex<VecDeque<Result<Vec<InboundMessage>, TransportError>>>,
    inbound_ready: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `send_poll` fail with an API error carrying `description`.
    pub fn fail_sends(&self, description: &str) {
        *self.send_failure.lock().unwrap() = Some(description.to_string());
    }

    pub fn succeed_sends(&self) {
        *self.send_failure.lock().unwrap() = None;
    }

    pub fn panic_on_send(&self) {
        self.panic_on_send.store(true, Ordering::SeqCst);
    }

    /// Make every `send_poll` take `delay` before it returns.
    pub fn slow_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    /// Make `next_updates` panic, ending whatever loop is polling it.
    pub fn panic_on_fetch(&self) {
        self.panic_on_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fail_get_self(&self) {
        self.fail_get_self.store(true, Ordering::SeqCst);
    }

    pub fn fail_replies(&self) {
        self.fail_replies.store(true, Ordering::SeqCst);
    }

    pub fn push_messages(&self, messages: Vec<InboundMessage>) {
        self.inbound.lock().unwrap().push_back(Ok(messages));
        self.inbound_ready.notify_one();
    }

    pub fn push_fetch_error(&self) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Network("connection reset".to_string())));
        self.inbound_ready.notify_one();
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.lock().unwrap().len()
    }

    pub fn reply_texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollTransport for MockTransport {
    async fn send_poll(
        &self,
        destination: &DestinationRef,
        poll: &PollSpec,
    ) -> Result<(), TransportError> {
        self.poll_calls.lock().unwrap().push(PollCall {
            destination: destination.clone(),
            poll: poll.clone(),
            at: tokio::time::Instant::now(),
        });
        if self.panic_on_send.load(Ordering::SeqCst) {
            panic!("transport exploded");
        }
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.completed_sends.fetch_add(1, Ordering::SeqCst);
        let failure = self.send_failure.lock().unwrap().clone();
        match failure {
            Some(description) => Err(TransportError::Api {
                code: 400,
                description,
            }),
            None => Ok(()),
        }
    }

    async fn get_self(&self) -> Result<Identity, TransportError> {
        self.get_self_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_self.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: 401,
                description: "Unauthorized".to_string(),
            });
        }
        Ok(Identity {
            id: 1,
            username: Some("rollcall_bot".to_string()),
        })
    }

    async fn reply(
        &self,
        invocation: &CommandInvocation,
        text: &str,
    ) -> Result<(), TransportError> {
        self.replies
            .lock()
            .unwrap()
            .push((invocation.clone(), text.to_string()));
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(TransportError::Network("reply dropped".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpdateSource for MockTransport {
    async fn next_updates(&self) -> Result<Vec<InboundMessage>, TransportError> {
        if self.panic_on_fetch.load(Ordering::SeqCst) {
            panic!("update source exploded");
        }
        loop {
            let next = self.inbound.lock().unwrap().pop_front();
            if let Some(batch) = next {
                return batch;
            }
            self.inbound_ready.notified().await;
        }
    }
}

/// Clock that follows tokio's (possibly paused) timer, offset by a base instant.
/// `jump` simulates the process being suspended while wall time moves on.
pub struct TestClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
    skew: Mutex<chrono::Duration>,
}

impl TestClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
            skew: Mutex::new(chrono::Duration::zero()),
        }
    }

    pub fn jump(&self, by: Duration) {
        let mut skew = self.skew.lock().unwrap();
        *skew = *skew + chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
        self.base + elapsed + *self.skew.lock().unwrap()
    }
}

pub fn text_message(chat_id: i64, thread_id: Option<i64>, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        thread_id,
        in_topic: thread_id.is_some(),
        message_id: 10,
        sender_id: Some(77),
        text: Some(text.to_string()),
    }
}

pub fn sample_poll() -> PollSpec {
    PollSpec::new(
        "Today",
        vec!["in".to_string(), "out".to_string(), "late".to_string()],
        false,
        false,
    )
    .unwrap()
}

pub fn sample_destination() -> DestinationRef {
    DestinationRef::new("-1001", Some(865)).unwrap()
}

/// A configuration that validates, as if BOT_TOKEN and CHAT_ID were set.
pub fn valid_config() -> Configuration {
    let mut config = Configuration::default();
    config.bot_token = Some("123:test".to_string());
    config.destination.chat_id = Some("-1001".to_string());
    config
}

/// Yield in small steps until `cond` holds or the attempts run out.
pub async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
