//! Process-wide publish/subscribe channel.
//!
//! Components never hold references to each other; they publish [`WmEvent`]s
//! here and subscribe to the tags they care about. Dispatch is synchronous
//! and priority ordered. Events published from inside a handler are queued
//! and delivered after the current dispatch finishes, so a handler never
//! observes a half-delivered event.

mod broadcast;
mod event;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::{Future, poll_fn};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{BroadcastError, HandlerError};

pub use broadcast::{BroadcastChannel, LoopbackChannel, LoopbackHub};
pub use event::{Envelope, EventName, OriginId, WmEvent};

pub type HandlerResult = Result<(), HandlerError>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult>>>;

type SyncHandler = Rc<RefCell<dyn FnMut(&Envelope) -> HandlerResult>>;
type AsyncHandler = Rc<RefCell<dyn FnMut(&Envelope) -> HandlerFuture>>;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(1);

/// Tag for bulk removal of a component's subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub once: bool,
    pub scope: Option<Scope>,
    /// Higher runs first.
    pub priority: i32,
}

impl SubscribeOptions {
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

struct Subscription {
    id: SubscriptionId,
    name: EventName,
    handler: Handler,
    once: bool,
    scope: Option<Scope>,
    priority: i32,
}

#[derive(Clone)]
struct Target {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
    scope: Option<Scope>,
}

struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct EventBus {
    origin: OriginId,
    subscriptions: RefCell<Vec<Subscription>>,
    queue: RefCell<VecDeque<Envelope>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
    broadcast: RefCell<Option<Box<dyn BroadcastChannel>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let seq = NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let origin = OriginId(nanos ^ (u64::from(std::process::id()) << 32) ^ seq);
        Self {
            origin,
            subscriptions: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            next_id: Cell::new(0),
            broadcast: RefCell::new(None),
        }
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn subscribe<F>(&self, name: EventName, handler: F, options: SubscribeOptions) -> SubscriptionId
    where
        F: FnMut(&Envelope) -> HandlerResult + 'static,
    {
        self.insert(name, Handler::Sync(Rc::new(RefCell::new(handler))), options)
    }

    /// Register a handler whose work completes asynchronously.
    ///
    /// [`publish_awaited`](Self::publish_awaited) awaits the returned future;
    /// plain [`publish`](Self::publish) polls it once and drops it if it is
    /// still pending.
    pub fn subscribe_async<F>(
        &self,
        name: EventName,
        handler: F,
        options: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: FnMut(&Envelope) -> HandlerFuture + 'static,
    {
        self.insert(name, Handler::Async(Rc::new(RefCell::new(handler))), options)
    }

    fn insert(&self, name: EventName, handler: Handler, options: SubscribeOptions) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            name,
            handler,
            once: options.once,
            scope: options.scope,
            priority: options.priority,
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Remove every subscription tagged with `scope`; returns how many went.
    pub fn unsubscribe_scope(&self, scope: &Scope) -> usize {
        let mut subs = self.subscriptions.borrow_mut();
        let before = subs.len();
        subs.retain(|s| s.scope.as_ref() != Some(scope));
        let removed = before - subs.len();
        tracing::debug!(%scope, removed, "released scope subscriptions");
        removed
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.name == name)
            .count()
    }

    pub fn scope_count(&self, scope: &Scope) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.scope.as_ref() == Some(scope))
            .count()
    }

    /// Deliver `event` to every subscriber before returning, unless a
    /// dispatch is already running, in which case it is queued behind it.
    pub fn publish(&self, event: WmEvent) {
        let envelope = Envelope::new(event, self.origin);
        self.forward(&envelope);
        self.queue.borrow_mut().push_back(envelope);
        self.drain();
    }

    /// Like [`publish`](Self::publish), but awaits async handlers one after
    /// another in priority order.
    pub async fn publish_awaited(&self, event: WmEvent) {
        let envelope = Envelope::new(event, self.origin);
        self.forward(&envelope);
        self.queue.borrow_mut().push_back(envelope);
        if self.dispatching.get() {
            return;
        }
        self.dispatching.set(true);
        let _guard = DispatchGuard(&self.dispatching);
        while let Some(envelope) = self.pop() {
            for target in self.targets(envelope.name()) {
                if !self.claim(&target) {
                    continue;
                }
                let outcome = match &target.handler {
                    Handler::Sync(handler) => call_sync(handler, &envelope),
                    Handler::Async(handler) => match start_async(handler, &envelope) {
                        Ok(future) => await_caught(future).await,
                        Err(err) => Err(err),
                    },
                };
                if let Err(err) = outcome {
                    self.report_failure(&envelope, &target, err);
                }
            }
        }
    }

    fn pop(&self) -> Option<Envelope> {
        self.queue.borrow_mut().pop_front()
    }

    fn drain(&self) {
        if self.dispatching.get() {
            return;
        }
        self.dispatching.set(true);
        let _guard = DispatchGuard(&self.dispatching);
        while let Some(envelope) = self.pop() {
            self.dispatch(&envelope);
        }
    }

    fn dispatch(&self, envelope: &Envelope) {
        for target in self.targets(envelope.name()) {
            if !self.claim(&target) {
                continue;
            }
            let outcome = match &target.handler {
                Handler::Sync(handler) => call_sync(handler, envelope),
                Handler::Async(handler) => {
                    start_async(handler, envelope).and_then(|future| match poll_once(future) {
                        Some(result) => result,
                        None => {
                            tracing::warn!(
                                event = %envelope.name(),
                                "async handler still pending after synchronous publish; dropped"
                            );
                            Ok(())
                        }
                    })
                }
            };
            if let Err(err) = outcome {
                self.report_failure(envelope, &target, err);
            }
        }
    }

    /// Snapshot of the handlers for `name`, highest priority first. The sort
    /// is stable, so equal priorities keep subscription order.
    fn targets(&self, name: EventName) -> Vec<Target> {
        let subs = self.subscriptions.borrow();
        let mut ranked: Vec<(i32, Target)> = subs
            .iter()
            .filter(|s| s.name == name)
            .map(|s| {
                (
                    s.priority,
                    Target {
                        id: s.id,
                        handler: s.handler.clone(),
                        once: s.once,
                        scope: s.scope.clone(),
                    },
                )
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, target)| target).collect()
    }

    /// Check the target is still subscribed (an earlier handler may have
    /// removed it) and consume it if it is a once-subscription.
    fn claim(&self, target: &Target) -> bool {
        let mut subs = self.subscriptions.borrow_mut();
        let Some(index) = subs.iter().position(|s| s.id == target.id) else {
            return false;
        };
        if target.once {
            subs.remove(index);
        }
        true
    }

    fn report_failure(&self, envelope: &Envelope, target: &Target, err: HandlerError) {
        let event_name = envelope.name();
        tracing::warn!(
            event = %event_name,
            scope = ?target.scope,
            error = %err,
            "event handler failed"
        );
        // A failing diagnostic handler is only logged, never re-published.
        if event_name == EventName::HandlerFailed {
            return;
        }
        self.publish(WmEvent::HandlerFailed {
            event_name,
            error: err.to_string(),
            scope: target.scope.clone(),
        });
    }

    pub fn set_broadcast(&self, channel: Box<dyn BroadcastChannel>) {
        *self.broadcast.borrow_mut() = Some(channel);
    }

    pub fn clear_broadcast(&self) -> Option<Box<dyn BroadcastChannel>> {
        self.broadcast.borrow_mut().take()
    }

    pub fn broadcast_enabled(&self) -> bool {
        self.broadcast.borrow().is_some()
    }

    fn forward(&self, envelope: &Envelope) {
        let mut slot = self.broadcast.borrow_mut();
        let Some(channel) = slot.as_mut() else {
            return;
        };
        let result = serde_json::to_string(envelope)
            .map_err(BroadcastError::from)
            .and_then(|json| channel.post(&json));
        if let Err(err) = result {
            tracing::warn!(event = %envelope.name(), error = %err, "broadcast post failed");
        }
    }

    /// Deliver one serialized envelope from another bus.
    ///
    /// Returns `Ok(false)` for this bus's own echo. Remote events are
    /// dispatched locally but never re-posted.
    pub fn receive_broadcast(&self, message: &str) -> Result<bool, BroadcastError> {
        let envelope: Envelope = serde_json::from_str(message)?;
        if envelope.origin == self.origin {
            tracing::trace!(event = %envelope.name(), "skipping own broadcast echo");
            return Ok(false);
        }
        self.queue.borrow_mut().push_back(envelope);
        self.drain();
        Ok(true)
    }

    /// Drain the broadcast channel's inbox; returns how many remote events
    /// were delivered.
    pub fn pump_broadcast(&self) -> usize {
        let mut delivered = 0;
        loop {
            let message = {
                let mut slot = self.broadcast.borrow_mut();
                match slot.as_mut().and_then(|channel| channel.try_recv()) {
                    Some(message) => message,
                    None => break,
                }
            };
            match self.receive_broadcast(&message) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(error = %err, "dropping malformed broadcast"),
            }
        }
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "<non-string panic>".to_string()
    }
}

fn call_sync(handler: &SyncHandler, envelope: &Envelope) -> HandlerResult {
    let Ok(mut handler) = handler.try_borrow_mut() else {
        return Err(HandlerError::failed("handler is already running"));
    };
    panic::catch_unwind(AssertUnwindSafe(|| (*handler)(envelope)))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}

fn start_async(handler: &AsyncHandler, envelope: &Envelope) -> Result<HandlerFuture, HandlerError> {
    let Ok(mut handler) = handler.try_borrow_mut() else {
        return Err(HandlerError::failed("handler is already running"));
    };
    panic::catch_unwind(AssertUnwindSafe(|| (*handler)(envelope)))
        .map_err(|payload| HandlerError::Panicked(panic_message(payload.as_ref())))
}

fn poll_once(mut future: HandlerFuture) -> Option<HandlerResult> {
    let mut cx = Context::from_waker(Waker::noop());
    match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
        Ok(Poll::Ready(result)) => Some(result),
        Ok(Poll::Pending) => None,
        Err(payload) => Some(Err(HandlerError::Panicked(panic_message(payload.as_ref())))),
    }
}

async fn await_caught(mut future: HandlerFuture) -> HandlerResult {
    poll_fn(
        |cx| match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
            Ok(poll) => poll,
            Err(payload) => Poll::Ready(Err(HandlerError::Panicked(panic_message(
                payload.as_ref(),
            )))),
        },
    )
    .await
}
