// Deferred-dispatch queue: calls, property sets, and notifications recorded
// now and delivered at the next flush, in push order.
//
// Targets are entity ids, never pointers, so a queued message outliving its
// target is dropped at delivery instead of dangling.

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use tracing::{error, warn};

use crate::callable::Callable;
use crate::entity::{entity_registry, EntityId};
use crate::error::CallError;
use crate::string_name::StringName;
use crate::variant::Variant;

enum Message {
    Call {
        target: EntityId,
        method: StringName,
        args: Vec<Variant>,
        show_error: bool,
    },
    CallCallable {
        callable: Callable,
        args: Vec<Variant>,
        show_error: bool,
    },
    Set {
        target: EntityId,
        property: StringName,
        value: Variant,
    },
    Notification {
        target: EntityId,
        what: i32,
    },
}

struct QueueInner {
    messages: VecDeque<Message>,
    /// High-water mark, for leak diagnostics.
    max_len: usize,
}

thread_local! {
    // Reentrancy guard; a handler must not flush the queue it is being
    // delivered from.
    static FLUSHING: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

pub struct MessageQueue {
    inner: Mutex<QueueInner>,
}

static QUEUE: OnceLock<MessageQueue> = OnceLock::new();

/// The process-wide deferred-message queue.
pub fn message_queue() -> &'static MessageQueue {
    QUEUE.get_or_init(|| MessageQueue {
        inner: Mutex::new(QueueInner {
            messages: VecDeque::new(),
            max_len: 0,
        }),
    })
}

impl MessageQueue {
    fn push(&self, msg: Message) {
        let mut inner = self.inner.lock().expect("message queue poisoned");
        inner.messages.push_back(msg);
        inner.max_len = inner.max_len.max(inner.messages.len());
    }

    pub fn push_call(
        &self,
        target: EntityId,
        method: StringName,
        args: Vec<Variant>,
        show_error: bool,
    ) {
        self.push(Message::Call {
            target,
            method,
            args,
            show_error,
        });
    }

    pub fn push_callable(&self, callable: Callable, args: Vec<Variant>, show_error: bool) {
        self.push(Message::CallCallable {
            callable,
            args,
            show_error,
        });
    }

    pub fn push_set(&self, target: EntityId, property: StringName, value: Variant) {
        self.push(Message::Set {
            target,
            property,
            value,
        });
    }

    pub fn push_notification(&self, target: EntityId, what: i32) {
        self.push(Message::Notification { target, what });
    }

    /// Deliver every queued message in push order. Messages pushed by the
    /// handlers themselves are delivered in the same flush. Re-entrant
    /// flushing is a programming error and is refused.
    pub fn flush(&self) {
        if FLUSHING.with(|f| f.replace(true)) {
            error!("message queue flushed from within a flush");
            return;
        }
        loop {
            let msg = {
                let mut inner = self.inner.lock().expect("message queue poisoned");
                match inner.messages.pop_front() {
                    Some(m) => m,
                    None => break,
                }
            };
            self.deliver(msg);
        }
        FLUSHING.with(|f| f.set(false));
    }

    fn deliver(&self, msg: Message) {
        match msg {
            Message::Call {
                target,
                method,
                args,
                show_error,
            } => {
                let Some(obj) = entity_registry().resolve(target) else {
                    return; // target died after the push
                };
                if let Err(e) = obj.call(method, &args) {
                    if show_error {
                        error!(target = %target, method = %method, error = %e, "deferred call failed");
                    }
                }
            }
            Message::CallCallable {
                callable,
                args,
                show_error,
            } => match callable.call(&args) {
                Ok(_) | Err(CallError::InstanceNull) => {}
                Err(e) => {
                    if show_error {
                        error!(callable = %callable, error = %e, "queued callable failed");
                    }
                }
            },
            Message::Set {
                target,
                property,
                value,
            } => {
                let Some(obj) = entity_registry().resolve(target) else {
                    return;
                };
                if !obj.set(property, &value) {
                    warn!(target = %target, property = %property, "deferred set rejected by every chain step");
                }
            }
            Message::Notification { target, what } => {
                if let Some(obj) = entity_registry().resolve(target) {
                    obj.notification(what, false);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("message queue poisoned").messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the current thread is inside a flush.
    pub fn is_flushing(&self) -> bool {
        FLUSHING.with(|f| f.get())
    }

    /// Largest queue length observed since startup.
    pub fn max_len_seen(&self) -> usize {
        self.inner.lock().expect("message queue poisoned").max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::object::{register_core_classes, Object};

    // The queue is process-global; these tests each need it to themselves.
    static QUEUE_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn spawn_object() -> Arc<Object> {
        register_core_classes();
        Object::spawn_class("Object").expect("Object instantiable")
    }

    #[test]
    fn deferred_call_runs_at_flush_not_before() {
        let _guard = QUEUE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let obj = spawn_object();
        obj.call_deferred(StringName::new("queue_delete"), vec![]);
        assert!(!obj.is_queued_for_deletion());
        message_queue().flush();
        assert!(obj.is_queued_for_deletion());
        obj.free();
    }

    #[test]
    fn dead_target_message_is_dropped_silently() {
        let _guard = QUEUE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let obj = spawn_object();
        let id = obj.entity_id();
        message_queue().push_call(id, StringName::new("queue_delete"), vec![], true);
        obj.free();
        // Must not panic or resurrect the target.
        message_queue().flush();
        assert!(entity_registry().resolve(id).is_none());
    }

    #[test]
    fn messages_pushed_during_flush_run_in_same_flush() {
        let _guard = QUEUE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let hits = Arc::new(AtomicU32::new(0));
        let inner_hits = hits.clone();
        let second = Callable::from_fn("second", move |_| {
            inner_hits.fetch_add(10, Ordering::SeqCst);
            Ok(Variant::Nil)
        });
        let hits2 = hits.clone();
        let first = Callable::from_fn("first", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
            message_queue().push_callable(second.clone(), vec![], true);
            Ok(Variant::Nil)
        });
        message_queue().push_callable(first, vec![], true);
        message_queue().flush();
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn queued_connection_delivers_on_flush() {
        let _guard = QUEUE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let obj = spawn_object();
        let signal = StringName::new("script_changed");
        let hits = Arc::new(AtomicU32::new(0));
        let hits2 = hits.clone();
        let callable = Callable::from_fn("queued", move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::Nil)
        });
        obj.connect(signal, callable, nimbus_flags::CONNECT_QUEUED)
            .unwrap();
        obj.emit_signal(signal, &[]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        message_queue().flush();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        obj.free();
    }
}
