//! Cross-thread event delivery.
//!
//! A single mutex-guarded FIFO plus a binary wake signal. Producers
//! (packet receivers, the link listener, timers) enqueue from any thread;
//! exactly one dispatcher thread drains. Ordering is strict FIFO with
//! at-most-once delivery.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use vswitch_types::{MacAddress, ObjectId};

use crate::notify::SwitchNotification;

/// A binary wake signal backed by a condition variable.
///
/// `notify` sets the flag and wakes all waiters; `wait` blocks until the
/// flag is set and consumes it. The flag makes a notify that races ahead
/// of the wait stick, so wakeups are never lost.
#[derive(Debug, Default)]
pub struct Signal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.condvar.notify_all();
    }

    pub fn wait(&self) {
        let mut flag = self.flag.lock();
        while !*flag {
            self.condvar.wait(&mut flag);
        }
        *flag = false;
    }

    /// Bounded wait used by the aging timer: returns `true` if notified,
    /// `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if !*flag {
            self.condvar.wait_for(&mut flag, timeout);
        }
        let notified = *flag;
        *flag = false;
        notified
    }
}

/// Events consumed by the dispatcher thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A raw frame received on a forwarding port.
    Packet {
        port_id: ObjectId,
        ifname: String,
        frame: Vec<u8>,
    },
    /// Kernel link operational-state change observed by the link listener.
    LinkChange { ifname: String, oper_up: bool },
    /// A notification ready for delivery to the registered callbacks.
    Notification(SwitchNotification),
    /// Cooperative shutdown sentinel; the dispatcher drains everything
    /// already queued and then exits its loop.
    Shutdown,
}

impl Event {
    pub fn packet(port_id: ObjectId, ifname: impl Into<String>, frame: Vec<u8>) -> Self {
        Event::Packet {
            port_id,
            ifname: ifname.into(),
            frame,
        }
    }

    /// Frame source MAC, for logging.
    pub fn source_mac(&self) -> Option<MacAddress> {
        match self {
            Event::Packet { frame, .. } => MacAddress::from_slice(frame.get(6..)?),
            _ => None,
        }
    }
}

/// Thread-safe FIFO of events with a wake signal.
#[derive(Debug, Default)]
pub struct EventQueue {
    queue: Mutex<VecDeque<Event>>,
    signal: Signal,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and raises the wake signal. Never blocks the
    /// producer.
    pub fn enqueue(&self, event: Event) {
        self.queue.lock().push_back(event);
        self.signal.notify();
    }

    /// Pops the oldest event, non-blocking.
    pub fn dequeue(&self) -> Option<Event> {
        self.queue.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Blocks until the wake signal is raised.
    pub fn wait(&self) {
        self.signal.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new();
        queue.enqueue(Event::LinkChange {
            ifname: "eth0".into(),
            oper_up: true,
        });
        queue.enqueue(Event::LinkChange {
            ifname: "eth1".into(),
            oper_up: false,
        });
        queue.enqueue(Event::Shutdown);

        assert_eq!(queue.len(), 3);
        assert!(matches!(queue.dequeue(), Some(Event::LinkChange { ifname, .. }) if ifname == "eth0"));
        assert!(matches!(queue.dequeue(), Some(Event::LinkChange { ifname, .. }) if ifname == "eth1"));
        assert_eq!(queue.dequeue(), Some(Event::Shutdown));
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_signal_is_not_lost_before_wait() {
        let signal = Signal::new();
        signal.notify();
        // notify happened before the wait; the flag must make it stick
        assert!(signal.wait_timeout(Duration::from_millis(1)));
        // flag was consumed
        assert!(!signal.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_blocks_until_notify() {
        let queue = Arc::new(EventQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(Event::Shutdown);
            })
        };
        queue.wait();
        assert_eq!(queue.dequeue(), Some(Event::Shutdown));
        producer.join().unwrap();
    }

    #[test]
    fn test_concurrent_producers_keep_events() {
        let queue = Arc::new(EventQueue::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    queue.enqueue(Event::LinkChange {
                        ifname: format!("eth{t}-{i}"),
                        oper_up: true,
                    });
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 400);
    }

    #[test]
    fn test_packet_source_mac() {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        frame.extend_from_slice(&[0x08, 0x00]);
        let event = Event::packet(ObjectId::NULL, "tap0", frame);
        assert_eq!(event.source_mac().unwrap().to_string(), "aa:bb:cc:dd:ee:01");
    }
}
