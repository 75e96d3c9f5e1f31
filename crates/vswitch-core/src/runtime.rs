//! Runtime context: threads, lock, lifecycle.
//!
//! [`SwitchRuntime`] owns the global lock around [`VirtualSwitch`], the
//! shared [`EventQueue`], and the background threads: the dispatcher (sole
//! event consumer), the FDB-aging timer, an optional link-state listener
//! and an optional management-channel server. Shutdown is cooperative:
//! every loop observes the run flag plus a wake signal, nothing is ever
//! force-killed, and threads join in a fixed order (management, link,
//! aging, dispatcher).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use vswitch_types::VswitchError;

use crate::api::VirtualSwitch;
use crate::event::{Event, EventQueue, Signal};
use crate::mgmt::{self, ManagementRequest};
use crate::notify::{SwitchEventCallbacks, SwitchNotification};

const AGING_TICK: Duration = Duration::from_secs(1);
const MGMT_POLL: Duration = Duration::from_millis(100);
const LINK_POLL: Duration = Duration::from_millis(200);

/// A kernel link operational-state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub ifname: String,
    pub oper_up: bool,
}

/// Source of link events, typically a netlink socket wrapper. `poll`
/// blocks at most `timeout` and returns `None` when nothing arrived, so
/// the listener loop can observe shutdown promptly.
pub trait LinkEventSource: Send {
    fn poll(&mut self, timeout: Duration) -> Option<LinkEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuntimeState {
    Stopped,
    Running,
}

/// Seconds since the epoch; the FDB timestamp clock.
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Owns the switch, its lock, and every background thread.
pub struct SwitchRuntime {
    switch: Arc<Mutex<VirtualSwitch>>,
    queue: Arc<EventQueue>,
    callbacks: Arc<dyn SwitchEventCallbacks>,
    running: Arc<AtomicBool>,
    aging_signal: Arc<Signal>,
    state: RuntimeState,
    dispatcher: Option<JoinHandle<()>>,
    aging: Option<JoinHandle<()>>,
    link: Option<JoinHandle<()>>,
    management: Option<JoinHandle<()>>,
}

impl SwitchRuntime {
    pub fn new(switch: VirtualSwitch, callbacks: Arc<dyn SwitchEventCallbacks>) -> Self {
        Self {
            switch: Arc::new(Mutex::new(switch)),
            queue: Arc::new(EventQueue::new()),
            callbacks,
            running: Arc::new(AtomicBool::new(false)),
            aging_signal: Arc::new(Signal::new()),
            state: RuntimeState::Stopped,
            dispatcher: None,
            aging: None,
            link: None,
            management: None,
        }
    }

    /// The shared event queue; packet receivers enqueue into it.
    pub fn queue(&self) -> Arc<EventQueue> {
        Arc::clone(&self.queue)
    }

    /// The switch behind the global lock, for synchronous management-API
    /// calls made outside the management channel.
    pub fn switch(&self) -> Arc<Mutex<VirtualSwitch>> {
        Arc::clone(&self.switch)
    }

    pub fn is_running(&self) -> bool {
        self.state == RuntimeState::Running
    }

    /// Spawns the background threads. The link source and the management
    /// receiver are optional; the dispatcher and the aging timer always
    /// run.
    pub fn start(
        &mut self,
        link_source: Option<Box<dyn LinkEventSource>>,
        management_rx: Option<Receiver<ManagementRequest>>,
    ) -> vswitch_types::Result<()> {
        if self.state == RuntimeState::Running {
            return Err(VswitchError::InvalidArgument("runtime already running".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        self.state = RuntimeState::Running;

        let spawned = self.spawn_threads(link_source, management_rx);
        if let Err(err) = spawned {
            // tear down whatever did start
            self.stop();
            return Err(VswitchError::ExternalFailure(format!("spawning runtime threads: {err}")));
        }
        info!("switch runtime started");
        Ok(())
    }

    fn spawn_threads(
        &mut self,
        link_source: Option<Box<dyn LinkEventSource>>,
        management_rx: Option<Receiver<ManagementRequest>>,
    ) -> std::io::Result<()> {
        self.dispatcher = Some(self.spawn_dispatcher()?);
        self.aging = Some(self.spawn_aging()?);
        if let Some(source) = link_source {
            self.link = Some(self.spawn_link(source)?);
        }
        if let Some(rx) = management_rx {
            self.management = Some(self.spawn_management(rx)?);
        }
        Ok(())
    }

    fn spawn_dispatcher(&self) -> std::io::Result<JoinHandle<()>> {
        let queue = Arc::clone(&self.queue);
        let switch = Arc::clone(&self.switch);
        let callbacks = Arc::clone(&self.callbacks);
        thread::Builder::new()
            .name("vswitch-dispatch".to_string())
            .spawn(move || dispatcher_loop(&queue, &switch, callbacks.as_ref()))
    }

    fn spawn_aging(&self) -> std::io::Result<JoinHandle<()>> {
        let queue = Arc::clone(&self.queue);
        let switch = Arc::clone(&self.switch);
        let running = Arc::clone(&self.running);
        let signal = Arc::clone(&self.aging_signal);
        thread::Builder::new()
            .name("vswitch-fdb-aging".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    // a notify during the tick wait means shutdown
                    if signal.wait_timeout(AGING_TICK) {
                        continue;
                    }
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let notes = switch.lock().age_fdb_entries(now_secs());
                    enqueue_notifications(&queue, notes);
                }
                debug!("fdb aging thread exiting");
            })
    }

    fn spawn_link(&self, mut source: Box<dyn LinkEventSource>) -> std::io::Result<JoinHandle<()>> {
        let queue = Arc::clone(&self.queue);
        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name("vswitch-link".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    if let Some(event) = source.poll(LINK_POLL) {
                        queue.enqueue(Event::LinkChange {
                            ifname: event.ifname,
                            oper_up: event.oper_up,
                        });
                    }
                }
                debug!("link listener thread exiting");
            })
    }

    fn spawn_management(
        &self,
        rx: Receiver<ManagementRequest>,
    ) -> std::io::Result<JoinHandle<()>> {
        let queue = Arc::clone(&self.queue);
        let switch = Arc::clone(&self.switch);
        let running = Arc::clone(&self.running);
        thread::Builder::new()
            .name("vswitch-mgmt".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    match rx.recv_timeout(MGMT_POLL) {
                        Ok(request) => {
                            let (reply, notes) = mgmt::apply(&mut switch.lock(), request.op);
                            enqueue_notifications(&queue, notes);
                            if request.reply.send(reply).is_err() {
                                warn!("management client dropped its reply channel");
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("management channel disconnected");
                            break;
                        }
                    }
                }
                debug!("management thread exiting");
            })
    }

    /// Requests shutdown and joins every thread, fixed order: management,
    /// link, aging, dispatcher. Idempotent.
    pub fn stop(&mut self) {
        if self.state == RuntimeState::Stopped {
            return;
        }
        info!("stopping switch runtime");
        self.running.store(false, Ordering::SeqCst);
        self.aging_signal.notify();
        self.queue.enqueue(Event::Shutdown);

        for handle in [
            self.management.take(),
            self.link.take(),
            self.aging.take(),
            self.dispatcher.take(),
        ]
        .into_iter()
        .flatten()
        {
            let name = handle.thread().name().unwrap_or("vswitch-thread").to_string();
            if handle.join().is_err() {
                error!(thread = %name, "thread panicked during shutdown");
            }
        }
        self.state = RuntimeState::Stopped;
        info!("switch runtime stopped");
    }
}

impl Drop for SwitchRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

fn enqueue_notifications(queue: &EventQueue, notes: Vec<SwitchNotification>) {
    for note in notes {
        queue.enqueue(Event::Notification(note));
    }
}

fn deliver(callbacks: &dyn SwitchEventCallbacks, note: SwitchNotification) {
    match note {
        SwitchNotification::FdbEvents(events) => callbacks.on_fdb_events(&events),
        SwitchNotification::PortStateChange { port_id, status } => {
            callbacks.on_port_state_change(port_id, status)
        }
        SwitchNotification::AttributeChange { object_id, attr_id, value } => {
            callbacks.on_attribute_change(object_id, attr_id, &value)
        }
    }
}

/// The single consumer: wait on the wake signal, drain the queue, process
/// each event synchronously. Packet and link events run under the global
/// lock; notifications are delivered outside it. A `Shutdown` event lets
/// the current drain finish, then exits the loop.
fn dispatcher_loop(
    queue: &EventQueue,
    switch: &Mutex<VirtualSwitch>,
    callbacks: &dyn SwitchEventCallbacks,
) {
    let mut shutting_down = false;
    loop {
        while let Some(event) = queue.dequeue() {
            match event {
                Event::Packet { port_id, ifname, frame } => {
                    let result = switch.lock().process_packet(port_id, &frame, now_secs());
                    match result {
                        Ok(notes) => enqueue_notifications(queue, notes),
                        Err(err) => warn!(%port_id, ifname, %err, "packet event failed"),
                    }
                }
                Event::LinkChange { ifname, oper_up } => {
                    let result = switch.lock().process_link_change(&ifname, oper_up);
                    match result {
                        Ok(notes) => enqueue_notifications(queue, notes),
                        Err(err) => warn!(ifname, %err, "link event failed"),
                    }
                }
                Event::Notification(note) => deliver(callbacks, note),
                Event::Shutdown => shutting_down = true,
            }
        }
        if shutting_down {
            break;
        }
        queue.wait();
    }
    debug!("dispatcher thread exiting");
}
