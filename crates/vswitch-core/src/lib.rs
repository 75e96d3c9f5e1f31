//! Control-plane core of a software network switch.
//!
//! The crate is organized bottom-up:
//!
//! - [`oid`]: object-id allocation on top of the codec in `vswitch-types`
//! - [`store`]: the per-switch attribute store
//! - [`fdb`]: MAC learning, aging and flush
//! - [`api`]: the management facade ([`VirtualSwitch`])
//! - [`event`] / [`runtime`]: the event queue, the dispatcher and the
//!   background threads
//! - [`snapshot`]: warm-restart persistence
//!
//! The embedding daemon wires a [`VirtualSwitch`] (with a
//! [`ForwardingEngine`] implementation) into a [`runtime::SwitchRuntime`],
//! hands packet receivers the shared event queue, and serves its
//! management transport through [`mgmt::management_channel`].

pub mod api;
pub mod config;
pub mod engine;
pub mod event;
pub mod fdb;
pub mod flavor;
pub mod mgmt;
pub mod notify;
pub mod oid;
pub mod runtime;
pub mod snapshot;
pub mod store;

pub use api::{AttrCapability, VirtualSwitch};
pub use config::{LaneMap, ResourceLimiter, SwitchConfig, SwitchConfigContainer};
pub use engine::{ForwardingEngine, NullEngine};
pub use event::{Event, EventQueue, Signal};
pub use fdb::{FdbFlushFilter, FdbInfo, FlushScope};
pub use flavor::SwitchFlavor;
pub use mgmt::{management_channel, ManagementClient};
pub use notify::{FdbEventData, FdbEventKind, SwitchEventCallbacks, SwitchNotification};
pub use oid::ObjectIdManager;
pub use runtime::{LinkEvent, LinkEventSource, SwitchRuntime};
pub use store::{AttrMap, SwitchState};
