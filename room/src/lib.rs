//! Room client for a shared pool of logical facts.
//!
//! Multiple surfaces observe and mutate one pool of tuple-style fact
//! statements and receive continuously updated query results as the pool
//! changes, without knowing whether it lives in-process or behind a server.
//! A [`Room`] issues `assert` / `retract` / `select` operations and owns
//! live subscriptions that redeliver the full, current solution set to
//! their listeners on every relevant change.
//!
//! Three transports sit behind one contract: [`Room::local`] (synchronous
//! in-process store), [`Room::polling`] (one HTTP exchange per operation,
//! subscriptions refreshed on a backoff schedule), and [`Room::pushed`]
//! (HTTP for one-shot calls plus a duplex channel the server pushes
//! solution sets over). Network failures on background paths never reach
//! listeners; they surface only as the [`Room::connected`] flag and a
//! growing retry interval.

pub mod debounce;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod registry;
pub mod selection;
pub mod store;
pub mod term;
pub mod transport;

mod room;

pub use debounce::{DebounceAction, Debouncer};
pub use error::{RoomError, RoomResult};
pub use monitor::ConnectionMonitor;
pub use room::{Room, RoomConfig};
pub use selection::Selection;
pub use store::FactStore;
pub use term::{Solution, StrTerm, Term};
pub use transport::{Subscription, Transport};
