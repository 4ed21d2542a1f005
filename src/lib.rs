//! Persistent log subsystem for a single Raft peer: a strictly-ordered,
//! append-only sequence of consensus entries, plus a small piece of
//! peer-local metadata (current term, vote).
//!
//! The public entry point is [`RaftLog`], opened with [`Options`] and a
//! [`PeerId`]. See the module docs on [`codec`], [`recovery`] and
//! [`reconcile`] for the on-disk format and the crash-recovery and
//! follower-reconciliation algorithms.

pub mod codec;
pub mod error;
pub mod file;
pub mod frame;
pub mod hints;
pub mod log;
pub mod metadata;
pub mod read;
pub mod reconcile;
pub mod recovery;
pub mod state;
pub mod write;

pub use codec::{Entry, EntryKind};
pub use error::{Error, Result};
pub use log::{Options, PeerId, RaftLog};
pub use metadata::Metadata;
pub use state::ConfigValue;
pub use write::NewEntry;
