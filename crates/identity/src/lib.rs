//! # Identity
//!
//! Per-instance identity and property cache backed by a durable
//! string-keyed store.
//!
//! Responsibilities:
//! - Distinct ids, device id, user id (lazily loaded, write-through)
//! - Super-properties merged into every outgoing event
//! - Referrer-attribution snapshot cache with an invalidation hook
//! - Profile updates buffered while no people distinct id is known
//!
//! All entry points are callable from arbitrary caller threads; the store
//! state sits behind one mutex, the referrer cache behind its own.

mod referrer;
mod store;

pub use referrer::ReferrerCache;
pub use store::IdentityStore;
