//! # labshare-store
//!
//! The persistent data layer: one JSON document per named collection,
//! replaced wholesale on every write (collection snapshot replace). Each
//! write goes to a temp file in the target's directory followed by an
//! atomic rename, so a reader or a crash never observes a partially
//! written document.
//!
//! Collections are independently atomic — there are no cross-collection
//! transactions. Every logical mutation must go through
//! [`DocumentStore::update`], which holds that collection's lock for the
//! whole read-modify-write span.

pub mod collections;
pub mod store;

pub use collections::Collection;
pub use store::DocumentStore;
