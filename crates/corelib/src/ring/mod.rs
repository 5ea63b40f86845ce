//! Consistent hash ring implementation.
//!
//! The ring maps 32-bit Ketama positions (held as `u64`) to the members that
//! own them and answers "successor on the circle" lookups. It is a plain data
//! structure: locators wrap it in a lock, snapshots clone it.

pub mod entry;
pub mod migration;
pub mod ring;

pub use entry::RingEntry;
pub use migration::{MigrationOverlay, MigrationType};
pub use ring::KetamaRing;
