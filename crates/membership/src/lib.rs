//! Membership plumbing for live locators.
//!
//! An external watcher reports the full node list whenever it changes. This
//! crate turns those reports into incremental changes and feeds them, in
//! arrival order, to a locator through a bounded channel:
//!
//! ```text
//! MembershipSource --pump--> NodeListDiff --> MembershipHandle --mpsc--> apply loop --> locator
//! ```

pub mod applier;
pub mod diff;
pub mod error;
pub mod event;
pub mod source;

pub use applier::{ApplierStats, ApplyMembership, MembershipApplier, MembershipHandle};
pub use diff::NodeListDiff;
pub use error::{MembershipError, Result};
pub use event::MembershipChange;
pub use source::{pump, MembershipSource, NodeFactory};
