//! Type definitions for treevite storage.

mod credentials;
mod ids;
mod invites;
mod page;
mod participants;
mod waves;

// Re-export all types from submodules
pub use credentials::*;
pub use ids::*;
pub use invites::*;
pub use page::*;
pub use participants::*;
pub use waves::*;
