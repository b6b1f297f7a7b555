//! Entry point for the external workflow engine.
//!
//! The engine invokes named actions with a variable map and expects output
//! variables back, or a named business fault it can route on.

pub mod action;
pub mod delegate;
pub mod events;
pub mod fault;
pub mod notification;
pub mod variables;

pub use action::{AccountRole, DelegateAction, DelegateRequest};
pub use delegate::TransferDelegate;
pub use events::{ActivityContext, ActivityEvent, ActivityStatus, EventPublisher};
pub use fault::{BusinessFault, DelegateError, FaultCode};
pub use variables::Variables;
