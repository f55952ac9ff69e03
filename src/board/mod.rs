// Segmented kanban collection behind the lead pipeline board

pub mod error;
pub mod remote;
pub mod store;
pub mod pager;
pub mod anchor;
pub mod guard;
pub mod mutation;
pub mod debounce;
pub mod kanban;

pub use error::*;
pub use remote::*;
pub use store::*;
pub use pager::*;
pub use anchor::*;
pub use guard::*;
pub use mutation::{MoveReport, MoveState, MutationEngine, MutationStats, ReorderReport};
pub use debounce::*;
pub use kanban::*;
