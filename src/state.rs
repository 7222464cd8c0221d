//! Representations of IRC network and connection state, including users and channels.

mod mode;
pub mod serverinfo;
mod store;

pub use self::{
    mode::*,
    serverinfo::{ModeKind, ServerInfo},
    store::*,
};
