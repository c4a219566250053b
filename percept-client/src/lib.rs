//! percept-client: client-side coordination layer for profession
//! perception ratings
//!
//! Components share one [`EntityCache`](cache::EntityCache), one
//! [`SessionContext`](session::SessionContext) and one
//! [`RefreshBus`](view::RefreshBus) per session; [`app::PerceptionApp`]
//! wires them together over a [`percept_common::Backend`].

pub mod activity;
pub mod app;
pub mod cache;
pub mod comment;
pub mod device;
pub mod directory;
pub mod error;
pub mod in_flight;
pub mod prefs;
pub mod rating;
pub mod realtime;
pub mod search;
pub mod session;
pub mod stats;
pub mod view;

pub use app::PerceptionApp;
pub use error::{ClientError, ClientResult};
