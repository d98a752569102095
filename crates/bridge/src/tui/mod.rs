//! Terminal User Interface
//!
//! Interactive front-end for the core: shows the token status and device
//! list, and issues bind / unbind / attach / detach commands.

pub mod app;
pub mod events;
pub mod ui;

pub use app::run;
