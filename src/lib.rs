//! Window lifecycle engine for a simulated desktop shell.
//!
//! The core is host-agnostic: an [`EventBus`](bus::EventBus), a
//! [`WindowStore`](window::WindowStore), one lifecycle FSM per window, and the
//! drag and resize controllers, all owned by a [`Desktop`]. Hosts plug in
//! through the three capability traits in [`host`]. The `drivers`,
//! `event_loop` and `ui` modules are the crossterm/ratatui host used by the
//! demo binary.

pub mod bus;
pub mod config;
pub mod constants;
mod context;
pub mod desktop;
pub mod drag;
pub mod drivers;
pub mod error;
pub mod event_loop;
pub mod fsm;
pub mod geometry;
pub mod host;
pub mod resize;
pub mod tracing_sub;
pub mod ui;
pub mod window;

pub use config::DesktopConfig;
pub use context::WindowContext;
pub use desktop::{Desktop, PointerTarget};
pub use error::DesktopError;
