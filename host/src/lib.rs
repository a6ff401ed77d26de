//! WebDesk host - backend for a browser desktop shell
//!
//! Serves the virtual filesystem, the external app registry and launcher,
//! per-desktop window state and WebSocket relays to remote SSH shells and
//! SFTP servers.

pub mod actors;
pub mod api;
pub mod app_state;
pub mod config;
pub mod launcher;
pub mod registry;
pub mod sessions;
pub mod ssh;
pub mod vfs;
