//! Telegram Saved Messages downloader
//!
//! A small web UI that logs into a Telegram account and lets the user
//! download the media kept in "Saved Messages", one item at a time or as a
//! zip archive.

pub mod config;
pub mod favorites;
pub mod logging;
pub mod media;
pub mod session;
pub mod telegram;
pub mod web;
pub mod workflow;
