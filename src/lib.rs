//! Tagplay library - RFID-driven asset orchestration.
//!
//! Cards placed on a reader select an ordered list of media assets. This
//! library holds the playback state machine, the card history, the live
//! event broadcaster and range-aware media delivery, plus the HTTP/SSE
//! binding used by the `tagplay` binary.
//!
//! # Modules
//!
//! - `orchestrator`: single owner of playback state, history and subscribers
//! - `playback`: per-card positions and navigation
//! - `history`: scan records, partitioned into mapped and unknown cards
//! - `broadcast`: fan-out of events to subscribers
//! - `media`: byte-range planning and chunked file streaming
//! - `mapping`: card to asset resolution
//! - `server`: axum routes
#![forbid(unsafe_code)]

pub mod assets;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod logging;
pub mod mapping;
pub mod media;
pub mod orchestrator;
pub mod playback;
pub mod server;
pub mod storage;
