//! Coordinates media downloads through yt-dlp: fetch metadata, download,
//! walk playlists by index, and publish observable task state.

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod media;
pub mod utils;
