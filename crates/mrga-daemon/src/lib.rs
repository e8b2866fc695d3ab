//! Host pieces of the MRGA daemon: the mpv playback device and the local
//! control API.

pub mod http;
pub mod mpv;
