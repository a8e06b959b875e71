//! signcast
//!
//! Streams live camera frames to a remote sign-recognition service over a
//! reconnecting WebSocket and renders the returned text into a result store.
//!
//! The pipeline is composed from four parts:
//! - `transport`: the reconnecting duplex Channel plus the fallback API client
//! - `media`: the camera source lifecycle under single-owner discipline
//! - `pipeline`: the throttled frame scheduler, sinks and the coordinator
//! - `recognition`: the last-known recognition texts read by the presentation
//!   layer

pub mod assets;
pub mod config;
pub mod media;
pub mod pipeline;
pub mod recognition;
pub mod transport;
pub mod utils;
