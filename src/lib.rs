//! # Signal Survey Library
//!
//! Map cellular signal quality along a route.
//!
//! A GPS receiver and a cellular modem stream over serial; every time the
//! receiver has moved far enough, the current position and the modem's
//! signal quality become a durable local record. Records are later pushed to
//! a PostGIS table, where a separate process backfills historical weather.

pub mod backfill;
pub mod config;
pub mod error;
pub mod live;
pub mod logging;
pub mod model;
pub mod modem;
pub mod nmea;
pub mod remote;
pub mod sampler;
pub mod serial;
pub mod server;
pub mod store;
pub mod sync;
pub mod weather;
