//! # Route Codec
//!
//! Pure conversions between a [`RouteSequence`](route_protocol::RouteSequence), its canonical
//! textual key (`Point-3 - Point-7 - Point-12`) and a short display string (`R>B>P40`).
//!
//! Decoding is deliberately forgiving: keys may come back from scraped UI text or old logs, so
//! [`decode_key`] keeps every embedded digit run that is a valid waypoint id.

mod alias;
mod display;
mod error;
mod key;

pub use alias::AliasTable;
pub use display::{
    build_display, display_or_key, DisplayMode, DisplayOptions, RouteDisplay, DISPLAY_SEPARATOR,
};
pub use error::{CodecError, Result};
pub use key::{decode_key, encode_key, KEY_PREFIX, KEY_SEPARATOR};
