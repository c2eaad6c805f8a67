//! FIT encoding of an [`ActivityStream`](crate::conversion::ActivityStream).

pub mod csv;
pub mod encode;
pub mod profile;

pub use csv::to_csv;
pub use encode::{calculate_crc, encode_fit};
