#![doc = include_str!("../README.md")]

mod bytes;
mod error;

pub mod bits;
pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod helpers;
pub mod message;
pub mod msm;
pub mod reader;
pub mod schema;
pub mod synchronizer;

pub use decoder::{identity, parse, DecodeOptions, Decoder};
pub use error::{Error, Result};
pub use message::{Message, Value};
pub use msm::MsmLabel;
pub use reader::{ErrorPolicy, RtcmReader};
pub use schema::Registry;
pub use synchronizer::{read_frames, Frame, Synchronizer};
