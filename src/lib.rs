//! # pesgen
//!
//! PES packet generation for MPEG-2 Transport Stream muxing.
//!
//! Feed one elementary stream's timestamped samples in their codec-native
//! decoded form and drain PES-payload records ready for TS packetization:
//!
//! - H.264 access units (length-prefixed NAL units) are rewritten to
//!   Annex-B byte streams with emulation-prevention escaping, an access
//!   unit delimiter, and SPS/PPS replayed ahead of key frames.
//! - Raw AAC access units are wrapped in 7-byte ADTS frames.
//! - Timestamps are rescaled to the fixed 90 kHz TS timebase.
//! - Optional HLS-style sample encryption (AES-128-CBC) is applied between
//!   byte-stream conversion and escaping.
//!
//! TS-level packetization (PAT/PMT, adaptation fields, continuity
//! counters) is the consumer's job; each emitted [`PesPacket`] carries the
//! stream id, 90 kHz PTS/DTS, and payload that layer needs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pesgen::prelude::*;
//!
//! let mut generator = PesPacketGenerator::new();
//! generator.initialize(&stream_info)?;
//! generator.set_encryption_key(EncryptionKey::new(&key, &iv)?)?;
//!
//! for sample in samples {
//!     generator.push_sample(&sample)?;
//! }
//! generator.flush()?;
//!
//! while let Some(pes) = generator.next_pes_packet() {
//!     // Hand off to the TS packetizer.
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adts;
pub mod annexb;
pub mod crypt;
pub mod error;
pub mod generator;
pub mod stream;
pub mod timestamp;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crypt::EncryptionKey;
    pub use crate::error::{Error, Result};
    pub use crate::generator::{PesPacket, PesPacketGenerator};
    pub use crate::stream::{
        AudioCodec, AudioStreamInfo, MediaSample, StreamInfo, TextStreamInfo, VideoCodec,
        VideoStreamInfo,
    };
}

pub use crypt::EncryptionKey;
pub use error::{Error, Result};
pub use generator::{PesPacket, PesPacketGenerator};
pub use stream::{MediaSample, StreamInfo};
