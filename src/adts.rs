//! ADTS framing for AAC access units.
//!
//! MPEG-2 TS carries AAC as ADTS: every access unit is prefixed with a
//! 7-byte header repeating the decoder configuration. The header fields
//! come from the stream's AudioSpecificConfig, parsed once at
//! initialization.
//!
//! # Example
//!
//! ```rust,ignore
//! use pesgen::adts::AdtsFramer;
//!
//! let framer = AdtsFramer::new(&[0x12, 0x10])?; // AAC-LC, 44.1 kHz stereo
//! let frame = framer.frame(&access_unit)?;      // 7-byte header + payload
//! ```

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Size of the ADTS header (no CRC).
pub const ADTS_HEADER_SIZE: usize = 7;

/// Largest access unit that fits the 13-bit ADTS frame-length field.
const MAX_ACCESS_UNIT_SIZE: usize = 0x1FFF - ADTS_HEADER_SIZE;

/// Sampling frequencies by AudioSpecificConfig frequency index
/// (ISO/IEC 14496-3 table 1.18).
const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

// ============================================================================
// Framer
// ============================================================================

/// Wraps raw AAC access units in ADTS frames.
///
/// Built from the 2-byte AudioSpecificConfig; rejects configurations ADTS
/// cannot express (escape-coded object types, explicit frequencies,
/// program-config-element channel layouts).
#[derive(Debug, Clone)]
pub struct AdtsFramer {
    /// Audio object type (1..=4; ADTS profile is this minus one).
    audio_object_type: u8,
    /// Sampling frequency index (0..=12).
    frequency_index: u8,
    /// Channel configuration (1..=7).
    channel_config: u8,
}

impl AdtsFramer {
    /// Parse an AudioSpecificConfig and build a framer.
    pub fn new(audio_specific_config: &[u8]) -> Result<Self> {
        if audio_specific_config.len() < 2 {
            return Err(Error::MalformedConfig("AudioSpecificConfig too short"));
        }

        let audio_object_type = audio_specific_config[0] >> 3;
        let frequency_index =
            ((audio_specific_config[0] & 0x07) << 1) | (audio_specific_config[1] >> 7);
        let channel_config = (audio_specific_config[1] >> 3) & 0x0F;

        if !(1..=4).contains(&audio_object_type) {
            return Err(Error::MalformedConfig(
                "audio object type not representable in ADTS",
            ));
        }
        if usize::from(frequency_index) >= SAMPLING_FREQUENCIES.len() {
            return Err(Error::MalformedConfig("unsupported sampling frequency index"));
        }
        if channel_config == 0 || channel_config > 7 {
            return Err(Error::MalformedConfig("unsupported channel configuration"));
        }

        tracing::debug!(
            "AAC configuration parsed: object type {}, {} Hz, {} channel config",
            audio_object_type,
            SAMPLING_FREQUENCIES[usize::from(frequency_index)],
            channel_config
        );

        Ok(Self {
            audio_object_type,
            frequency_index,
            channel_config,
        })
    }

    /// Sampling rate declared by the configuration, in Hz.
    pub fn sample_rate(&self) -> u32 {
        SAMPLING_FREQUENCIES[usize::from(self.frequency_index)]
    }

    /// Wrap one access unit in an ADTS frame.
    pub fn frame(&self, access_unit: &[u8]) -> Result<Vec<u8>> {
        if access_unit.len() > MAX_ACCESS_UNIT_SIZE {
            return Err(Error::Conversion(
                "access unit too large for the ADTS frame-length field",
            ));
        }
        let frame_length = ADTS_HEADER_SIZE + access_unit.len();

        let mut frame = Vec::with_capacity(frame_length);
        // Sync word, MPEG-4, layer 0, protection absent.
        frame.push(0xFF);
        frame.push(0xF1);
        // Profile (2 bits), frequency index (4 bits), private bit,
        // channel config high bit.
        frame.push(
            ((self.audio_object_type - 1) & 0x03) << 6
                | (self.frequency_index & 0x0F) << 2
                | (self.channel_config >> 2) & 0x01,
        );
        // Channel config low bits, originality/home/copyright bits,
        // frame length bits 12..11.
        frame.push((self.channel_config & 0x03) << 6 | ((frame_length >> 11) & 0x03) as u8);
        // Frame length bits 10..3.
        frame.push(((frame_length >> 3) & 0xFF) as u8);
        // Frame length bits 2..0, buffer fullness bits 10..6.
        frame.push(((frame_length & 0x07) << 5) as u8 | 0x1F);
        // Buffer fullness bits 5..0, one raw data block.
        frame.push(0xFC);

        frame.extend_from_slice(access_unit);
        Ok(frame)
    }
}

// ============================================================================
// Tests
// ============================================================================
