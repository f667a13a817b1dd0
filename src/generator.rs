//! PES packet generation.
//!
//! [`PesPacketGenerator`] is the top-level pipeline for one elementary
//! stream: it validates the stream description, converts each incoming
//! sample to its TS elementary-stream form (Annex-B for H.264, ADTS for
//! AAC), optionally applies sample encryption, rescales timestamps to the
//! 90 kHz TS timebase, and queues finished PES payloads for a downstream
//! TS packetizer to drain.
//!
//! # Example
//!
//! ```rust,ignore
//! use pesgen::{MediaSample, PesPacketGenerator, StreamInfo};
//!
//! let mut generator = PesPacketGenerator::new();
//! generator.initialize(&stream_info)?;
//!
//! for sample in samples {
//!     generator.push_sample(&sample)?;
//!     while let Some(pes) = generator.next_pes_packet() {
//!         ts_muxer.write_pes(pid, &pes.data, Some(pes.pts), Some(pes.dts))?;
//!     }
//! }
//! generator.flush()?;
//! ```

use std::collections::VecDeque;

use crate::adts::AdtsFramer;
use crate::annexb::NalUnitStreamConverter;
use crate::crypt::{EncryptionKey, SampleEncryptor};
use crate::error::{Error, Result};
use crate::stream::{
    AudioCodec, AudioStreamInfo, MediaSample, StreamInfo, VideoCodec, VideoStreamInfo,
};
use crate::timestamp::rescale_to_90khz;

// ============================================================================
// Constants
// ============================================================================

/// PES stream id for the video elementary stream (ISO/IEC 13818-1).
pub const VIDEO_STREAM_ID: u8 = 0xE0;

/// PES stream id for the audio elementary stream.
pub const AUDIO_STREAM_ID: u8 = 0xC0;

// ============================================================================
// PES Packet
// ============================================================================

/// One finished PES payload, ready for TS packetization.
///
/// The caller applies the PES header (start-code prefix, packet length,
/// flags, coded PTS/DTS) and splits into 188-byte TS packets; see the
/// [module docs](self) for the division of labor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesPacket {
    /// PES stream id: `0xE0` for video, `0xC0` for audio.
    pub stream_id: u8,
    /// Presentation timestamp in 90 kHz ticks.
    pub pts: i64,
    /// Decoding timestamp in 90 kHz ticks.
    pub dts: i64,
    /// Elementary-stream payload bytes.
    pub data: Vec<u8>,
}

// ============================================================================
// Converter seams
// ============================================================================

/// Converts one video access unit to its TS byte-stream form.
///
/// Production code uses [`NalUnitStreamConverter`]; tests install mocks
/// through a [`ConverterFactory`].
pub trait VideoByteStreamConverter {
    /// Convert a codec-native sample to an Annex-B byte stream.
    fn convert_to_byte_stream(&self, sample: &[u8], is_key_frame: bool) -> Result<Vec<u8>>;
}

/// Converts one audio access unit to its TS frame form.
pub trait AudioFrameConverter {
    /// Wrap a raw access unit in its transport framing.
    fn frame_access_unit(&self, access_unit: &[u8]) -> Result<Vec<u8>>;
}

impl VideoByteStreamConverter for NalUnitStreamConverter {
    fn convert_to_byte_stream(&self, sample: &[u8], is_key_frame: bool) -> Result<Vec<u8>> {
        self.convert(sample, is_key_frame)
    }
}

impl AudioFrameConverter for AdtsFramer {
    fn frame_access_unit(&self, access_unit: &[u8]) -> Result<Vec<u8>> {
        self.frame(access_unit)
    }
}

/// Builds codec converters for the generator.
///
/// The generator never names concrete codec modules; everything goes
/// through the factory so tests can substitute converter doubles.
pub trait ConverterFactory {
    /// Build a video converter from the stream's decoder configuration.
    ///
    /// `escape_data` selects whether conversion performs
    /// emulation-prevention escaping; the encryption path disables it and
    /// escapes after encrypting.
    fn video_converter(
        &self,
        info: &VideoStreamInfo,
        escape_data: bool,
    ) -> Result<Box<dyn VideoByteStreamConverter>>;

    /// Build an audio framer from the stream's AudioSpecificConfig.
    fn audio_converter(&self, info: &AudioStreamInfo) -> Result<Box<dyn AudioFrameConverter>>;
}

/// Factory producing the production converters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConverterFactory;

impl ConverterFactory for DefaultConverterFactory {
    fn video_converter(
        &self,
        info: &VideoStreamInfo,
        escape_data: bool,
    ) -> Result<Box<dyn VideoByteStreamConverter>> {
        Ok(Box::new(NalUnitStreamConverter::new(
            &info.extra_data,
            escape_data,
        )?))
    }

    fn audio_converter(&self, info: &AudioStreamInfo) -> Result<Box<dyn AudioFrameConverter>> {
        Ok(Box::new(AdtsFramer::new(&info.extra_data)?))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one generator's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct PesGeneratorStats {
    /// Samples successfully converted and queued.
    pub samples_pushed: u64,
    /// Samples dropped because conversion failed.
    pub samples_failed: u64,
    /// Total payload bytes across queued packets.
    pub payload_bytes: u64,
}

// ============================================================================
// Generator
// ============================================================================

/// Codec pipeline bound at initialization.
enum CodecPipeline {
    Video {
        /// Retained for rebuilding the converter when encryption is armed.
        info: VideoStreamInfo,
        converter: Box<dyn VideoByteStreamConverter>,
    },
    Audio {
        converter: Box<dyn AudioFrameConverter>,
    },
}

/// PES packet generator for a single elementary stream.
///
/// Synchronous and single-threaded: every operation runs to completion on
/// the caller's thread. One generator serves one elementary stream; use
/// one generator per stream for multi-stream muxing.
pub struct PesPacketGenerator {
    factory: Box<dyn ConverterFactory>,
    pipeline: Option<CodecPipeline>,
    timescale: u32,
    encryptor: Option<SampleEncryptor>,
    ready: VecDeque<PesPacket>,
    stats: PesGeneratorStats,
}

impl Default for PesPacketGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PesPacketGenerator {
    /// Create a generator using the production codec converters.
    pub fn new() -> Self {
        Self::with_factory(Box::new(DefaultConverterFactory))
    }

    /// Create a generator with a custom converter factory.
    pub fn with_factory(factory: Box<dyn ConverterFactory>) -> Self {
        Self {
            factory,
            pipeline: None,
            timescale: 0,
            encryptor: None,
            ready: VecDeque::new(),
            stats: PesGeneratorStats::default(),
        }
    }

    /// Bind the generator to one elementary stream.
    ///
    /// Builds the codec converter from the stream's `extra_data`. Must be
    /// called exactly once before any sample is pushed. Fails on non-H.264
    /// video, non-AAC audio, text streams, and malformed configuration.
    pub fn initialize(&mut self, stream_info: &StreamInfo) -> Result<()> {
        if self.pipeline.is_some() {
            return Err(Error::InvalidState("generator is already initialized"));
        }
        if stream_info.timescale() == 0 {
            return Err(Error::MalformedConfig("stream timescale must be non-zero"));
        }

        let pipeline = match stream_info {
            StreamInfo::Video(info) => {
                if info.codec != VideoCodec::H264 {
                    return Err(Error::UnsupportedCodec(
                        "only H.264 video can be packetized into TS",
                    ));
                }
                if !matches!(info.nalu_length_size, 1 | 2 | 4) {
                    return Err(Error::MalformedConfig("NAL length size must be 1, 2 or 4"));
                }
                let converter = self.factory.video_converter(info, true)?;
                tracing::info!(
                    "PES generator initialized: {} {}x{} @ {} ticks/s",
                    info.codec.name(),
                    info.width,
                    info.height,
                    info.timescale
                );
                CodecPipeline::Video {
                    info: info.clone(),
                    converter,
                }
            }
            StreamInfo::Audio(info) => {
                if info.codec != AudioCodec::Aac {
                    return Err(Error::UnsupportedCodec(
                        "only AAC audio can be packetized into TS",
                    ));
                }
                let converter = self.factory.audio_converter(info)?;
                tracing::info!(
                    "PES generator initialized: {} {} Hz, {} channels @ {} ticks/s",
                    info.codec.name(),
                    info.sample_rate,
                    info.channel_count,
                    info.timescale
                );
                CodecPipeline::Audio { converter }
            }
            StreamInfo::Text(_) => {
                return Err(Error::UnsupportedCodec(
                    "text streams cannot be packetized into TS",
                ));
            }
        };

        self.timescale = stream_info.timescale();
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Arm sample encryption for every subsequent sample.
    ///
    /// For video this rebuilds the converter with escaping disabled: the
    /// encryptor computes its block layout on unescaped bytes and applies
    /// the one escape pass itself. There is no way to disarm encryption.
    pub fn set_encryption_key(&mut self, key: EncryptionKey) -> Result<()> {
        match self.pipeline.as_mut() {
            None => Err(Error::InvalidState(
                "encryption key installed before initialization",
            )),
            Some(CodecPipeline::Video { info, converter }) => {
                *converter = self.factory.video_converter(info, false)?;
                self.encryptor = Some(SampleEncryptor::H264(key));
                tracing::info!("sample encryption enabled for the video stream");
                Ok(())
            }
            Some(CodecPipeline::Audio { .. }) => {
                self.encryptor = Some(SampleEncryptor::Aac(key));
                tracing::info!("sample encryption enabled for the audio stream");
                Ok(())
            }
        }
    }

    /// Convert one sample and queue its PES packet.
    ///
    /// On success exactly one packet is appended to the ready queue. On
    /// failure the sample is dropped and the queue is left untouched; the
    /// generator stays usable for subsequent samples.
    pub fn push_sample(&mut self, sample: &MediaSample) -> Result<()> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(Error::InvalidState("push_sample before initialization"))?;

        let (stream_id, converted) = match pipeline {
            CodecPipeline::Video { converter, .. } => (
                VIDEO_STREAM_ID,
                converter.convert_to_byte_stream(&sample.data, sample.is_key_frame),
            ),
            CodecPipeline::Audio { converter } => {
                (AUDIO_STREAM_ID, converter.frame_access_unit(&sample.data))
            }
        };

        let payload = match converted {
            Ok(payload) => payload,
            Err(error) => {
                self.stats.samples_failed += 1;
                tracing::warn!("dropping sample: {}", error);
                return Err(error);
            }
        };

        let payload = match &self.encryptor {
            Some(encryptor) => encryptor.encrypt(payload),
            None => payload,
        };

        let packet = PesPacket {
            stream_id,
            pts: rescale_to_90khz(sample.pts, self.timescale),
            dts: rescale_to_90khz(sample.dts, self.timescale),
            data: payload,
        };

        self.stats.samples_pushed += 1;
        self.stats.payload_bytes += packet.data.len() as u64;
        tracing::trace!(
            "queued PES packet: stream id {:#04X}, pts {}, dts {}, {} bytes",
            packet.stream_id,
            packet.pts,
            packet.dts,
            packet.data.len()
        );
        self.ready.push_back(packet);
        Ok(())
    }

    /// Number of finished PES packets waiting to be drained.
    pub fn num_ready_pes_packets(&self) -> usize {
        self.ready.len()
    }

    /// Remove and return the oldest ready packet.
    pub fn next_pes_packet(&mut self) -> Option<PesPacket> {
        self.ready.pop_front()
    }

    /// Mark end of stream.
    ///
    /// The generator holds no partial state across samples, so this only
    /// finishes the stream; packets already in the ready queue remain
    /// available.
    pub fn flush(&mut self) -> Result<()> {
        tracing::debug!(
            "PES generator flushed: {} packets still queued",
            self.ready.len()
        );
        Ok(())
    }

    /// Get current statistics.
    pub fn stats(&self) -> &PesGeneratorStats {
        &self.stats
    }
}

// ============================================================================
// Tests
// ============================================================================
