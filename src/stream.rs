//! Stream descriptions and media samples.
//!
//! These are the inputs to the PES packet generator: a [`StreamInfo`]
//! describing one elementary stream (bound once at initialization) and a
//! sequence of [`MediaSample`]s carrying codec-native payloads.

// ============================================================================
// Codecs
// ============================================================================

/// Video codec carried by a [`VideoStreamInfo`].
///
/// Only H.264 can be converted to a TS elementary stream; the other
/// variants exist so that callers handing over demuxer output get a clean
/// rejection instead of garbage TS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// H.264/AVC.
    H264,
    /// H.265/HEVC.
    H265,
    /// VP9.
    Vp9,
    /// AV1.
    Av1,
}

impl VideoCodec {
    /// Get the human-readable name of the codec.
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H.264/AVC",
            VideoCodec::H265 => "H.265/HEVC",
            VideoCodec::Vp9 => "VP9",
            VideoCodec::Av1 => "AV1",
        }
    }
}

/// Audio codec carried by an [`AudioStreamInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    /// AAC (MPEG-4 Advanced Audio Coding).
    Aac,
    /// Opus.
    Opus,
    /// AC-3.
    Ac3,
}

impl AudioCodec {
    /// Get the human-readable name of the codec.
    pub fn name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "AAC",
            AudioCodec::Opus => "Opus",
            AudioCodec::Ac3 => "AC-3",
        }
    }
}

// ============================================================================
// Stream Info
// ============================================================================

/// Description of one video elementary stream.
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    /// Video codec.
    pub codec: VideoCodec,
    /// Timescale of the sample timestamps, in ticks per second.
    pub timescale: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Size in bytes of the NAL-unit length prefix (1, 2 or 4).
    pub nalu_length_size: u8,
    /// Codec configuration record (AVCDecoderConfigurationRecord for H.264).
    pub extra_data: Vec<u8>,
}

/// Description of one audio elementary stream.
#[derive(Debug, Clone)]
pub struct AudioStreamInfo {
    /// Audio codec.
    pub codec: AudioCodec,
    /// Timescale of the sample timestamps, in ticks per second.
    pub timescale: u32,
    /// Sampling rate in Hz.
    pub sample_rate: u32,
    /// Number of audio channels.
    pub channel_count: u8,
    /// Codec configuration record (AudioSpecificConfig for AAC).
    pub extra_data: Vec<u8>,
}

/// Description of a text/subtitle stream.
///
/// Text streams cannot be packetized by this crate; initialization with one
/// always fails. The type exists so callers can pass through demuxer track
/// tables unmodified.
#[derive(Debug, Clone)]
pub struct TextStreamInfo {
    /// Timescale of the sample timestamps, in ticks per second.
    pub timescale: u32,
}

/// Description of the single elementary stream a generator is bound to.
#[derive(Debug, Clone)]
pub enum StreamInfo {
    /// A video elementary stream.
    Video(VideoStreamInfo),
    /// An audio elementary stream.
    Audio(AudioStreamInfo),
    /// A text/subtitle stream (rejected at initialization).
    Text(TextStreamInfo),
}

impl StreamInfo {
    /// Timescale of the stream's sample timestamps, in ticks per second.
    pub fn timescale(&self) -> u32 {
        match self {
            StreamInfo::Video(info) => info.timescale,
            StreamInfo::Audio(info) => info.timescale,
            StreamInfo::Text(info) => info.timescale,
        }
    }

    /// Returns true if this describes a video stream.
    pub fn is_video(&self) -> bool {
        matches!(self, StreamInfo::Video(_))
    }

    /// Returns true if this describes an audio stream.
    pub fn is_audio(&self) -> bool {
        matches!(self, StreamInfo::Audio(_))
    }
}

// ============================================================================
// Media Sample
// ============================================================================

/// One timestamped media sample in codec-native decoded form.
///
/// For H.264 this is an access unit of length-prefixed NAL units (AVCC
/// layout); for AAC it is one raw access unit without ADTS framing.
#[derive(Debug, Clone)]
pub struct MediaSample {
    /// Sample payload in codec-native form.
    pub data: Vec<u8>,
    /// Presentation timestamp in the stream's native timescale.
    pub pts: i64,
    /// Decoding timestamp in the stream's native timescale.
    pub dts: i64,
    /// Whether this sample is a key frame / random access point.
    pub is_key_frame: bool,
}

impl MediaSample {
    /// Create a new sample.
    pub fn new(data: Vec<u8>, pts: i64, dts: i64, is_key_frame: bool) -> Self {
        Self {
            data,
            pts,
            dts,
            is_key_frame,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
