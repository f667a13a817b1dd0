//! SAMPLE-AES encryption for TS elementary streams.
//!
//! Implements the "MPEG-2 Stream Encryption Format for HTTP Live Streaming"
//! sample-encryption layout: AES-128-CBC without padding, applied in
//! codec-specific stripes that leave frame headers and the NAL structure
//! in the clear.
//!
//! For H.264 the pattern runs over the Annex-B byte stream *before*
//! emulation-prevention escaping: ciphertext can introduce forbidden
//! `00 00 0x` sequences, so each NAL unit that had a block encrypted is
//! escaped exactly once afterwards. Encrypting an already-escaped stream
//! would encrypt the escape bytes themselves and break standards-compliant
//! decryption.
//!
//! The CBC chain is reset to the configured IV at the start of every NAL
//! unit (video) or ADTS frame (audio) and carries across that unit's
//! encrypted blocks; clear bytes between them do not advance the chain.

use std::fmt;

use aes::cipher::{BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Block};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::annexb::{escape_nal_unit, NALU_TYPE_IDR_SLICE, NALU_TYPE_NON_IDR_SLICE};
use crate::error::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;

// ============================================================================
// Constants
// ============================================================================

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// H.264: NAL header plus 31 RBSP bytes stay clear at the front of every
/// encrypted NAL unit.
const H264_LEADING_CLEAR_BYTES: usize = 32;

/// H.264: nine clear blocks follow every encrypted block (the 1-of-10
/// pattern).
const H264_CLEAR_SKIP_BYTES: usize = 9 * AES_BLOCK_SIZE;

/// AAC: bytes left clear at the front of every frame (covers the ADTS
/// header).
const AAC_LEADING_CLEAR_BYTES: usize = 16;

/// AAC: frames shorter than this carry no full block and stay clear.
const AAC_MINIMUM_FRAME_SIZE: usize = AAC_LEADING_CLEAR_BYTES + AES_BLOCK_SIZE;

// ============================================================================
// Key material
// ============================================================================

/// An AES-128-CBC content key with its initialization vector.
///
/// Key material is zeroed when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 16],
    iv: [u8; 16],
}

impl EncryptionKey {
    /// Build a key from raw key and IV bytes.
    ///
    /// Both must be exactly 16 bytes; AES-128-CBC is the only modeled
    /// scheme.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; 16] = key.try_into().map_err(|_| Error::InvalidKeyMaterial {
            expected: 16,
            actual: key.len(),
        })?;
        let iv: [u8; 16] = iv.try_into().map_err(|_| Error::InvalidKeyMaterial {
            expected: 16,
            actual: iv.len(),
        })?;
        Ok(Self { key, iv })
    }

    fn cipher(&self) -> Aes128CbcEnc {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log key material.
        f.write_str("EncryptionKey(..)")
    }
}

// ============================================================================
// Sample encryptor
// ============================================================================

/// Codec-aware sample encryptor, selected once when a key is installed.
#[derive(Debug, Clone)]
pub enum SampleEncryptor {
    /// H.264 pattern over an unescaped Annex-B byte stream.
    H264(EncryptionKey),
    /// AAC pattern over ADTS frames.
    Aac(EncryptionKey),
}

impl SampleEncryptor {
    /// Encrypt one converted sample payload.
    ///
    /// Pure byte-in/byte-out; cannot fail. Inputs too small to carry a
    /// full encrypted block come back unchanged.
    pub fn encrypt(&self, payload: Vec<u8>) -> Vec<u8> {
        match self {
            SampleEncryptor::H264(key) => encrypt_h264_stream(key, &payload),
            SampleEncryptor::Aac(key) => {
                let mut frame = payload;
                encrypt_aac_frame(key, &mut frame);
                frame
            }
        }
    }
}

// ============================================================================
// H.264 pattern
// ============================================================================

/// Walk an unescaped Annex-B stream NAL unit by NAL unit, encrypting VCL
/// slices and re-escaping each NAL unit that was touched.
fn encrypt_h264_stream(key: &EncryptionKey, stream: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(stream.len() + stream.len() / 32 + 1);
    let mut pos = 0;

    while pos < stream.len() {
        let Some((prefix_start, payload_start)) = find_start_code(stream, pos) else {
            out.extend_from_slice(&stream[pos..]);
            break;
        };
        // Bytes before the first start code pass through untouched.
        out.extend_from_slice(&stream[pos..prefix_start]);
        out.extend_from_slice(&stream[prefix_start..payload_start]);

        let nalu_end = find_start_code(stream, payload_start)
            .map(|(next_prefix, _)| next_prefix)
            .unwrap_or(stream.len());
        let nalu = &stream[payload_start..nalu_end];

        match encrypt_h264_nal_unit(key, nalu) {
            Some(encrypted) => out.extend_from_slice(&encrypted),
            None => out.extend_from_slice(nalu),
        }
        pos = nalu_end;
    }

    out
}

/// Apply the 1-of-10 block pattern to one NAL unit (header byte included).
///
/// Returns `None` when the unit is left untouched: a non-VCL type, or a
/// VCL slice too small to hold one encrypted block after the clear lead
/// and the 16-byte tail rule.
fn encrypt_h264_nal_unit(key: &EncryptionKey, nalu: &[u8]) -> Option<Vec<u8>> {
    let nal_type = nalu.first()? & 0x1F;
    if nal_type != NALU_TYPE_NON_IDR_SLICE && nal_type != NALU_TYPE_IDR_SLICE {
        return None;
    }
    if nalu.len() <= H264_LEADING_CLEAR_BYTES + AES_BLOCK_SIZE {
        return None;
    }

    let mut data = nalu.to_vec();
    let mut cipher = key.cipher();
    let mut offset = H264_LEADING_CLEAR_BYTES;
    // A candidate block is only encrypted while more than one block's worth
    // of data remains, leaving the final 16 bytes clear.
    while data.len() > offset + AES_BLOCK_SIZE {
        let block = Block::from_mut_slice(&mut data[offset..offset + AES_BLOCK_SIZE]);
        cipher.encrypt_block_mut(block);
        offset += AES_BLOCK_SIZE + H264_CLEAR_SKIP_BYTES;
    }

    // Ciphertext may have formed start-code-like runs, and clear spans must
    // not carry unescaped `00 00 0x` either once the unit is rewritten.
    Some(escape_nal_unit(&data))
}

/// Find the next Annex-B start code at or after `from`.
///
/// Returns `(prefix_start, payload_start)` covering both the four-byte and
/// the three-byte form.
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 3 <= data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if i + 4 <= data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                return Some((i, i + 4));
            }
            if data[i + 2] == 0x01 {
                return Some((i, i + 3));
            }
        }
        i += 1;
    }
    None
}

// ============================================================================
// AAC pattern
// ============================================================================

/// Encrypt every full block after the 16-byte clear lead of an ADTS frame.
///
/// Unlike the H.264 pattern there is no clear tail: the last full block is
/// encrypted even when it ends the frame, and only the `len % 16` trailing
/// remainder stays clear.
fn encrypt_aac_frame(key: &EncryptionKey, frame: &mut [u8]) {
    if frame.len() < AAC_MINIMUM_FRAME_SIZE {
        return;
    }

    let mut cipher = key.cipher();
    let mut offset = AAC_LEADING_CLEAR_BYTES;
    while offset + AES_BLOCK_SIZE <= frame.len() {
        let block = Block::from_mut_slice(&mut frame[offset..offset + AES_BLOCK_SIZE]);
        cipher.encrypt_block_mut(block);
        offset += AES_BLOCK_SIZE;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockDecryptMut;

    type Aes128CbcDec = cbc::Decryptor<Aes128>;

    // Ciphertext of the all-zero-key/IV pattern blocks used across the
    // H.264 fixtures (generated with
    // `openssl aes-128-cbc -nopad -e -K 00..00 -iv 00..00`).
    const ENCRYPTED_BLOCK_1: [u8; 16] = [
        0x93, 0x3A, 0x2C, 0x38, 0x86, 0x4B, 0x64, 0xE2, 0x62, 0x7E, 0xCC, 0x75, 0x71, 0xFB, 0x60,
        0x7C,
    ];
    const ENCRYPTED_BLOCK_2: [u8; 16] = [
        0xB7, 0x1C, 0x64, 0xAE, 0x90, 0xA4, 0x35, 0x88, 0x4F, 0xD1, 0x30, 0xC2, 0x06, 0x2E, 0xF8,
        0xA5,
    ];

    fn zero_key() -> EncryptionKey {
        EncryptionKey::new(&[0u8; 16], &[0u8; 16]).unwrap()
    }

    // Start code + type-1 NAL header + `rbsp_len` sequential RBSP bytes.
    fn slice_nalu_stream(rbsp_len: usize) -> Vec<u8> {
        let mut stream = vec![0x00, 0x00, 0x00, 0x01, 0x61];
        stream.extend((0..rbsp_len).map(|i| i as u8));
        stream
    }

    #[test]
    fn test_key_rejects_bad_lengths() {
        assert!(EncryptionKey::new(&[0u8; 15], &[0u8; 16]).is_err());
        assert!(EncryptionKey::new(&[0u8; 16], &[0u8; 17]).is_err());
        assert!(EncryptionKey::new(&[0u8; 32], &[0u8; 16]).is_err());
        assert!(EncryptionKey::new(&[0u8; 16], &[0u8; 16]).is_ok());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = EncryptionKey::new(&[0xAA; 16], &[0xBB; 16]).unwrap();
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }

    #[test]
    fn test_h264_small_nalu_unchanged() {
        let stream = vec![0x00, 0x00, 0x00, 0x01, 0x61, 0xBB, 0xCC, 0xDD];
        let encryptor = SampleEncryptor::H264(zero_key());
        assert_eq!(encryptor.encrypt(stream.clone()), stream);
    }

    #[test]
    fn test_h264_pattern_blocks() {
        // 209-byte NAL unit: 32 clear, one encrypted block, nine clear
        // blocks, one more encrypted block, one trailing clear byte.
        let stream = slice_nalu_stream(208);
        let mut expected = stream.clone();
        expected[36..52].copy_from_slice(&ENCRYPTED_BLOCK_1);
        expected[196..212].copy_from_slice(&ENCRYPTED_BLOCK_2);

        let encryptor = SampleEncryptor::H264(zero_key());
        assert_eq!(encryptor.encrypt(stream), expected);
    }

    #[test]
    fn test_h264_final_16_bytes_stay_clear() {
        // 208-byte NAL unit: the second candidate block is the last 16
        // bytes of the unit and must stay clear.
        let stream = slice_nalu_stream(207);
        let mut expected = stream.clone();
        expected[36..52].copy_from_slice(&ENCRYPTED_BLOCK_1);

        let encryptor = SampleEncryptor::H264(zero_key());
        assert_eq!(encryptor.encrypt(stream), expected);
    }

    #[test]
    fn test_h264_reescapes_touched_nal_unit() {
        // Same 209-byte layout, but the clear spans carry `00 00 03`
        // sequences that must be escaped again after encryption.
        let mut stream = vec![0x00, 0x00, 0x00, 0x01, 0x61];
        stream.extend([0x00, 0x00, 0x03, 0x02]);
        stream.extend(0x04..=0x1E); // rest of the 31-byte clear lead
        stream.extend(0x1F..=0x2E); // encrypted block
        stream.extend(0x2F..=0x9A);
        stream.extend([0x9B, 0x9C, 0x9D, 0x00, 0x00, 0x03, 0x01]);
        stream.extend(0xA2..=0xBE); // 144 clear bytes in total
        stream.extend(0xBF..=0xCE); // encrypted block
        stream.push(0xCF);

        let mut expected = vec![0x00, 0x00, 0x00, 0x01, 0x61];
        expected.extend([0x00, 0x00, 0x03, 0x03, 0x02]);
        expected.extend(0x04..=0x1E);
        expected.extend(ENCRYPTED_BLOCK_1);
        expected.extend(0x2F..=0x9A);
        expected.extend([0x9B, 0x9C, 0x9D, 0x00, 0x00, 0x03, 0x03, 0x01]);
        expected.extend(0xA2..=0xBE);
        expected.extend(ENCRYPTED_BLOCK_2);
        expected.push(0xCF);

        let encryptor = SampleEncryptor::H264(zero_key());
        assert_eq!(encryptor.encrypt(stream), expected);
    }

    #[test]
    fn test_h264_non_vcl_nal_units_untouched() {
        // SEI (type 6) followed by SPS (type 7), both large enough to
        // encrypt if they were slices.
        let mut stream = vec![0x00, 0x00, 0x00, 0x01, 0x06];
        stream.extend(std::iter::repeat(0x42).take(100));
        stream.extend([0x00, 0x00, 0x00, 0x01, 0x67]);
        stream.extend(std::iter::repeat(0x24).take(100));

        let encryptor = SampleEncryptor::H264(zero_key());
        assert_eq!(encryptor.encrypt(stream.clone()), stream);
    }

    #[test]
    fn test_h264_iv_resets_per_nal_unit() {
        // Two identical slices in one access unit encrypt identically.
        let one = slice_nalu_stream(208);
        let mut two = one.clone();
        two.extend_from_slice(&one);

        let encryptor = SampleEncryptor::H264(zero_key());
        let out = encryptor.encrypt(two);
        let half = out.len() / 2;
        assert_eq!(out[..half], out[half..]);
    }

    // Inverse of `escape_nal_unit`, for inspecting encrypted output whose
    // ciphertext may have picked up escape bytes.
    fn unescape_nal_unit(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut zero_run = 0usize;
        let mut i = 0;
        while i < data.len() {
            let byte = data[i];
            if zero_run >= 2 && byte == 0x03 && i + 1 < data.len() && data[i + 1] <= 0x03 {
                zero_run = 0;
                i += 1;
                continue;
            }
            if byte == 0x00 {
                zero_run += 1;
            } else {
                zero_run = 0;
            }
            out.push(byte);
            i += 1;
        }
        out
    }

    #[test]
    fn test_h264_encrypted_block_layout() {
        // (nal unit size, expected encrypted block count) per the 1-of-10
        // pattern with a 32-byte lead and a clear 16-byte tail.
        let cases = [
            (33usize, 0usize),
            (48, 0),
            (49, 1),
            (192, 1),
            (208, 1),
            (209, 2),
            (368, 2),
            (369, 3),
        ];
        let encryptor = SampleEncryptor::H264(zero_key());
        for (nalu_size, expected_blocks) in cases {
            let stream = slice_nalu_stream(nalu_size - 1);
            let out = encryptor.encrypt(stream.clone());

            // Undo the escape pass so offsets line up with the input again.
            let nal_unit = unescape_nal_unit(&out[4..]);
            assert_eq!(nal_unit.len(), nalu_size, "size {nalu_size}");

            let mut block_offsets = Vec::new();
            let mut offset = H264_LEADING_CLEAR_BYTES;
            while nalu_size > offset + AES_BLOCK_SIZE {
                block_offsets.push(offset);
                offset += AES_BLOCK_SIZE + H264_CLEAR_SKIP_BYTES;
            }
            assert_eq!(block_offsets.len(), expected_blocks, "size {nalu_size}");

            let plain = &stream[4..];
            for (index, &byte) in nal_unit.iter().enumerate() {
                let in_encrypted_block = block_offsets
                    .iter()
                    .any(|&o| index >= o && index < o + AES_BLOCK_SIZE);
                if !in_encrypted_block {
                    assert_eq!(byte, plain[index], "clear byte {index}, size {nalu_size}");
                }
            }
            for &o in &block_offsets {
                assert_ne!(
                    nal_unit[o..o + AES_BLOCK_SIZE],
                    plain[o..o + AES_BLOCK_SIZE],
                    "block at {o}, size {nalu_size}"
                );
            }
        }
    }

    #[test]
    fn test_h264_round_trip() {
        let stream = slice_nalu_stream(208);
        let encryptor = SampleEncryptor::H264(zero_key());
        let mut out = encryptor.encrypt(stream.clone());

        // Decrypt the two pattern blocks with the same chaining.
        let mut cipher = Aes128CbcDec::new(&[0u8; 16].into(), &[0u8; 16].into());
        cipher.decrypt_block_mut(Block::from_mut_slice(&mut out[36..52]));
        cipher.decrypt_block_mut(Block::from_mut_slice(&mut out[196..212]));
        assert_eq!(out, stream);
    }

    #[test]
    fn test_h264_output_has_no_unescaped_sequences() {
        // Zero-heavy plaintext forces escape insertions; verify the law on
        // the encrypted unit: no 00 00 0x outside start codes.
        let mut stream = vec![0x00, 0x00, 0x00, 0x01, 0x65];
        stream.extend(std::iter::repeat(0x00).take(300));

        let encryptor = SampleEncryptor::H264(zero_key());
        let out = encryptor.encrypt(stream);
        for window in out[4..].windows(3) {
            assert!(
                !(window[0] == 0x00 && window[1] == 0x00 && window[2] <= 0x02),
                "unescaped sequence survived"
            );
        }
    }

    #[test]
    fn test_aac_small_frame_unchanged() {
        let frame: Vec<u8> = (0x00..=0x1E).collect();
        let encryptor = SampleEncryptor::Aac(zero_key());
        assert_eq!(encryptor.encrypt(frame.clone()), frame);
    }

    #[test]
    fn test_aac_pattern_blocks() {
        // 50-byte frame: 16 clear, two chained encrypted blocks, 2 clear.
        let frame: Vec<u8> = (0x07..=0x38).collect();
        let mut expected = frame.clone();
        expected[16..48].copy_from_slice(&[
            0xE3, 0x42, 0x9B, 0x27, 0x33, 0x67, 0x68, 0x08, 0xA5, 0xB3, 0x3E, 0xB1, 0xEE, 0xFC,
            0x9E, 0x0A, 0x8E, 0x0C, 0x73, 0xC5, 0x57, 0xEE, 0x58, 0xC7, 0x48, 0x74, 0x2A, 0x12,
            0x38, 0x4F, 0x4E, 0xAC,
        ]);

        let encryptor = SampleEncryptor::Aac(zero_key());
        assert_eq!(encryptor.encrypt(frame), expected);
    }

    #[test]
    fn test_aac_last_full_block_is_encrypted() {
        // 48-byte frame: no clear tail for audio, the final block is
        // encrypted too.
        let frame: Vec<u8> = (0x07..=0x36).collect();
        let encryptor = SampleEncryptor::Aac(zero_key());
        let out = encryptor.encrypt(frame.clone());
        assert_eq!(out[..16], frame[..16]);
        assert_ne!(out[32..48], frame[32..48]);
        assert_eq!(out.len(), 48);
    }

    #[test]
    fn test_aac_encrypted_byte_counts() {
        let encryptor = SampleEncryptor::Aac(zero_key());
        for len in [32usize, 33, 47, 48, 50, 100] {
            let frame: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let out = encryptor.encrypt(frame.clone());
            let expected_encrypted = (len - AAC_LEADING_CLEAR_BYTES) / AES_BLOCK_SIZE
                * AES_BLOCK_SIZE;
            assert_eq!(out[..16], frame[..16], "len {len}");
            assert_eq!(
                out[16 + expected_encrypted..],
                frame[16 + expected_encrypted..],
                "len {len}"
            );
        }
    }

    #[test]
    fn test_aac_round_trip() {
        let frame: Vec<u8> = (0x07..=0x38).collect();
        let encryptor = SampleEncryptor::Aac(zero_key());
        let mut out = encryptor.encrypt(frame.clone());

        let mut cipher = Aes128CbcDec::new(&[0u8; 16].into(), &[0u8; 16].into());
        cipher.decrypt_block_mut(Block::from_mut_slice(&mut out[16..32]));
        cipher.decrypt_block_mut(Block::from_mut_slice(&mut out[32..48]));
        assert_eq!(out, frame);
    }
}
