//! Audio fixtures for scenarios and tests.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, mono, no CRC, original.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0xC4];

/// 144 * 128000 / 44100, no padding.
const FRAME_LEN: usize = 417;

const FRAME_COUNT: usize = 4;

/// Raw bytes of a short silent MP3 (a few zero-filled frames, ~100 ms).
pub fn silence_mp3() -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_LEN * FRAME_COUNT);
    for _ in 0..FRAME_COUNT {
        out.extend_from_slice(&FRAME_HEADER);
        out.resize(out.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    out
}

/// [`silence_mp3`] encoded as standard base64.
pub fn silence_mp3_base64() -> String {
    STANDARD.encode(silence_mp3())
}

/// Wrap base64 audio in a `data:` URI, as browsers produce for uploads.
pub fn data_uri(mime_type: &str, audio_base64: &str) -> String {
    format!("data:{};base64,{}", mime_type, audio_base64)
}
