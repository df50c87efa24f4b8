//! RIFF/WAVE container parsing.
//!
//! The parser walks chunks from any `Read` source and stops as soon as both
//! the `fmt ` and `data` chunks have been seen, so trailing chunks are never
//! read.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use sizzle_core::{AudioFile, CodecInfo, DecodedAudio, Error, FileInfo, PlaybackFormat, Result, Tags};
use tracing::{debug, info, warn};

use crate::codec::{self, SampleFormat, WAVE_FORMAT_IEEE_FLOAT};

/// `fmt ` fields that precede any extension bytes.
const FMT_FIXED_SIZE: u32 = 16;

/// Format code announcing a `WAVEFORMATEXTENSIBLE` header.
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Offset of the sub-format code inside the `fmt ` extension
/// (after cbSize, valid bits and channel mask).
const SUBFORMAT_OFFSET: usize = 8;

/// Parsed `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtChunk {
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
}

/// Decode a WAV file from disk.
pub fn decode_file(path: impl AsRef<Path>) -> Result<AudioFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let size_bytes = file.metadata()?.len();

    let mut audio = decode_reader(BufReader::new(file))?;
    audio.file.path = Some(path.to_path_buf());
    audio.file.size_bytes = size_bytes;

    info!(
        "Decoded {}: {} Hz, {} channels, {} frames ({:.2}s)",
        path.display(),
        audio.format.sample_rate,
        audio.format.channels,
        audio.total_frames,
        audio.format.duration_seconds
    );
    Ok(audio)
}

/// Decode a WAV image held in memory.
pub fn decode_bytes(data: &[u8]) -> Result<AudioFile> {
    let mut audio = decode_reader(data)?;
    audio.file.size_bytes = data.len() as u64;
    Ok(audio)
}

/// Decode a WAV stream.
pub fn decode_reader<R: Read>(mut reader: R) -> Result<AudioFile> {
    read_riff_header(&mut reader)?;

    let mut fmt: Option<FmtChunk> = None;
    let mut data: Option<Vec<u8>> = None;
    let mut tags = Tags::default();

    while fmt.is_none() || data.is_none() {
        let Some((id, size)) = read_chunk_header(&mut reader)? else {
            break;
        };
        debug!("Chunk {:?}: {} bytes", String::from_utf8_lossy(&id), size);

        match &id {
            b"fmt " => fmt = Some(read_fmt(&mut reader, size)?),
            b"data" => data = Some(read_data(&mut reader, size)?),
            b"LIST" => read_list(&mut reader, size, &mut tags)?,
            _ => {
                skip(&mut reader, u64::from(size))?;
            }
        }

        if fmt.is_some() && data.is_some() {
            break;
        }
        // Chunks are word aligned.
        if size % 2 == 1 {
            skip(&mut reader, 1)?;
        }
    }

    let fmt = fmt.ok_or_else(|| {
        Error::TruncatedContainer("stream ended before a fmt chunk".to_string())
    })?;
    let data = data.ok_or_else(|| {
        Error::TruncatedContainer("stream ended before a data chunk".to_string())
    })?;

    Ok(build_audio_file(&fmt, &data, tags))
}

fn build_audio_file(fmt: &FmtChunk, data: &[u8], tags: Tags) -> AudioFile {
    let total_frames = codec::frame_count(data.len(), fmt.sample_format, fmt.channels);
    let samples = codec::decode_samples(data, fmt.sample_format, total_frames, fmt.channels);
    let analysis = codec::analyze(&samples);

    let codec_name = if fmt.sample_format == SampleFormat::F32 {
        "IEEE float"
    } else {
        "PCM"
    };

    AudioFile {
        file: FileInfo {
            path: None,
            format: "wav".to_string(),
            size_bytes: 0,
        },
        format: PlaybackFormat::new(fmt.sample_rate, fmt.channels, total_frames),
        codec: CodecInfo {
            codec_name: codec_name.to_string(),
            bitrate_kbps: (u64::from(fmt.byte_rate) * 8 / 1000) as u32,
            is_vbr: false,
            format_code: fmt.format_code,
            bits_per_sample: fmt.bits_per_sample,
            block_align: fmt.block_align,
            byte_rate: fmt.byte_rate,
        },
        decoded: DecodedAudio {
            samples,
            total_frames,
        },
        total_frames,
        analysis,
        tags,
    }
}

fn read_riff_header<R: Read>(reader: &mut R) -> Result<()> {
    let mut header = [0u8; 12];
    reader.read_exact(&mut header).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::InvalidContainer("stream shorter than a RIFF header".to_string())
        } else {
            Error::Io(e)
        }
    })?;

    if &header[0..4] != b"RIFF" {
        return Err(Error::InvalidContainer("missing RIFF magic".to_string()));
    }
    let riff_size = le_u32(&header[4..8]);
    if &header[8..12] != b"WAVE" {
        return Err(Error::InvalidContainer("missing WAVE marker".to_string()));
    }

    debug!("RIFF container, declared size {riff_size}");
    Ok(())
}

/// Next chunk id and size, or `None` once the stream is exhausted.
fn read_chunk_header<R: Read>(reader: &mut R) -> Result<Option<([u8; 4], u32)>> {
    let mut header = [0u8; 8];
    let filled = read_full(reader, &mut header)?;
    if filled < header.len() {
        if filled > 0 {
            debug!("Ignoring {filled} trailing bytes after the last chunk");
        }
        return Ok(None);
    }

    let id = [header[0], header[1], header[2], header[3]];
    Ok(Some((id, le_u32(&header[4..8]))))
}

fn read_fmt<R: Read>(reader: &mut R, size: u32) -> Result<FmtChunk> {
    if size < FMT_FIXED_SIZE {
        return Err(Error::InvalidContainer(format!(
            "fmt chunk is {size} bytes, expected at least {FMT_FIXED_SIZE}"
        )));
    }

    let mut fixed = [0u8; FMT_FIXED_SIZE as usize];
    reader.read_exact(&mut fixed).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedContainer("fmt chunk cut short".to_string())
        } else {
            Error::Io(e)
        }
    })?;

    let mut extension = Vec::new();
    reader
        .by_ref()
        .take(u64::from(size - FMT_FIXED_SIZE))
        .read_to_end(&mut extension)?;

    let format_code = le_u16(&fixed[0..2]);
    let channels = le_u16(&fixed[2..4]);
    let sample_rate = le_u32(&fixed[4..8]);
    let byte_rate = le_u32(&fixed[8..12]);
    let block_align = le_u16(&fixed[12..14]);
    let bits_per_sample = le_u16(&fixed[14..16]);

    let effective_code =
        if format_code == WAVE_FORMAT_EXTENSIBLE && extension.len() >= SUBFORMAT_OFFSET + 2 {
            le_u16(&extension[SUBFORMAT_OFFSET..SUBFORMAT_OFFSET + 2])
        } else {
            format_code
        };
    let sample_format = SampleFormat::from_wave_format(effective_code, bits_per_sample)?;

    if channels == 0 {
        return Err(Error::InvalidContainer(
            "fmt chunk declares zero channels".to_string(),
        ));
    }

    debug!(
        "fmt: code={format_code:#06x} channels={channels} rate={sample_rate} bits={bits_per_sample}{}",
        if effective_code == WAVE_FORMAT_IEEE_FLOAT { " (float)" } else { "" }
    );

    Ok(FmtChunk {
        format_code,
        channels,
        sample_rate,
        byte_rate,
        block_align,
        bits_per_sample,
        sample_format,
    })
}

fn read_data<R: Read>(reader: &mut R, size: u32) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .by_ref()
        .take(u64::from(size))
        .read_to_end(&mut data)?;

    if data.len() < size as usize {
        warn!(
            "data chunk declares {size} bytes but the stream holds {}",
            data.len()
        );
    }
    Ok(data)
}

/// Collect `INFO` text entries from a `LIST` chunk.
fn read_list<R: Read>(reader: &mut R, size: u32, tags: &mut Tags) -> Result<()> {
    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(u64::from(size))
        .read_to_end(&mut payload)?;

    if payload.len() < 4 || &payload[0..4] != b"INFO" {
        return Ok(());
    }

    let mut pos = 4;
    while pos + 8 <= payload.len() {
        let id = String::from_utf8_lossy(&payload[pos..pos + 4]).into_owned();
        let len = le_u32(&payload[pos + 4..pos + 8]) as usize;
        let start = pos + 8;
        let end = start.saturating_add(len).min(payload.len());

        let text = String::from_utf8_lossy(&payload[start..end])
            .trim_end_matches('\0')
            .trim()
            .to_string();
        if !text.is_empty() {
            match id.as_str() {
                "INAM" => tags.title = Some(text),
                "IART" => tags.artist = Some(text),
                "IPRD" => tags.album = Some(text),
                "ICRD" => tags.year = Some(text),
                _ => {
                    tags.extra.insert(id, text);
                }
            }
        }

        pos = start.saturating_add(len + len % 2);
    }
    Ok(())
}

/// Discard up to `count` bytes. Returns how many were actually skipped.
fn skip<R: Read>(reader: &mut R, count: u64) -> Result<u64> {
    Ok(io::copy(&mut reader.by_ref().take(count), &mut io::sink())?)
}

/// Fill `buf` as far as the stream allows.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}

fn le_u16(b: &[u8]) -> u16 {
    u16::from_le_bytes([b[0], b[1]])
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used, clippy::float_cmp)]

    use super::*;
    use crate::generate::{tone, Waveform};

    /// Hand-built WAV image for container edge cases.
    pub(crate) struct WavBuilder {
        chunks: Vec<([u8; 4], Vec<u8>)>,
    }

    impl WavBuilder {
        pub(crate) fn new() -> Self {
            Self { chunks: Vec::new() }
        }

        pub(crate) fn pcm(channels: u16, sample_rate: u32, bits: u16, data: &[u8]) -> Self {
            Self::new()
                .fmt(1, channels, sample_rate, bits, &[])
                .chunk(*b"data", data)
        }

        pub(crate) fn fmt(
            self,
            code: u16,
            channels: u16,
            sample_rate: u32,
            bits: u16,
            extension: &[u8],
        ) -> Self {
            let block_align = channels * (bits / 8);
            let mut body = Vec::new();
            body.extend_from_slice(&code.to_le_bytes());
            body.extend_from_slice(&channels.to_le_bytes());
            body.extend_from_slice(&sample_rate.to_le_bytes());
            body.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
            body.extend_from_slice(&block_align.to_le_bytes());
            body.extend_from_slice(&bits.to_le_bytes());
            body.extend_from_slice(extension);
            self.chunk(*b"fmt ", &body)
        }

        pub(crate) fn chunk(mut self, id: [u8; 4], body: &[u8]) -> Self {
            self.chunks.push((id, body.to_vec()));
            self
        }

        pub(crate) fn build(&self) -> Vec<u8> {
            let mut body = b"WAVE".to_vec();
            for (id, payload) in &self.chunks {
                body.extend_from_slice(id);
                body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                body.extend_from_slice(payload);
                if payload.len() % 2 == 1 {
                    body.push(0);
                }
            }
            let mut out = b"RIFF".to_vec();
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&body);
            out
        }
    }

    fn pcm16(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_pcm16_stereo() {
        let data = pcm16(&[0, 16384, -16384, -32768]);
        let audio = decode_bytes(&WavBuilder::pcm(2, 8000, 16, &data).build()).unwrap();

        assert_eq!(audio.format.channels, 2);
        assert_eq!(audio.format.sample_rate, 8000);
        assert_eq!(audio.total_frames, 2);
        assert_eq!(audio.decoded.samples, vec![0.0, 0.5, -0.5, -1.0]);
        assert_eq!(audio.codec.codec_name, "PCM");
        assert_eq!(audio.codec.bitrate_kbps, 256);
        assert!(audio.analysis.clipping_detected);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = WavBuilder::pcm(1, 8000, 16, &[0, 0]).build();
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            decode_bytes(&bytes),
            Err(Error::InvalidContainer(_))
        ));

        let mut bytes = WavBuilder::pcm(1, 8000, 16, &[0, 0]).build();
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            decode_bytes(&bytes),
            Err(Error::InvalidContainer(_))
        ));

        assert!(matches!(
            decode_bytes(b"RIFF"),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_missing_chunks_are_truncation() {
        let only_fmt = WavBuilder::new().fmt(1, 1, 8000, 16, &[]).build();
        assert!(matches!(
            decode_bytes(&only_fmt),
            Err(Error::TruncatedContainer(_))
        ));

        let only_data = WavBuilder::new().chunk(*b"data", &[0, 0]).build();
        assert!(matches!(
            decode_bytes(&only_data),
            Err(Error::TruncatedContainer(_))
        ));
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let bytes = WavBuilder::pcm(1, 8000, 12, &[0; 12]).build();
        assert!(matches!(
            decode_bytes(&bytes),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_zero_channels_rejected() {
        let bytes = WavBuilder::pcm(0, 8000, 16, &[0; 4]).build();
        assert!(matches!(
            decode_bytes(&bytes),
            Err(Error::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_skips_unknown_and_odd_chunks() {
        let bytes = WavBuilder::new()
            .chunk(*b"junk", &[1, 2, 3])
            .fmt(1, 1, 8000, 8, &[0xAA, 0xBB])
            .chunk(*b"fact", &[0; 4])
            .chunk(*b"data", &[128, 255, 0])
            .build();
        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.total_frames, 3);
        assert_eq!(audio.decoded.samples, vec![0.0, 127.0 / 128.0, -1.0]);
    }

    #[test]
    fn test_data_before_fmt() {
        let bytes = WavBuilder::new()
            .chunk(*b"data", &pcm16(&[8192, -8192]))
            .fmt(1, 2, 22050, 16, &[])
            .build();
        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.total_frames, 1);
        assert_eq!(audio.decoded.samples, vec![0.25, -0.25]);
    }

    #[test]
    fn test_stops_after_fmt_and_data() {
        let mut bytes = WavBuilder::pcm(1, 8000, 16, &pcm16(&[1, 2])).build();
        // A trailing chunk header claiming more bytes than exist is never read.
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.total_frames, 2);
    }

    #[test]
    fn test_partial_frame_truncated() {
        let data = pcm16(&[100, 200, 300]);
        let audio = decode_bytes(&WavBuilder::pcm(2, 8000, 16, &data).build()).unwrap();
        assert_eq!(audio.total_frames, 1);
        assert_eq!(audio.decoded.samples.len(), 2);
    }

    #[test]
    fn test_short_data_chunk_is_accepted() {
        let mut bytes = WavBuilder::pcm(1, 8000, 16, &pcm16(&[0; 8])).build();
        bytes.truncate(bytes.len() - 6);
        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.total_frames, 5);
    }

    #[test]
    fn test_info_tags() {
        let mut info = b"INFO".to_vec();
        for (id, text) in [(b"INAM", "Sizzle\0"), (b"IART", "Band\0"), (b"ICMT", "hi\0")] {
            info.extend_from_slice(id);
            info.extend_from_slice(&(text.len() as u32).to_le_bytes());
            info.extend_from_slice(text.as_bytes());
            if text.len() % 2 == 1 {
                info.push(0);
            }
        }
        let bytes = WavBuilder::new()
            .fmt(1, 1, 8000, 16, &[])
            .chunk(*b"LIST", &info)
            .chunk(*b"data", &pcm16(&[0]))
            .build();

        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.tags.title.as_deref(), Some("Sizzle"));
        assert_eq!(audio.tags.artist.as_deref(), Some("Band"));
        assert_eq!(audio.tags.extra.get("ICMT").map(String::as_str), Some("hi"));
    }

    #[test]
    fn test_extensible_float_subformat() {
        let mut extension = Vec::new();
        extension.extend_from_slice(&22u16.to_le_bytes()); // cbSize
        extension.extend_from_slice(&32u16.to_le_bytes()); // valid bits
        extension.extend_from_slice(&3u32.to_le_bytes()); // channel mask
        extension.extend_from_slice(&WAVE_FORMAT_IEEE_FLOAT.to_le_bytes());
        extension.extend_from_slice(&[0; 14]);

        let data: Vec<u8> = [0.5f32, -0.25]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let bytes = WavBuilder::new()
            .fmt(WAVE_FORMAT_EXTENSIBLE, 2, 48000, 32, &extension)
            .chunk(*b"data", &data)
            .build();

        let audio = decode_bytes(&bytes).unwrap();
        assert_eq!(audio.codec.codec_name, "IEEE float");
        assert_eq!(audio.decoded.samples, vec![0.5, -0.25]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = decode_file("/nonexistent/sizzle/missing.wav").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    /// Encode `source` with hound at `bits` and decode it back from disk.
    fn hound_round_trip(source: &[f32], channels: u16, bits: u16) -> AudioFile {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("sine_{bits}.wav"));
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let scale = f64::from(1u32 << (bits - 1));
        let max = scale - 1.0;

        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in source {
            let q = (f64::from(s) * scale).round().clamp(-scale, max);
            match bits {
                8 => writer.write_sample(q as i8).unwrap(),
                16 => writer.write_sample(q as i16).unwrap(),
                _ => writer.write_sample(q as i32).unwrap(),
            }
        }
        writer.finalize().unwrap();

        decode_file(&path).unwrap()
    }

    #[test]
    fn test_sine_round_trip_all_depths() {
        let source = tone(Waveform::Sine, 440.0, 0.05, 8000, 2, 0.8);

        for bits in [8u16, 16, 24, 32] {
            let audio = hound_round_trip(&source, 2, bits);
            // 32-bit integers carry more precision than an f32 can hold.
            let step = (1.0 / f64::from(1u32 << (bits - 1))).max(f64::from(f32::EPSILON));

            assert_eq!(audio.format.sample_rate, 8000);
            assert_eq!(audio.codec.bits_per_sample, bits);
            assert_eq!(audio.total_frames * 2, audio.decoded.samples.len() as u64);
            assert_eq!(audio.decoded.samples.len(), source.len());
            for (decoded, original) in audio.decoded.samples.iter().zip(&source) {
                let error = (f64::from(*decoded) - f64::from(*original)).abs();
                assert!(error <= step, "{bits}-bit error {error} exceeds {step}");
            }
        }
    }

    #[test]
    fn test_file_info_filled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.wav");
        let bytes = WavBuilder::pcm(1, 8000, 16, &pcm16(&[0, 1, 2, 3])).build();
        std::fs::write(&path, &bytes).unwrap();

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.file.format, "wav");
        assert_eq!(audio.file.size_bytes, bytes.len() as u64);
        assert_eq!(audio.file.path.as_deref(), Some(path.as_path()));
    }
}
