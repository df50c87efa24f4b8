//! `sizzle info` output.

use std::fmt::Write as _;

use sizzle_core::AudioFile;

/// Human-readable summary of a decoded file.
pub fn summary(audio: &AudioFile) -> String {
    let mut text = String::new();
    let codec = &audio.codec;

    if let Some(path) = &audio.file.path {
        let _ = writeln!(text, "File:        {}", path.display());
    }
    let _ = writeln!(
        text,
        "Container:   {} ({} bytes)",
        audio.file.format, audio.file.size_bytes
    );
    let _ = writeln!(
        text,
        "Codec:       {} ({} bit, {} kbps{})",
        codec.codec_name,
        codec.bits_per_sample,
        codec.bitrate_kbps,
        if codec.is_vbr { ", VBR" } else { "" }
    );
    let _ = writeln!(
        text,
        "Format:      {} Hz, {} channel(s)",
        audio.format.sample_rate, audio.format.channels
    );
    let _ = writeln!(
        text,
        "Duration:    {:.2} sec ({} frames)",
        audio.format.duration_seconds, audio.total_frames
    );

    let analysis = &audio.analysis;
    let _ = writeln!(
        text,
        "Amplitude:   min {:.4}, max {:.4}, rms {:.4}",
        analysis.min_amplitude, analysis.max_amplitude, analysis.rms_amplitude
    );
    let _ = writeln!(
        text,
        "Clipping:    {}",
        if analysis.clipping_detected { "yes" } else { "no" }
    );

    let tags = &audio.tags;
    for (label, value) in [
        ("Title", &tags.title),
        ("Artist", &tags.artist),
        ("Album", &tags.album),
        ("Year", &tags.year),
    ] {
        if let Some(value) = value {
            let _ = writeln!(text, "{:<12} {value}", format!("{label}:"));
        }
    }
    for (key, value) in &tags.extra {
        let _ = writeln!(text, "{:<12} {value}", format!("{key}:"));
    }

    text
}

pub fn json(audio: &AudioFile) -> serde_json::Result<String> {
    serde_json::to_string_pretty(audio)
}
