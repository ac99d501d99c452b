//! Audio I/O: duration probing and upload MIME types.
//!
//! WAV goes through `hound`; MP3, M4A and OGG go through `symphonia`.

use anyhow::{Context, Result, bail};
use hound::WavReader;
use std::path::Path;

/// Duration of an audio file in seconds, from its header where possible.
pub fn audio_duration(path: &Path) -> Result<f64> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        if let Ok(dur) = get_wav_duration(path) {
            return Ok(dur);
        }
        log::debug!("hound could not read {}; probing with symphonia", path.display());
    }
    probe_duration(path)
}

/// Get duration of a WAV file in seconds.
pub fn get_wav_duration(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    let num_samples = reader.len() as f64;
    let channels = spec.channels as f64;
    Ok(num_samples / channels / spec.sample_rate as f64)
}

/// Probe any supported container with symphonia.
///
/// Uses the track's frame count when the container declares one, otherwise
/// counts decoded frames.
fn probe_duration(path: &Path) -> Result<f64> {
    use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let track_id = track.id;
    let params = track.codec_params.clone();
    let sample_rate = params.sample_rate.context("Audio track has no sample rate")? as f64;

    if let Some(n_frames) = params.n_frames {
        return Ok(n_frames as f64 / sample_rate);
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .context("Unsupported codec")?;

    let mut frames: u64 = 0;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => frames += decoded.frames() as u64,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if frames == 0 {
        bail!("No audio decoded from {}", path.display());
    }
    Ok(frames as f64 / sample_rate)
}

/// Write f64 samples to a 16-bit PCM WAV file.
///
/// Clips values to [-1, 1] before conversion.
/// Creates parent directories if needed.
#[cfg(test)]
pub(crate) fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in samples {
        let clipped = sample.clamp(-1.0, 1.0);
        let int16 = (clipped * 32767.0) as i16;
        writer.write_sample(int16)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// MIME type for inline audio upload, from the file extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "audio/mpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duration.wav");
        let samples = vec![0.0; 16000]; // 1 second at 16kHz
        write_wav(&path, &samples, 16000).unwrap();

        let dur = get_wav_duration(&path).unwrap();
        assert!((dur - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_audio_duration_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.WAV");
        write_wav(&path, &vec![0.0; 8000], 16000).unwrap();
        let dur = audio_duration(&path).unwrap();
        assert!((dur - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_audio_duration_stereo_44k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..44100 * 2 {
            writer.write_sample(0i16).unwrap(); // left
            writer.write_sample(0i16).unwrap(); // right
        }
        writer.finalize().unwrap();

        let dur = audio_duration(&path).unwrap();
        assert!((dur - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_audio_duration_missing_file() {
        assert!(audio_duration(Path::new("/nonexistent/song.mp3")).is_err());
    }

    #[test]
    fn test_write_clips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipping.wav");
        write_wav(&path, &[-2.0, 0.0, 2.0], 16000).unwrap();

        let reader = WavReader::open(&path).unwrap();
        let read: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, vec![-32767, 0, 32767]);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(mime_type(Path::new("a.WAV")), "audio/wav");
        assert_eq!(mime_type(Path::new("a.m4a")), "audio/mp4");
        assert_eq!(mime_type(Path::new("a.ogg")), "audio/ogg");
        assert_eq!(mime_type(Path::new("a")), "audio/mpeg");
    }
}
