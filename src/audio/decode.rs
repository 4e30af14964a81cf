use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Mono waveform at the decoder's native sample rate.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported or malformed audio stream: {0}")]
    Probe(#[source] SymphoniaError),
    #[error("no decodable audio track found")]
    NoTrack,
    #[error("audio track does not report a valid sample rate")]
    InvalidSampleRate,
    #[error("failed to create audio decoder: {0}")]
    Codec(#[source] SymphoniaError),
    #[error("failed to read audio packet: {0}")]
    Packet(#[source] SymphoniaError),
    #[error("none of the {skipped} audio packets could be decoded")]
    Malformed { skipped: usize },
}

/// Decode an in-memory MP3 stream, downmixing to mono.
///
/// Takes ownership of the upload so the media source can read it in place.
pub fn decode_bytes(bytes: Vec<u8>) -> Result<AudioData, DecodeError> {
    let source = Cursor::new(bytes);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(DecodeError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = match track.codec_params.sample_rate {
        Some(sr) if sr > 0 => sr,
        _ => return Err(DecodeError::InvalidSampleRate),
    };

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Codec)?;

    let mut all_samples: Vec<f32> = Vec::new();
    let mut decoded_packets = 0usize;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Packet(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {}", msg);
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(DecodeError::Packet(e)),
        };
        decoded_packets += 1;

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    if decoded_packets == 0 && skipped_packets > 0 {
        return Err(DecodeError::Malformed {
            skipped: skipped_packets,
        });
    }

    let audio = AudioData {
        samples: all_samples,
        sample_rate,
    };
    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        audio.samples.len(),
        audio.sample_rate,
        audio.duration()
    );
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Twenty silent two-channel MPEG-1 Layer III frames at 44.1 kHz.
    const SILENT_STEREO: &[u8] = include_bytes!("testdata/silence_stereo.mp3");
    /// Same frames with an out-of-range `big_values` in every side-info block.
    const CORRUPT_SIDE_INFO: &[u8] = include_bytes!("testdata/corrupt_side_info.mp3");
    const FIXTURE_FRAMES: usize = 20;
    const SAMPLES_PER_FRAME: usize = 1152;

    #[test]
    fn rejects_text_payload() {
        let err = decode_bytes(b"this is definitely not an mp3 stream".to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::Probe(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(decode_bytes(Vec::new()).is_err());
    }

    #[test]
    fn stereo_mp3_decodes_to_mono_at_native_rate() {
        let audio = decode_bytes(SILENT_STEREO.to_vec()).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert!(!audio.samples.is_empty());
        // One mono sample per frame position, not one per channel
        assert_eq!(audio.samples.len() % SAMPLES_PER_FRAME, 0);
        assert!(audio.samples.len() <= FIXTURE_FRAMES * SAMPLES_PER_FRAME);
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn undecodable_packets_are_reported_as_malformed() {
        let err = decode_bytes(CORRUPT_SIDE_INFO.to_vec()).unwrap_err();
        match err {
            DecodeError::Malformed { skipped } => assert!(skipped > 0),
            other => panic!("expected a malformed stream, got {other}"),
        }
    }

    #[test]
    fn duration_uses_native_rate() {
        let audio = AudioData {
            samples: vec![0.0; 44100],
            sample_rate: 44100,
        };
        assert!((audio.duration() - 1.0).abs() < 1e-6);
    }
}
