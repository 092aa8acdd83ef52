//! File decoders and the decoder registry
//!
//! Decoding happens on the control thread. The registry is a plain value the
//! caller constructs and owns; there is no process-wide format table.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioSource, LoadError, LoadResult};

/// Something that can turn a file into an [`AudioSource`]
pub trait SourceDecoder: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether this decoder wants to handle `path`
    fn can_decode(&self, path: &Path) -> bool;

    /// Decode the whole file into memory
    fn open(&self, path: &Path) -> LoadResult<AudioSource>;
}

/// Decoder backed by symphonia (WAV, FLAC, MP3, Ogg Vorbis)
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    const EXTENSIONS: &'static [&'static str] = &["wav", "wave", "flac", "mp3", "ogg", "oga"];
}

impl SourceDecoder for SymphoniaDecoder {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn can_decode(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            // No extension: let the probe decide
            None => true,
        }
    }

    fn open(&self, path: &Path) -> LoadResult<AudioSource> {
        let file = File::open(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| LoadError::NoAudioTrack(path.to_path_buf()))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut decode_errors = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    log::warn!("Error reading packet from {:?}: {}", path, e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    decode_errors += 1;
                    log::warn!("Skipping corrupt packet in {:?}: {}", path, e);
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channels.get_or_insert(spec.channels.count() as u16);

            // Packets may grow; reallocate the scratch buffer when they do
            let duration = decoded.capacity() as u64;
            let needed = decoded.capacity() * spec.channels.count();
            if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                sample_buf = Some(SampleBuffer::new(duration, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
        }

        let sample_rate = sample_rate
            .ok_or_else(|| LoadError::InvalidFormat("unknown sample rate".to_string()))?;
        let channels = channels
            .ok_or_else(|| LoadError::InvalidFormat("unknown channel count".to_string()))?;

        if samples.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        let source = AudioSource::from_interleaved(samples, channels, sample_rate)?.with_path(path);

        log::info!(
            "Decoded {:?}: {} frames, {} ch, {} Hz ({:.2}s){}",
            path,
            source.frames(),
            source.channels(),
            source.sample_rate(),
            source.duration_secs(),
            if decode_errors > 0 {
                format!(", {} corrupt packets skipped", decode_errors)
            } else {
                String::new()
            }
        );

        Ok(source)
    }
}

/// Ordered set of decoders consulted on load
///
/// The first decoder whose [`SourceDecoder::can_decode`] accepts the path is
/// used.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn SourceDecoder>>,
}

impl DecoderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { decoders: Vec::new() }
    }

    /// Registry with the built-in symphonia decoder
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SymphoniaDecoder);
        registry
    }

    /// Add a decoder; earlier registrations win
    pub fn register(&mut self, decoder: impl SourceDecoder + 'static) {
        self.decoders.push(Box::new(decoder));
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Open and fully decode `path`
    pub fn open(&self, path: &Path) -> LoadResult<AudioSource> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let decoder = self
            .decoders
            .iter()
            .find(|d| d.can_decode(path))
            .ok_or_else(|| {
                LoadError::UnsupportedFormat(format!(
                    "no decoder for {:?}",
                    path.extension().unwrap_or_default()
                ))
            })?;

        log::debug!("Opening {:?} with {} decoder", path, decoder.name());
        decoder.open(path)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let value = ((i as f32 * 0.05).sin() * 16000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 2, 44100, 4410);

        let source = DecoderRegistry::with_defaults().open(&path).unwrap();
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.frames(), 4410);
        assert_eq!(source.path(), Some(path.as_path()));
        assert!((source.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 48000, 480);

        let source = DecoderRegistry::with_defaults().open(&path).unwrap();
        assert_eq!(source.channels(), 1);
        let frame = source.frame(10);
        assert_eq!(frame.left, frame.right);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = DecoderRegistry::with_defaults().open(&PathBuf::from("/nonexistent/track.wav"));
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not audio").unwrap();

        let result = DecoderRegistry::with_defaults().open(&path);
        assert!(matches!(result, Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_garbage_wav_fails_to_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not RIFF data").unwrap();

        assert!(DecoderRegistry::with_defaults().open(&path).is_err());
    }

    struct FixedDecoder;

    impl SourceDecoder for FixedDecoder {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn can_decode(&self, path: &Path) -> bool {
            path.extension().and_then(|e| e.to_str()) == Some("raw")
        }

        fn open(&self, _path: &Path) -> LoadResult<AudioSource> {
            AudioSource::from_interleaved(vec![0.5; 200], 2, 1000)
        }
    }

    #[test]
    fn test_registry_uses_custom_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.raw");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let mut registry = DecoderRegistry::new();
        assert!(registry.is_empty());
        registry.register(FixedDecoder);
        registry.register(SymphoniaDecoder);

        let source = registry.open(&path).unwrap();
        assert_eq!(source.frames(), 100);
        assert_eq!(source.sample_rate(), 1000);
    }
}
