use std::io::Cursor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::dsp::downmix_to_mono;

/// Decoded audio with interleaved samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn into_mono(self) -> Vec<f32> {
        downmix_to_mono(&self.samples, self.channels)
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode an in-memory payload such as a file fetched from the dataset hub.
    pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
        Self::decode_source(Box::new(Cursor::new(bytes)), extension)
    }

    fn decode_source(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<DecodedAudio> {
        let mss = MediaSourceStream::new(source, Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognized audio container")?;
        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| anyhow::anyhow!("no default track found"))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
        let mut samples = Vec::new();

        loop {
            match format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != track_id {
                        continue;
                    }
                    let buffer = match decoder.decode(&packet) {
                        Ok(buffer) => buffer,
                        Err(symphonia::core::errors::Error::DecodeError(err)) => {
                            debug!(%err, "skipping undecodable packet");
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    };
                    let spec = *buffer.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);
                    let mut out = SampleBuffer::<f32>::new(buffer.frames() as u64, spec);
                    out.copy_interleaved_ref(buffer);
                    samples.extend_from_slice(out.samples());
                }
                Err(err) => {
                    use symphonia::core::errors::Error as SymphError;
                    match err {
                        SymphError::IoError(e)
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            break
                        }
                        _ => return Err(err.into()),
                    }
                }
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| anyhow::anyhow!("stream has no sample rate"))?;
        Ok(DecodedAudio {
            sample_rate,
            channels: channels.unwrap_or(1),
            samples,
        })
    }
}
