pub mod dsp;
pub mod embed;
pub mod error;
pub mod io;
pub mod writer;

pub use dsp::{downmix_to_mono, to_pcm16, validate_waveform, PeakLevel};
pub use embed::{audio_to_html, EmbedMode, EmbedOptions};
pub use error::AudioError;
pub use io::{AudioDecoder, DecodedAudio};
pub use writer::{AudioCodec, AudioMaterializer, ExistingFilePolicy, MaterializedAudio};
