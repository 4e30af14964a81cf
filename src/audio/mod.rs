pub mod analysis;
pub mod chroma;
pub mod decode;
pub mod features;
pub mod octave;
pub mod stft;
