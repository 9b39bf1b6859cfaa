//! Speech and image collaborators, plus local storage for what they return.

pub mod image;
pub mod speech;
pub mod store;

pub use image::{GeneratedImage, ImageGenerator, OpenAiImages};
pub use speech::{OpenAiSpeech, SpeechSynthesizer};
pub use store::MediaStore;
