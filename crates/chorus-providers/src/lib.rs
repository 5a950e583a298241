//! # chorus-providers
//!
//! Language-model backends, the model adapter, and media vendors for Chorus.

pub mod adapter;
pub mod anthropic;
pub mod elevenlabs;
pub mod fakeyou;
pub mod openai;
pub mod openai_media;
pub mod transcode;

pub use adapter::ModelAdapter;
pub use anthropic::AnthropicProvider;
pub use elevenlabs::ElevenLabsTts;
pub use fakeyou::FakeYouClient;
pub use openai::OpenAiProvider;
pub use openai_media::OpenAiMedia;
