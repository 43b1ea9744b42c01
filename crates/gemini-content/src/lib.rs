//! Minimal client for the Gemini REST API: structured text generation
//! through `generateContent` and image generation through Imagen `predict`.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{GeminiClient, GeneratedImage};
pub use config::{Config, ConfigBuilder};
pub use error::GeminiError;
