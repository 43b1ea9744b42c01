pub mod app;
pub mod commands;
pub mod config;
pub mod console_speech;
pub mod gemini_adapter;
pub mod prompt_loader;
pub mod render;
