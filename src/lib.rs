//! Birthday photo shoot generator: uploads a portrait to Gemini together with
//! an age and an outfit style, and keeps a local history of the results.

pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod controller;
pub mod history;
pub mod llm;
pub mod utils;
