//! Vision backend collaborator: capability trait, wire types, HTTP client.

mod client;
#[cfg(test)]
pub mod testing;
mod wire;

pub use client::{HttpBackend, VisionBackend};
pub use wire::{ChatRequest, ChatResponse, StatusResponse, UploadResponse};
