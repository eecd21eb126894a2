//! Speech-to-text seam used by voice-capable message sources.

use async_trait::async_trait;

use crate::error::TranscriptionError;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Convert an audio file (raw bytes plus its original file name) to text.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str)
    -> Result<String, TranscriptionError>;
}
