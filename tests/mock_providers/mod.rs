//! Mock Realtime Transcription Service
//!
//! Simulates the realtime speech service over a local WebSocket:
//! - Credential frame handshake (`CONNECT` or `ERROR`)
//! - Audio acknowledgements when `isAckEnabled=true`
//! - Partial results while audio streams
//! - Final results on `SENDFINALRESULT`

// Allow dead code in test infrastructure - not every test uses every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collector for the mock server
#[derive(Debug, Default)]
pub struct MockStats {
    pub connections: AtomicU64,
    pub credential_frames: AtomicU64,
    pub audio_chunks: AtomicU64,
    pub audio_bytes: AtomicU64,
    pub final_requests: AtomicU64,
}

impl MockStats {
    pub fn record_audio(&self, len: usize) {
        self.audio_chunks.fetch_add(1, Ordering::Relaxed);
        self.audio_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes.load(Ordering::Relaxed)
    }

    pub fn final_requests(&self) -> u64 {
        self.final_requests.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Connections: {}, Credentials: {}, AudioChunks: {}, AudioBytes: {}, FinalRequests: {}",
            self.connections.load(Ordering::Relaxed),
            self.credential_frames.load(Ordering::Relaxed),
            self.audio_chunks.load(Ordering::Relaxed),
            self.audio_bytes.load(Ordering::Relaxed),
            self.final_requests.load(Ordering::Relaxed),
        )
    }
}

pub mod websocket_mock;
