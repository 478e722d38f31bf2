use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval, timeout};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use speech_realtime::{
    ClientConfig,
    core::credentials::CredentialCache,
    core::realtime::{
        AckAudioMessage, CloseEvent, ConnectMessage, OpenEvent, RealtimeError, RealtimeListener,
        RealtimeSpeechClient, ResultMessage,
    },
};

/// Realtime speech transcription client - streams an audio file and logs transcripts
#[derive(Parser, Debug)]
#[command(name = "speech-realtime")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Compartment the session is billed to
    #[arg(long)]
    compartment_id: Option<String>,

    /// Service region, e.g. us-phoenix-1
    #[arg(long)]
    region: Option<String>,

    /// Explicit service endpoint (overrides the region)
    #[arg(long)]
    endpoint: Option<String>,

    /// Audio to stream: 16-bit PCM WAV, or headerless 16-bit mono PCM
    #[arg(short = 'a', long, value_name = "FILE")]
    audio: PathBuf,

    /// Sample rate of headerless PCM input
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,

    /// Duration of each audio chunk in milliseconds
    #[arg(long, default_value_t = 100)]
    chunk_ms: u64,

    /// Request a final result every N seconds while streaming
    #[arg(long)]
    final_every_secs: Option<u64>,
}

/// Session milestones forwarded from the listener to `main`.
#[derive(Debug)]
enum SessionSignal {
    Running,
    Closed(CloseEvent),
    Failed(RealtimeError),
}

struct ConsoleListener {
    signals: mpsc::UnboundedSender<SessionSignal>,
}

#[async_trait]
impl RealtimeListener for ConsoleListener {
    async fn on_close(&self, event: CloseEvent) {
        info!(code = event.code, reason = %event.reason, "Session closed");
        let _ = self.signals.send(SessionSignal::Closed(event));
    }

    async fn on_connect(&self, event: OpenEvent) {
        info!(url = %event.url, "Socket open, authenticating");
    }

    async fn on_error(&self, error: RealtimeError) {
        error!("Session error: {}", error);
        let _ = self.signals.send(SessionSignal::Failed(error));
    }

    async fn on_connect_message(&self, message: ConnectMessage) {
        info!(session_id = ?message.session_id, "Session started");
        let _ = self.signals.send(SessionSignal::Running);
    }

    async fn on_result(&self, message: ResultMessage) {
        for transcription in &message.transcriptions {
            if transcription.is_final {
                info!(
                    confidence = transcription.confidence,
                    "FINAL: {}", transcription.transcription
                );
            } else {
                info!("partial: {}", transcription.transcription);
            }
        }
    }

    async fn on_ack_audio(&self, message: AckAudioMessage) {
        if let Some(details) = message.details {
            tracing::debug!(
                sequence = ?details.sequence_number,
                length = ?details.length,
                offset = ?details.offset,
                "Audio acknowledged"
            );
        }
    }
}

/// Raw little-endian 16-bit PCM and its sample rate.
struct AudioSource {
    sample_rate: u32,
    pcm: Vec<u8>,
}

fn load_audio(path: &Path, raw_sample_rate: u32) -> anyhow::Result<AudioSource> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));

    if !is_wav {
        let pcm = std::fs::read(path)
            .with_context(|| format!("Failed to read audio file {}", path.display()))?;
        return Ok(AudioSource {
            sample_rate: raw_sample_rate,
            pcm,
        });
    }

    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        bail!(
            "Unsupported WAV format: {} channel(s), {}-bit {:?}; expected mono 16-bit PCM",
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let samples = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to decode WAV samples")?;
    let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

    Ok(AudioSource {
        sample_rate: spec.sample_rate,
        pcm,
    })
}

async fn wait_for(
    signals: &mut mpsc::UnboundedReceiver<SessionSignal>,
    limit: Duration,
    done: impl Fn(&SessionSignal) -> bool,
) -> anyhow::Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, signals.recv()).await {
            Ok(Some(signal)) if done(&signal) => return Ok(()),
            Ok(Some(SessionSignal::Failed(e))) => bail!("Session failed: {e}"),
            Ok(Some(SessionSignal::Closed(close))) => {
                bail!("Session closed unexpectedly ({}: {})", close.code, close.reason)
            }
            Ok(Some(_)) => {}
            Ok(None) => bail!("Listener dropped"),
            Err(_) => bail!("Timed out after {}s", limit.as_secs()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path),
        None => ClientConfig::from_env(),
    }
    .map_err(|e| anyhow!("Failed to load configuration: {e}"))?;

    // CLI flags take precedence over every other source
    if cli.compartment_id.is_some() {
        config.compartment_id = cli.compartment_id.clone();
    }
    if cli.region.is_some() {
        config.region = cli.region.clone();
    }
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }
    config.validate().map_err(|e| anyhow!(e))?;

    let audio = load_audio(&cli.audio, cli.sample_rate)?;
    config.parameters.encoding = Some(format!("audio/raw;rate={}", audio.sample_rate));

    let endpoint = config.endpoint().map_err(|e| anyhow!(e))?;
    let compartment_id = config.compartment_id.clone().unwrap_or_default();
    let signer = config
        .signer()
        .map_err(|e| anyhow!("Failed to load API key: {e}"))?;
    let credentials = Arc::new(CredentialCache::new(Arc::new(signer)));

    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let client = RealtimeSpeechClient::new(
        Arc::new(ConsoleListener { signals: signal_tx }),
        credentials,
        compartment_id,
        endpoint,
        Some(config.parameters.clone()),
    );

    client.connect().await;
    wait_for(&mut signals, Duration::from_secs(30), |s| {
        matches!(s, SessionSignal::Running)
    })
    .await?;

    let chunk_ms = cli.chunk_ms.max(1);
    let bytes_per_chunk = ((audio.sample_rate as u64 * chunk_ms / 1000) as usize * 2).max(2);
    info!(
        bytes = audio.pcm.len(),
        chunk_bytes = bytes_per_chunk,
        "Streaming audio"
    );

    let final_every = cli.final_every_secs.map(Duration::from_secs);
    let mut last_final = Instant::now();
    let mut ticker = interval(Duration::from_millis(chunk_ms));

    for chunk in audio.pcm.chunks(bytes_per_chunk) {
        ticker.tick().await;
        client
            .send_audio_data(Bytes::copy_from_slice(chunk))
            .await;

        if let Some(every) = final_every {
            if last_final.elapsed() >= every {
                client.request_final_result().await;
                last_final = Instant::now();
            }
        }

        match signals.try_recv() {
            Ok(SessionSignal::Failed(e)) => bail!("Session failed while streaming: {e}"),
            Ok(SessionSignal::Closed(close)) => {
                bail!("Session closed while streaming ({}: {})", close.code, close.reason)
            }
            _ => {}
        }
    }

    info!("Audio sent, requesting final result");
    client.request_final_result().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    client.close().await;
    if let Err(e) = wait_for(&mut signals, Duration::from_secs(5), |s| {
        matches!(s, SessionSignal::Closed(_))
    })
    .await
    {
        warn!("Session did not close cleanly: {}", e);
    }

    Ok(())
}
