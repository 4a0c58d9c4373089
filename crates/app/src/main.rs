use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use cue_sync_core::{
    codec, envelope, ripple, CueSyncError, Decoder, EditorSession, EngineConfig, RawPcmDecoder,
    RippleMode, RippleRequest, SimulatedTransport, Transport, WavDecoder,
};
use tracing_subscriber::EnvFilter;

fn main() -> cue_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Adjust {
            path,
            pivot,
            mode,
            time,
        } => run_adjust(path, pivot, mode, time),
        Commands::Envelope {
            input,
            output,
            raw_rate,
        } => run_envelope(&config, input, output, raw_rate),
        Commands::Renumber { path, output } => run_renumber(path, output),
        Commands::Replay {
            cues,
            from,
            seconds,
        } => run_replay(config, cues, from, seconds),
    }
}

fn run_adjust(path: PathBuf, pivot: f64, mode: RippleMode, time: f64) -> cue_sync_core::Result<()> {
    tracing::info!(?path, pivot, %mode, time, "adjusting cue timings");

    let request = RippleRequest::new(mode, pivot, time);
    match ripple::adjust_file(&path, request) {
        Ok(report) => {
            println!("{}", report.outcome);
            if report.skipped_blocks > 0 {
                println!("skipped {} malformed block(s)", report.skipped_blocks);
            }
            println!("saved adjusted cues to {}", report.output.display());
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            println!("nothing to adjust: {err}");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn run_envelope(
    config: &EngineConfig,
    input: PathBuf,
    output: PathBuf,
    raw_rate: Option<u32>,
) -> cue_sync_core::Result<()> {
    tracing::info!(?input, ?output, "running envelope precompute");

    let raw_rate = raw_rate.or_else(|| {
        is_raw_pcm(&input).then_some(config.envelope.decode_sample_rate)
    });
    let decoder: Box<dyn Decoder> = match raw_rate {
        Some(rate) => Box::new(RawPcmDecoder::new(rate)),
        None => Box::new(WavDecoder),
    };
    let pcm = decoder.decode(&input)?;
    let envelope = envelope::build(&pcm.samples, pcm.sample_rate, config.envelope.visual_rate_hz)?;
    envelope.write_json(&output)?;

    println!(
        "{} pairs covering {} written to {}",
        envelope.len(),
        codec::format_timestamp(envelope.duration_seconds()),
        output.display()
    );
    Ok(())
}

fn is_raw_pcm(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pcm") || ext.eq_ignore_ascii_case("raw"))
}

fn run_renumber(path: PathBuf, output: Option<PathBuf>) -> cue_sync_core::Result<()> {
    let parsed = codec::read_file(&path)?;
    for block in &parsed.skipped {
        println!("skipped block at line {}: {}", block.line, block.reason);
    }

    let output = output.unwrap_or(path);
    codec::write_file(&output, &parsed.track)?;
    println!("wrote {} cue(s) to {}", parsed.track.len(), output.display());
    Ok(())
}

fn run_replay(
    config: EngineConfig,
    cues: PathBuf,
    from: f64,
    seconds: f64,
) -> cue_sync_core::Result<()> {
    if !(seconds > 0.0 && seconds.is_finite()) {
        return Err(CueSyncError::InvalidInput(
            "replay length must be a positive, finite number of seconds",
        ));
    }

    let interval = config.playback.poll_interval().as_secs_f64();
    let transport = SimulatedTransport::with_duration(from + seconds);
    let mut session = EditorSession::new(config, transport, Arc::new(WavDecoder))?;
    session.load_cues(&cues)?;
    if let Some(index) = session.select_at(from) {
        print_cue(&session, from, index);
    }
    session.transport_mut().play(from)?;
    tracing::info!(?cues, from, seconds, "replaying cue selection");

    loop {
        let outcome = session.tick();
        if let Some(change) = outcome.selection_changed {
            print_cue(&session, outcome.time, change.current);
        }
        if !outcome.playing {
            break;
        }
        session.transport_mut().advance(interval);
    }
    Ok(())
}

fn print_cue(session: &EditorSession<SimulatedTransport>, time: f64, index: usize) {
    if let Some(cue) = session.track().get(index) {
        println!(
            "[{}] #{} {}",
            codec::format_clock(time),
            index + 1,
            cue.text.replace('\n', " / ")
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_time(value: &str) -> Result<f64, String> {
    codec::parse_timestamp(value).map_err(|err| err.to_string())
}

fn parse_mode(value: &str) -> Result<RippleMode, String> {
    value.parse::<RippleMode>().map_err(|err| err.to_string())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Subtitle cue timing tools", long_about = None)]
struct Cli {
    /// Optional JSON engine configuration.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ripple-shift every cue from a pivot onwards and save a copy.
    Adjust {
        /// Cue file to adjust. The result is written next to it.
        path: PathBuf,
        /// Pivot time (HH:MM:SS,mmm or seconds).
        #[arg(value_parser = parse_time)]
        pivot: f64,
        #[arg(value_parser = parse_mode, value_name = "extend|reduce")]
        mode: RippleMode,
        /// Target time for `extend`, source time for `reduce`.
        #[arg(value_parser = parse_time)]
        time: f64,
    },
    /// Decode an audio file and persist its waveform envelope as JSON.
    Envelope {
        /// WAV file, or headerless s16le mono PCM (`.pcm`, `.raw` or `--raw-rate`).
        input: PathBuf,
        /// Output path for the envelope cache.
        output: PathBuf,
        /// Treat the input as raw PCM at this sample rate. `.pcm` and `.raw`
        /// inputs default to the configured decode rate.
        #[arg(long)]
        raw_rate: Option<u32>,
    },
    /// Rewrite a cue file with ordinals renumbered from 1.
    Renumber {
        path: PathBuf,
        /// Write here instead of overwriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate playback and print every active cue change.
    Replay {
        cues: PathBuf,
        /// Playback start (HH:MM:SS,mmm or seconds).
        #[arg(long, default_value = "0", value_parser = parse_time)]
        from: f64,
        /// How many seconds to play.
        #[arg(long, default_value_t = 60.0)]
        seconds: f64,
    },
}
