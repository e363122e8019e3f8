use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use tonecast_core::config::AudioMode;
use tonecast_core::decoder::{Decoder, DecoderOptions};
use tonecast_core::diagnostics::{DecodeProgress, ProgressObserver};
use tonecast_core::encoder::{EncodeOptions, Encoder};

const DECODE_BLOCK: usize = 4096;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send and receive bytes as audible sound", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Phone,
    Wideband,
}

impl From<ModeArg> for AudioMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Phone => AudioMode::Phone,
            ModeArg::Wideband => AudioMode::Wideband,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode text or a file into a WAV transmission
    Encode {
        /// Message text to send; reads stdin when neither this nor
        /// --input is given
        #[arg(short, long)]
        message: Option<String>,

        /// Read the payload from a file
        #[arg(short, long, conflicts_with = "message")]
        input: Option<PathBuf>,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Audio mode
        #[arg(long, value_enum, default_value = "phone")]
        mode: ModeArg,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,

        /// Encrypt the payload with this password
        #[arg(short, long)]
        password: Option<String>,

        /// Skip payload compression
        #[arg(long)]
        no_compress: bool,

        /// Print transmission stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a WAV transmission back into bytes
    Decode {
        /// Input WAV path
        input: PathBuf,

        /// Write decoded bytes to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password for encrypted payloads
        #[arg(short, long)]
        password: Option<String>,

        /// Print decode stats as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Decode progress rendered on a single indicatif line.
struct BarObserver {
    bar: ProgressBar,
}

impl BarObserver {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
        );
        Self { bar }
    }
}

impl ProgressObserver for BarObserver {
    fn update(&mut self, progress: &DecodeProgress) {
        let mut message = format!(
            "{:?} | signal {:>3.0} | frames {}/{}",
            progress.state,
            progress.signal_level,
            progress.frames_received,
            progress.frames_expected
        );
        if progress.errors_corrected > 0 {
            message.push_str(&format!(" | {} corrected", progress.errors_corrected));
        }
        if progress.signal_warning {
            message.push_str(" | poor signal");
        }
        self.bar.set_message(message);
        self.bar.tick();
    }
}

fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("{err}");
        return ExitCode::from(1);
    }
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Encode {
            message,
            input,
            output,
            mode,
            sample_rate,
            password,
            no_compress,
            json,
        } => run_encode(
            message,
            input,
            output,
            mode.into(),
            sample_rate,
            password,
            no_compress,
            json,
        ),
        Command::Decode {
            input,
            output,
            password,
            json,
        } => run_decode(input, output, password, json),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_encode(
    message: Option<String>,
    input: Option<PathBuf>,
    output: PathBuf,
    mode: AudioMode,
    sample_rate: u32,
    password: Option<String>,
    no_compress: bool,
    json: bool,
) -> Result<ExitCode> {
    let payload = match (message, input) {
        (Some(text), _) => text.into_bytes(),
        (None, Some(path)) => fs::read(&path)
            .wrap_err_with(|| format!("Failed to read payload from {}", path.display()))?,
        (None, None) => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .wrap_err("Failed to read payload from stdin")?;
            buffer
        }
    };

    let mut encoder = Encoder::new(EncodeOptions {
        mode,
        sample_rate,
        compression: !no_compress,
        ..Default::default()
    });
    let result = encoder.encode(&payload, password.as_deref())?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: result.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output, spec)
        .wrap_err_with(|| format!("Failed to create {}", output.display()))?;
    for &sample in &result.pcm {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "output": output.display().to_string(),
                "duration_secs": result.duration,
                "sample_rate": result.sample_rate,
                "checksum": result.checksum,
                "stats": result.stats,
            })
        );
    } else {
        eprintln!(
            "Wrote {} samples ({:.2}s) to {}",
            result.pcm.len(),
            result.duration,
            output.display()
        );
        eprintln!(
            "{} payload bytes in {} frames, sha256 {}",
            result.stats.payload_bytes, result.stats.frame_count, result.checksum
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_decode(
    input: PathBuf,
    output: Option<PathBuf>,
    password: Option<String>,
    json: bool,
) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav_mono(&input)?;

    let mut decoder = Decoder::new(DecoderOptions {
        sample_rate,
        password,
        ..Default::default()
    })?;
    let observer = BarObserver::new();
    let bar = observer.bar.clone();
    decoder.set_observer(Box::new(observer));
    decoder.start();

    let mut decoded = None;
    for block in samples.chunks(DECODE_BLOCK) {
        if let Some(result) = decoder.process_samples(block)? {
            decoded = Some(result);
            break;
        }
    }
    if decoded.is_none() {
        // Flush trailing symbol windows with a little silence.
        let silence = vec![0.0f32; DECODE_BLOCK];
        for _ in 0..4 {
            if let Some(result) = decoder.process_samples(&silence)? {
                decoded = Some(result);
                break;
            }
        }
    }
    bar.finish_and_clear();

    let Some(result) = decoded else {
        if decoder.progress().needs_password {
            bail!("The payload is encrypted; supply --password");
        }
        eprintln!("Error: no transmission could be recovered from {}", input.display());
        return Ok(ExitCode::from(2));
    };

    match &output {
        Some(path) => {
            fs::write(path, &result.bytes)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", result.bytes.len(), path.display());
        }
        None => match &result.text {
            Some(text) => println!("{text}"),
            None => std::io::stdout().write_all(&result.bytes)?,
        },
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "bytes": result.bytes.len(),
                "checksum": result.checksum,
                "encrypted": result.encrypted,
                "stats": result.stats,
            })
        );
    } else {
        eprintln!("sha256 {}", result.checksum);
    }
    Ok(ExitCode::SUCCESS)
}

/// Load a WAV file as mono f32 samples in [-1, 1].
fn read_wav_mono(path: &PathBuf) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let mono = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}
