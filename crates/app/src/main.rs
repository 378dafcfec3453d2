use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;
use utu_core::{
    codec, engine, AppConfig, BreakpointPartial, DecodeOptions, OscillatorBank, PartialData,
    Source, Synthesizer, UtuError,
};

fn main() -> utu_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Synth {
            partials,
            output,
            sample_rate,
        } => run_synth(&config, &partials, &output, sample_rate),
        Commands::Inspect { partials } => run_inspect(&config, &partials),
        Commands::Validate { partials, lenient } => run_validate(&config, &partials, lenient),
        Commands::Lift {
            breakpoints,
            output,
            source,
            description,
        } => run_lift(&breakpoints, &output, source.as_deref(), description),
        Commands::Lower { partials, output } => run_lower(&config, &partials, &output),
        Commands::Fingerprint { audio } => {
            println!("{}", fingerprint_file(&audio)?);
            Ok(())
        }
    }
}

fn run_synth(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    sample_rate: Option<u32>,
) -> utu_core::Result<()> {
    tracing::info!(?input, ?output, "synthesizing partials");

    let data = codec::read_file(input, config.codec.decode_options())?;
    let mut synthesis = config.synthesis.clone();
    if let Some(rate) = sample_rate {
        synthesis.sample_rate = rate;
    }

    let mut bank = OscillatorBank::new(&synthesis)?;
    let samples = engine::render(&mut bank, &data).map_err(|err| err.in_file(input))?;

    let peak = samples.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    if peak > 1.0 {
        tracing::warn!(peak, "rendered signal exceeds full scale");
    }

    write_wav(output, &samples, bank.sample_rate())?;
    tracing::info!(samples = samples.len(), "wrote {}", output.display());
    Ok(())
}

fn run_inspect(config: &AppConfig, input: &Path) -> utu_core::Result<()> {
    let data = codec::read_file(input, config.codec.decode_options())?;
    print!("{}", describe(&data));
    Ok(())
}

fn run_validate(config: &AppConfig, input: &Path, lenient: bool) -> utu_core::Result<()> {
    let options = if lenient {
        DecodeOptions::lenient()
    } else {
        config.codec.decode_options()
    };

    let data = codec::read_file(input, options)?;
    let lowered = utu_core::to_breakpoints(&data).map_err(|err| err.in_file(input))?;

    for (index, partial) in data.partials().iter().enumerate() {
        if partial.breakpoint_count().is_none() {
            tracing::warn!(
                index,
                kept = lowered[index].breakpoints.len(),
                "partial has envelopes of unequal length"
            );
        }
    }

    println!("{}: ok ({} partials)", input.display(), data.len());
    Ok(())
}

fn run_lift(
    input: &Path,
    output: &Path,
    source: Option<&Path>,
    description: Option<String>,
) -> utu_core::Result<()> {
    let text = std::fs::read_to_string(input).map_err(|err| UtuError::from(err).in_file(input))?;
    let partials: Vec<BreakpointPartial> =
        serde_json::from_str(&text).map_err(|err| UtuError::from(err).in_file(input))?;

    let mut data = utu_core::to_canonical(&partials)?;
    if let Some(path) = source {
        let fingerprint = fingerprint_file(path)?;
        let source = Source::new(path.display().to_string()).with_fingerprint(fingerprint);
        data = data.with_source(source);
    }
    if let Some(description) = description {
        data = data.with_description(description);
    }

    codec::write_file(output, &data)?;
    tracing::info!(partials = data.len(), "wrote {}", output.display());
    Ok(())
}

fn run_lower(config: &AppConfig, input: &Path, output: &Path) -> utu_core::Result<()> {
    let data = codec::read_file(input, config.codec.decode_options())?;
    let partials = utu_core::to_breakpoints(&data).map_err(|err| err.in_file(input))?;

    let file = File::create(output).map_err(|err| UtuError::from(err).in_file(output))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &partials)
        .map_err(|err| UtuError::from(err).in_file(output))?;
    writer
        .flush()
        .map_err(|err| UtuError::from(err).in_file(output))?;
    tracing::info!(partials = partials.len(), "wrote {}", output.display());
    Ok(())
}

fn describe(data: &PartialData) -> String {
    let mut text = String::new();
    if let Some(description) = data.description() {
        text.push_str(&format!("description: {description}\n"));
    }
    if let Some(source) = data.source() {
        text.push_str(&format!("source: {}\n", source.location));
        if let Some(fingerprint) = &source.fingerprint {
            text.push_str(&format!("fingerprint: {fingerprint}\n"));
        }
    }
    text.push_str(&format!("parameters: {}\n", data.parameters().join(", ")));
    text.push_str(&format!("partials: {}\n", data.len()));

    let breakpoints: usize = data
        .partials()
        .iter()
        .map(|partial| partial.envelopes.values().map(Vec::len).min().unwrap_or(0))
        .sum();
    text.push_str(&format!("breakpoints: {breakpoints}\n"));

    let times = data
        .partials()
        .iter()
        .filter_map(|partial| partial.envelope(utu_core::partial::TIME))
        .flatten()
        .copied();
    let span = times.fold(None, |span: Option<(f64, f64)>, t| match span {
        Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        None => Some((t, t)),
    });
    if let Some((start, end)) = span {
        text.push_str(&format!("time: {start:.3}s .. {end:.3}s\n"));
    }
    text
}

fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) -> utu_core::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let result = hound::WavWriter::create(path, spec).and_then(|mut writer| {
        for sample in samples {
            writer.write_sample(*sample as f32)?;
        }
        writer.finalize()
    });
    result.map_err(|err| wav_error(err).in_file(path))
}

fn wav_error(err: hound::Error) -> UtuError {
    match err {
        hound::Error::IoError(err) => UtuError::Io(err),
        other => UtuError::msg(other.to_string()),
    }
}

/// SHA-256 of the file contents as lowercase hex.
fn fingerprint_file(path: &Path) -> utu_core::Result<String> {
    let mut file = File::open(path).map_err(|err| UtuError::from(err).in_file(path))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|err| UtuError::from(err).in_file(path))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Spectral partial data tools", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a partial document to a WAV file.
    Synth {
        partials: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Overrides the configured sample rate.
        #[arg(long)]
        sample_rate: Option<u32>,
    },
    /// Print a summary of a partial document.
    Inspect { partials: PathBuf },
    /// Check that a document decodes and lowers to breakpoints.
    Validate {
        partials: PathBuf,
        /// Skip checking partials against the declared parameters.
        #[arg(long)]
        lenient: bool,
    },
    /// Build a partial document from a JSON list of breakpoint partials.
    Lift {
        breakpoints: PathBuf,
        output: PathBuf,
        /// Audio file the breakpoints were analysed from.
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Write the breakpoint partials of a document as JSON.
    Lower { partials: PathBuf, output: PathBuf },
    /// Print the SHA-256 fingerprint of a file.
    Fingerprint { audio: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use utu_core::Breakpoint;

    #[test]
    fn fingerprint_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(
            fingerprint_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn writes_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &[0.0, 0.5, -0.5], 8_000).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn describes_dataset() {
        let data = utu_core::to_canonical(&[BreakpointPartial::new(vec![
            Breakpoint::new(0.25, 440.0, 0.5, 0.0, 0.0),
            Breakpoint::new(0.5, 441.0, 0.4, 0.0, 0.1),
        ])])
        .unwrap()
        .with_description("a4");

        let text = describe(&data);
        assert!(text.contains("description: a4"));
        assert!(text.contains("partials: 1"));
        assert!(text.contains("breakpoints: 2"));
        assert!(text.contains("time: 0.250s .. 0.500s"));
    }
}
