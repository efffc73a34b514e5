use clap::{Parser, Subcommand};
use log::info;
use polytune::compiler::channel::FrameMap;
use polytune::sequencer::source::{FrameSource, SliceSource};
use polytune::synth::oscillator::{freq_to_period, Waveform};
use polytune::synth::DEFAULT_SAMPLE_RATE;
use polytune::tune::reader::record_source;
use polytune::tune::{self, StreamHeader, TuneFile, TuneHeader};
use polytune::{Frame, PackedTune, Player, StreamCompiler, SynthConfig};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "polytune")]
#[command(version = "0.1.0")]
#[command(about = "Polyphonic tune compiler and player", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a JSON frame map into a packed tune
    Compile {
        /// Output packed tune
        output: PathBuf,

        /// Input frame map (reads from stdin if not specified)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Also write the uncompressed frame stream
        #[arg(long)]
        stream: Option<PathBuf>,

        /// Gzip the output files
        #[arg(short, long)]
        gzip: bool,

        /// Sample rate in Hz
        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        rate: u16,

        /// Waveform used while simulating playback
        #[arg(short, long, default_value_t = Waveform::Square)]
        waveform: Waveform,
    },

    /// Render a packed tune or frame stream to a WAV file
    Play {
        /// Packed tune or frame stream, optionally gzipped
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Voices of the runtime build (defaults to the file's)
        #[arg(long)]
        voices: Option<usize>,

        /// Sample rate of the runtime build (defaults to the file's)
        #[arg(short, long)]
        rate: Option<u16>,

        #[arg(short, long, default_value_t = Waveform::Square)]
        waveform: Waveform,

        /// Voices to leave out of the mix
        #[arg(long, value_delimiter = ',')]
        mute: Vec<usize>,

        /// Voices to switch off entirely; no frames are dispatched to them
        #[arg(long, value_delimiter = ',')]
        disable: Vec<usize>,
    },

    /// Render a single note to a WAV file
    Voice {
        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Note frequency in Hz
        #[arg(short, long)]
        frequency: u32,

        #[arg(short, long, default_value_t = 100)]
        amplitude: i8,

        /// Samples per envelope time unit
        #[arg(short, long, default_value_t = 100)]
        time_scale: u16,

        /// Time unit at which the release begins
        #[arg(long, default_value_t = 64)]
        release_start: u8,

        #[arg(short, long, default_value_t = Waveform::Square)]
        waveform: Waveform,

        #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
        rate: u16,
    },
}

fn main() -> Result<(), polytune::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Compile {
            output,
            input,
            stream,
            gzip,
            rate,
            waveform,
        } => compile(input.as_deref(), &output, stream.as_deref(), gzip, rate, waveform),
        Command::Play {
            input,
            output,
            voices,
            rate,
            waveform,
            mute,
            disable,
        } => play(&input, &output, voices, rate, waveform, &mute, &disable),
        Command::Voice {
            output,
            frequency,
            amplitude,
            time_scale,
            release_start,
            waveform,
            rate,
        } => {
            let period = freq_to_period(rate as u32, frequency)?;
            let frame = Frame::new(time_scale, release_start, amplitude, period)?;
            let config = SynthConfig::builder()
                .sample_rate(rate)
                .voices(1)
                .waveform(waveform)
                .build()?;
            let frames = [frame];
            render(&config, SliceSource::new(&frames), &[], &[], &output)
        }
    }
}

fn compile(
    input: Option<&Path>,
    output: &Path,
    stream_path: Option<&Path>,
    gzip: bool,
    rate: u16,
    waveform: Waveform,
) -> Result<(), polytune::Error> {
    let map = match input {
        Some(path) => FrameMap::from_json(BufReader::new(File::open(path)?))?,
        None => FrameMap::from_json(io::stdin().lock())?,
    };
    let config = SynthConfig::builder()
        .sample_rate(rate)
        .waveform(waveform)
        .build()?;

    let stream = StreamCompiler::new(config).compile(&map)?;
    let voice_count = stream.voice_count as u8;
    let packed = PackedTune::encode(&stream.frames)?;
    let header = TuneHeader::new(rate, voice_count, stream.clip_count > 0);
    tune::save_packed(output, &header, &packed, gzip)?;
    info!("wrote {}", output.display());

    if let Some(path) = stream_path {
        tune::save_stream(path, &StreamHeader::new(rate, voice_count), &stream.frames, gzip)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn play(
    input: &Path,
    output: &Path,
    voices: Option<usize>,
    rate: Option<u16>,
    waveform: Waveform,
    mute: &[usize],
    disable: &[usize],
) -> Result<(), polytune::Error> {
    let file = tune::load_file(input)?;
    let clip_check = match &file {
        TuneFile::Packed { header, .. } => header.clip_check,
        TuneFile::Stream { .. } => true,
    };
    let config = SynthConfig::builder()
        .sample_rate(rate.unwrap_or(file.sample_rate()))
        .voices(voices.unwrap_or(file.voice_count() as usize))
        .waveform(waveform)
        .clip_check(clip_check)
        .build()?;

    match &file {
        TuneFile::Packed { header, tune } => {
            header.check(&config)?;
            render(&config, tune.decoder(), mute, disable, output)
        }
        TuneFile::Stream { header, records } => {
            header.check(&config)?;
            render(&config, record_source(records), mute, disable, output)
        }
    }
}

/// Play a frame source to completion into a 16-bit mono WAV file
fn render<S: FrameSource>(
    config: &SynthConfig,
    source: S,
    mute: &[usize],
    disable: &[usize],
    output: &Path,
) -> Result<(), polytune::Error> {
    let mut player = Player::new(config, source);
    for &voice in mute {
        player.synth_mut().set_muted(voice, true);
    }
    for &voice in disable {
        player.synth_mut().set_enabled(voice, false);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate() as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec)?;
    for sample in player.by_ref() {
        writer.write_sample((sample as i16) << 8)?;
    }
    writer.finalize()?;

    info!(
        "rendered {} samples ({:.1} s), {} frames, clip count {}",
        player.ticks(),
        player.ticks() as f64 / config.sample_rate() as f64,
        player.sequencer().dispatched(),
        player.clip_count()
    );
    Ok(())
}
