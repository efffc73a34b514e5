pub mod codec;
pub mod compiler;
pub mod error;
pub mod sequencer;
pub mod synth;
pub mod tune;

pub use codec::PackedTune;
pub use compiler::{CompiledStream, StreamCompiler};
pub use error::{Error, Result};
pub use sequencer::frame::Frame;
pub use sequencer::{Player, Sequencer};
pub use synth::{PolySynth, SynthConfig};
