//! Packed tune / frame stream to JSON converter

use clap::Parser;
use polytune::tune::{load_file, TuneJson};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tune2json")]
#[command(version = "0.1.0")]
#[command(about = "Dump packed tunes and frame streams as JSON", long_about = None)]
struct Args {
    /// Input packed tune or frame stream (optionally gzipped)
    input: PathBuf,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let file = load_file(&args.input)?;
    let tune_json = TuneJson::new(&file);

    let json_string = if args.compact {
        serde_json::to_string(&tune_json)?
    } else {
        serde_json::to_string_pretty(&tune_json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}
