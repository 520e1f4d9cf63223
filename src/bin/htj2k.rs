//! htj2k CLI - encode, decode and inspect single HTJ2K code-blocks.
//!
//! Coefficients are exchanged as raw little-endian `i32` values in raster
//! order; coded blocks are the concatenated cleanup and refinement segments.

use clap::{ArgAction, Parser, Subcommand};
use htj2k_rs::{
    CodeBlockParams, CodeTables, CodedBlock, CodingPasses, HTBlockDecoder, HTBlockEncoder, HtError, HtSample,
    SegmentLengths, inspect_cleanup,
};
use log::{LevelFilter, Log, Metadata, Record};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// HTJ2K (ISO/IEC 15444-15) code-block entropy codec
#[derive(Parser)]
#[command(name = "htj2k")]
#[command(author = "htj2k-rs contributors")]
#[command(version)]
#[command(about = "Encode, decode and inspect HTJ2K code-blocks", long_about = None)]
#[command(after_help = "EXAMPLES:
    htj2k encode -i coeffs.raw -o block.htc -w 64 -H 64 --k-max 12
    htj2k decode -i block.htc -o coeffs.raw -w 64 -H 64 --k-max 12
    htj2k encode -i coeffs.raw -o block.htc -w 32 -H 16 --k-max 12 --passes 3
    htj2k encode -i coeffs.raw -o block.htc -w 64 -H 64 --vlc-tables ./t814
    htj2k info -i block.htc")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding table0.h (first quad row) and table1.h (later rows)
    /// with the CxtVLC codewords to use instead of the built-in code
    #[arg(long, global = true)]
    vlc_tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by encode and decode.
#[derive(clap::Args, Clone, Copy)]
struct BlockArgs {
    /// Block width in samples
    #[arg(short, long)]
    width: u32,

    /// Block height in samples
    #[arg(short = 'H', long)]
    height: u32,

    /// Samples between vertically adjacent samples (defaults to the width)
    #[arg(short, long)]
    stride: Option<usize>,

    /// Magnitude bits of the coefficients
    #[arg(short, long, default_value = "16")]
    k_max: u32,

    /// Coding passes: 1 (cleanup), 2 (+SigProp) or 3 (+MagRef)
    #[arg(short, long, default_value = "1")]
    passes: u32,

    /// Stripe-causal significance propagation
    #[arg(long)]
    stripe_causal: bool,

    /// Use 64-bit sample words
    #[arg(long)]
    wide: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw coefficients into a coded block
    #[command(visible_alias = "e")]
    Encode {
        /// Raw little-endian i32 coefficients
        #[arg(short, long)]
        input: PathBuf,

        /// Coded block output
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        block: BlockArgs,
    },

    /// Decode a coded block into raw coefficients
    #[command(visible_alias = "d")]
    Decode {
        /// Coded block input
        #[arg(short, long)]
        input: PathBuf,

        /// Raw little-endian i32 coefficients output
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        block: BlockArgs,

        /// Cleanup segment length (defaults to the file size minus the refinement length)
        #[arg(long)]
        cleanup_length: Option<usize>,

        /// Refinement segment length
        #[arg(long, default_value = "0")]
        refinement_length: usize,
    },

    /// Show the segment layout of a coded block
    #[command(visible_alias = "i")]
    Info {
        /// Coded block input
        #[arg(short, long)]
        input: PathBuf,

        /// Cleanup segment length (defaults to the file size minus the refinement length)
        #[arg(long)]
        cleanup_length: Option<usize>,

        /// Refinement segment length
        #[arg(long, default_value = "0")]
        refinement_length: usize,
    },

    /// List codec capabilities
    #[command(visible_alias = "l")]
    List,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let tables = match load_tables(cli.vlc_tables.as_deref()) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Encode { input, output, block } => encode_file(&input, &output, block, &tables),
        Commands::Decode {
            input,
            output,
            block,
            cleanup_length,
            refinement_length,
        } => decode_file(&input, &output, block, cleanup_length, refinement_length, &tables),
        Commands::Info {
            input,
            cleanup_length,
            refinement_length,
        } => show_info(&input, cleanup_length, refinement_length),
        Commands::List => list_capabilities(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_tables(dir: Option<&Path>) -> Result<Cow<'static, CodeTables>, Box<dyn std::error::Error>> {
    let Some(dir) = dir else {
        return Ok(Cow::Borrowed(CodeTables::get()));
    };
    let initial = fs::read_to_string(dir.join("table0.h"))?;
    let non_initial = fs::read_to_string(dir.join("table1.h"))?;
    let tables = CodeTables::from_source_text(&initial, &non_initial)
        .map_err(|e| format!("{:?}: {}", dir, e))?;
    log::debug!("Loaded CxtVLC tables from {:?}", dir);
    Ok(Cow::Owned(tables))
}

impl BlockArgs {
    fn params<S: HtSample>(&self) -> Result<CodeBlockParams, HtError> {
        let num_passes = CodingPasses::from_count(self.passes)?;
        let params = CodeBlockParams::for_coefficients::<S>(self.width, self.height, self.k_max, num_passes)?
            .with_stride(self.stride.unwrap_or(self.width as usize))
            .with_stripe_causal(self.stripe_causal);
        params.validate()?;
        Ok(params)
    }
}

fn segment_lengths(file_len: usize, cleanup: Option<usize>, refinement: usize) -> SegmentLengths {
    SegmentLengths {
        cleanup: cleanup.unwrap_or(file_len.saturating_sub(refinement)),
        refinement,
    }
}

fn encode_samples<S: HtSample>(
    coefficients: &[i32],
    block: &BlockArgs,
    tables: &CodeTables,
) -> Result<CodedBlock, HtError> {
    let params = block.params::<S>()?;
    if coefficients.len() < params.required_len() {
        return Err(HtError::InvalidDimensions);
    }
    let samples: Vec<S> = coefficients
        .iter()
        .map(|&c| S::from_coefficient(c as i64, block.k_max))
        .collect();
    HTBlockEncoder::with_tables(tables).encode(&samples, &params)
}

fn decode_samples<S: HtSample>(
    data: &[u8],
    lengths: SegmentLengths,
    block: &BlockArgs,
    tables: &CodeTables,
) -> Result<Vec<i32>, HtError> {
    let params = block.params::<S>()?;
    let mut samples = vec![S::default(); params.required_len()];
    HTBlockDecoder::with_tables(tables).decode(data, lengths, &params, &mut samples)?;
    Ok(samples
        .iter()
        .map(|s| s.to_coefficient(block.k_max).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .collect())
}

fn encode_file(
    input: &PathBuf,
    output: &PathBuf,
    block: BlockArgs,
    tables: &CodeTables,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read(input)?;
    let coefficients: Vec<i32> = raw
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let limit = 1i64.checked_shl(block.k_max).unwrap_or(i64::MAX);
    if let Some(c) = coefficients.iter().find(|&&c| (c as i64).abs() >= limit) {
        return Err(format!("coefficient {} needs more than {} magnitude bits", c, block.k_max).into());
    }

    let coded = if block.wide {
        encode_samples::<u64>(&coefficients, &block, tables)?
    } else {
        encode_samples::<u32>(&coefficients, &block, tables)?
    };
    fs::write(output, &coded.data)?;
    println!(
        "✓ Encoded {}x{} block to {:?}: cleanup-length={} refinement-length={} passes={} missing-msbs={}",
        block.width,
        block.height,
        output,
        coded.lengths.cleanup,
        coded.lengths.refinement,
        coded.num_passes.count(),
        coded.missing_msbs
    );
    if coded.num_passes.count() < block.passes {
        println!("  (refinement passes dropped: nothing to refine)");
    }
    Ok(())
}

fn decode_file(
    input: &PathBuf,
    output: &PathBuf,
    block: BlockArgs,
    cleanup_length: Option<usize>,
    refinement_length: usize,
    tables: &CodeTables,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let lengths = segment_lengths(data.len(), cleanup_length, refinement_length);
    let coefficients = if block.wide {
        decode_samples::<u64>(&data, lengths, &block, tables)?
    } else {
        decode_samples::<u32>(&data, lengths, &block, tables)?
    };
    let raw: Vec<u8> = coefficients.iter().flat_map(|c| c.to_le_bytes()).collect();
    fs::write(output, &raw)?;
    println!(
        "✓ Decoded {}x{} block ({} passes) to {:?}",
        block.width, block.height, block.passes, output
    );
    Ok(())
}

fn show_info(
    input: &PathBuf,
    cleanup_length: Option<usize>,
    refinement_length: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let lengths = segment_lengths(data.len(), cleanup_length, refinement_length);
    let layout = inspect_cleanup(&data, lengths)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("  Cleanup:    {} bytes", lengths.cleanup);
    println!("    MagSgn:   {} bytes", layout.mag_sgn);
    println!("    MEL+VLC:  {} bytes (scup)", layout.mel_vlc);
    println!("  Refinement: {} bytes", layout.refinement);
    let trailing = data.len() - lengths.total();
    if trailing > 0 {
        println!("  Trailing:   {} bytes", trailing);
    }
    Ok(())
}

fn list_capabilities() -> Result<(), Box<dyn std::error::Error>> {
    println!("HTJ2K block coder");
    println!();
    println!("  Standard:   ISO/IEC 15444-15 / ITU-T T.814");
    println!("  Passes:     Cleanup, SigProp, MagRef (1 to 3)");
    println!("  Samples:    32-bit, 64-bit (--wide)");
    println!("  Block size: up to 1024 per side, 4096 samples");
    println!("  Encode:     ✓  Decode: ✓");
    println!();
    Ok(())
}
