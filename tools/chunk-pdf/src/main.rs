use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pdf_chunker::writer::write_chunks_json;
use pdf_chunker::{Chunk, ChunkError, ChunkOptions, HierarchicalChunker};

fn print_usage() {
    eprintln!(
        "Usage:\n\
         chunk-pdf -i INPUT.pdf [-o OUTPUT.json] [options]\n\
         \n\
         Options:\n\
           -i, --input PATH        PDF input (required)\n\
           -o, --output PATH       output file (default: <stem>_chunks.json)\n\
           --max-chunk-size N      hard upper bound in tokens (default 512)\n\
           --min-chunk-size N      soft lower bound in tokens (default 150)\n\
           --overlap N             overlap excerpt size in tokens (default 0)\n\
           --page-limit N          cap pages processed, 0 = no limit (default 0)\n\
           --threads N             worker threads, 0 = auto (default 0)\n\
           -v, --verbose           debug logging\n\
           -q, --quiet             errors only, no analysis\n\
           --no-analyze            skip the chunk distribution analysis\n\
           -h, --help              show this help\n\
           --version               show version\n"
    );
}

struct CliArgs {
    input: PathBuf,
    output: PathBuf,
    max_tokens: usize,
    min_tokens: usize,
    overlap_tokens: usize,
    page_limit: usize,
    threads: usize,
    verbose: bool,
    quiet: bool,
    analyze: bool,
}

enum Parsed {
    Run(Box<CliArgs>),
    Help,
    Version,
}

fn parse_number(flag: &str, value: Option<&String>) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a number"))?;
    value
        .parse::<usize>()
        .map_err(|_| format!("{flag} expects a non-negative integer, got `{value}`"))
}

fn parse_args(args: &[String]) -> Result<Parsed, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut max_tokens = 512usize;
    let mut min_tokens = 150usize;
    let mut overlap_tokens = 0usize;
    let mut page_limit = 0usize;
    let mut threads = 0usize;
    let mut verbose = false;
    let mut quiet = false;
    let mut analyze = true;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "--version" => return Ok(Parsed::Version),
            "-i" | "--input" => {
                let value = args.get(i + 1).ok_or("--input requires a path")?;
                input = Some(PathBuf::from(value));
                i += 2;
            }
            "-o" | "--output" => {
                let value = args.get(i + 1).ok_or("--output requires a path")?;
                output = Some(PathBuf::from(value));
                i += 2;
            }
            "--max-chunk-size" => {
                max_tokens = parse_number("--max-chunk-size", args.get(i + 1))?;
                i += 2;
            }
            "--min-chunk-size" => {
                min_tokens = parse_number("--min-chunk-size", args.get(i + 1))?;
                i += 2;
            }
            "--overlap" => {
                overlap_tokens = parse_number("--overlap", args.get(i + 1))?;
                i += 2;
            }
            "--page-limit" => {
                page_limit = parse_number("--page-limit", args.get(i + 1))?;
                i += 2;
            }
            "--threads" => {
                threads = parse_number("--threads", args.get(i + 1))?;
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-q" | "--quiet" => {
                quiet = true;
                i += 1;
            }
            "--no-analyze" => {
                analyze = false;
                i += 1;
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }

    let input = input.ok_or("missing required --input")?;
    let output = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        input.with_file_name(format!("{stem}_chunks.json"))
    });

    Ok(Parsed::Run(Box::new(CliArgs {
        input,
        output,
        max_tokens,
        min_tokens,
        overlap_tokens,
        page_limit,
        threads,
        verbose,
        quiet,
        analyze,
    })))
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn analyze_chunk_distribution(chunks: &[Chunk], min_tokens: usize) {
    if chunks.is_empty() {
        println!("\nNo chunks created");
        return;
    }

    let mut token_counts: Vec<usize> = chunks.iter().map(|c| c.tokens).collect();
    token_counts.sort_unstable();

    let min = token_counts[0];
    let max = token_counts[token_counts.len() - 1];
    let avg = token_counts.iter().sum::<usize>() / token_counts.len();

    println!("\n=== Final Chunk Distribution Analysis ===");
    println!("Total chunks: {}", chunks.len());
    println!("Min tokens: {min}");
    println!("Max tokens: {max}");
    println!("Average tokens: {avg}");

    println!("\nQuintiles:");
    for p in [20usize, 40, 60, 80] {
        let idx = (token_counts.len() - 1) * p / 100;
        println!("  {p}th percentile: {} tokens", token_counts[idx]);
    }

    let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
    for &tokens in &token_counts {
        let range = match tokens {
            0..=50 => "1-50",
            51..=100 => "51-100",
            101..=200 => "101-200",
            201..=300 => "201-300",
            301..=400 => "301-400",
            401..=500 => "401-500",
            501..=512 => "501-512",
            _ => "513+",
        };
        *distribution.entry(range).or_default() += 1;
    }

    println!("\nToken Range Distribution:");
    for (range, count) in &distribution {
        let percentage = (*count as f64 * 100.0) / chunks.len() as f64;
        println!("  {range} tokens: {count} chunks ({percentage:.1}%)");
    }

    let small = token_counts.iter().filter(|&&t| t < min_tokens).count();
    if small > 0 {
        println!("\nWARNING: {small} chunks are below the minimum threshold of {min_tokens} tokens");
    } else {
        println!("\nSUCCESS: All chunks meet the minimum threshold of {min_tokens} tokens");
    }
}

// Exit codes: 0 success, 1 invalid argument or processing failure,
// 2 runtime (I/O, unexpected) error.
fn run(args: CliArgs) -> Result<(), (u8, String)> {
    let options = ChunkOptions {
        max_tokens: args.max_tokens,
        min_tokens: args.min_tokens,
        overlap_tokens: args.overlap_tokens,
        thread_count: args.threads,
        ..ChunkOptions::default()
    };

    let chunker =
        HierarchicalChunker::new(options).map_err(|err| (1u8, err.to_string()))?;

    if !args.quiet {
        println!(
            "Processing: {} (max_tokens={}, min_tokens={}, overlap={})",
            args.input.display(),
            args.max_tokens,
            args.min_tokens,
            args.overlap_tokens
        );
        if args.page_limit > 0 {
            println!("Page limit: {}", args.page_limit);
        }
    }

    let result = chunker.chunk_file(&args.input, args.page_limit as i64);
    if let Some(error) = result.error {
        return Err((1, error));
    }

    if args.analyze && !args.quiet {
        analyze_chunk_distribution(&result.chunks, args.min_tokens);
    }

    write_chunks_json(&result.chunks, &args.input, &args.output).map_err(|err| match err {
        ChunkError::InvalidArgument { .. } => (1u8, err.to_string()),
        ChunkError::Io { .. } | ChunkError::Serialize(_) => (2, err.to_string()),
        ChunkError::Parse(_) => (1, err.to_string()),
    })?;

    if !args.quiet {
        println!(
            "\nCreated {} chunks from {} pages in {:.0}ms",
            result.total_chunks, result.total_pages, result.processing_time_ms
        );
        println!("Output: {}", args.output.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match parse_args(&args) {
        Ok(Parsed::Help) => {
            print_usage();
            ExitCode::SUCCESS
        }
        Ok(Parsed::Version) => {
            println!("chunk-pdf {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Ok(Parsed::Run(cli)) => {
            init_logging(cli.verbose, cli.quiet);
            match run(*cli) {
                Ok(()) => ExitCode::SUCCESS,
                Err((code, message)) => {
                    eprintln!("Error: {message}");
                    ExitCode::from(code)
                }
            }
        }
        Err(message) => {
            eprintln!("Error: {message}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}
