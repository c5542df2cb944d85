use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use akpk::archive::Archive;
use akpk::crypto::signed::RsaDigestDecryptor;
use akpk::io_stream::read_name_list;
use akpk::DigestDecryptor;
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "akpk", about = "Inspect AKPK resource packages")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Public key for packages with a signed directory.
#[derive(Args)]
struct KeyArgs {
    /// Modulus as little-endian hex
    #[arg(long, requires = "rsa_exponent")]
    rsa_modulus: Option<String>,
    /// Exponent as little-endian hex
    #[arg(long, requires = "rsa_modulus")]
    rsa_exponent: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the resource directory
    List {
        input: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Name list file: `<hash> <path>` per line
        #[arg(short, long)]
        names: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Show header metadata
    Info {
        input: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Decode one resource by name hash
    Dump {
        input: PathBuf,
        /// Name hash in hex
        hash: String,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Decode every resource into a directory
    Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long)]
        names: Option<PathBuf>,
        #[command(flatten)]
        key: KeyArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json, names, key } => {
            let names = load_names(names.as_deref())?;
            let mut ar = open_archive(&input, &key)?;
            let list = ar.list(&names)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                println!("Package: {}", input.display());
                println!("{:<16} {:>12} {:>12} {:<8} {:<6}  Name",
                         "Hash", "Size", "Stored", "Codec", "Crypto");
                for r in &list {
                    println!("{:<16} {:>12} {:>12} {:<8} {:<6}  {}",
                        r.hash, r.uncompressed_size, r.compressed_size,
                        r.compression.name(), r.crypto.code(), r.name);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, key } => {
            let ar = open_archive(&input, &key)?;
            let pkg = ar.package().ok_or("package is not open for reading")?;

            let stored: i64 = pkg.resources.iter().map(|r| r.compressed_size).sum();
            let size:   i64 = pkg.resources.iter().map(|r| r.uncompressed_size).sum();

            println!("── AKPK Package ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Byte order     {}", pkg.endian.name());
            println!("  Flags          {:#06x}", pkg.file_flags().bits());
            println!("  Obfuscation    {}", pkg.obfuscation.name());
            println!("  Header size    {} B", pkg.header_size());
            println!("  Resources      {}", pkg.resources.len());
            println!("  Stored bytes   {stored}");
            println!("  Decoded bytes  {size}");
            if let Some(v) = &pkg.version {
                println!("  Version info   tag={:#010x} type={} version={}", v.tag, v.type_code, v.version);
            }
            if let Some(ext) = &pkg.extension {
                println!("  Extension      {:#010x}", ext.0);
            }
            if let Some(table) = &pkg.block_table {
                println!("  Block table    {} blocks of {} B", table.blocks.len(), table.block_size);
            }
            if let Some(material) = &pkg.key_material {
                println!("  Key material   {}", hex::encode(material));
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, hash, output, key } => {
            let name_hash = parse_hash(&hash)?;
            let mut ar = open_archive(&input, &key)?;
            ar.extract_resource(name_hash, &output)?;
            println!("{name_hash:016X} → {}", output.display());
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, names, key } => {
            let names = load_names(names.as_deref())?;
            let mut ar = open_archive(&input, &key)?;
            let written = ar.extract_all(&output_dir, &names)?;
            info!(count = written.len(), "extracted resources");
            println!("Extracted {} resource(s) to {}", written.len(), output_dir.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn open_archive(path: &Path, key: &KeyArgs) -> Result<Archive, Box<dyn std::error::Error>> {
    let decryptor = match (&key.rsa_modulus, &key.rsa_exponent) {
        (Some(modulus), Some(exponent)) => {
            Some(RsaDigestDecryptor::new(&hex::decode(modulus)?, &hex::decode(exponent)?)?)
        }
        _ => None,
    };
    let decryptor = decryptor.as_ref().map(|d| d as &dyn DigestDecryptor);
    Ok(Archive::open_with_decryptor(path, decryptor)?)
}

fn load_names(path: Option<&Path>) -> std::io::Result<HashMap<u64, String>> {
    match path {
        Some(path) => read_name_list(BufReader::new(File::open(path)?)),
        None       => Ok(HashMap::new()),
    }
}

fn parse_hash(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}
