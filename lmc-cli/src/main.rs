//! lmc CLI - command-line wrapper for the lazy MessagePack container
//!
//! Subcommands:
//! - pack: JSON document → .lmc blob
//! - cat: print a blob (or a path into it) as JSON
//! - inspect: show header geometry and TOC shape
//! - combine: splice packed blobs into one archive

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lmc_format::{Config, TocChildren, TocNode};
use lmc_io::{combine_with_config, FileRef, LazyReader, Packer};
use rmpv::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lmc")]
#[command(about = "Lazy MessagePack container tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a JSON document into a container blob
    Pack {
        /// Input JSON file
        input: PathBuf,
        /// Output blob
        #[arg(short, long)]
        output: PathBuf,
        /// Containers encoded below this size stay opaque
        #[arg(long)]
        small_obj_threshold: Option<usize>,
        /// Elements at or below this size may join grouped blocks
        #[arg(long)]
        trivial_size: Option<usize>,
    },
    /// Print a blob, or a path into it, as JSON
    Cat {
        /// Input blob
        input: PathBuf,
        /// Slash-separated path below the root
        path: Option<String>,
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
    /// Show header geometry and TOC shape
    Inspect {
        /// Input blob
        input: PathBuf,
    },
    /// Combine packed blobs into one archive
    Combine {
        /// Output blob
        #[arg(short, long)]
        output: PathBuf,
        /// Inputs, either `path` or `name=path`; use all of one form
        inputs: Vec<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Pack {
            input,
            output,
            small_obj_threshold,
            trivial_size,
        } => {
            let mut config = Config::default();
            if let Some(threshold) = small_obj_threshold {
                config = config.with_small_obj_threshold(threshold);
            }
            if let Some(size) = trivial_size {
                config = config.with_trivial_size(size);
            }

            let document: serde_json::Value =
                serde_json::from_reader(BufReader::new(File::open(&input)?))?;
            let value = json_to_value(document);

            let mut packer = Packer::with_config(File::create(&output)?, config)?;
            packer.write(&value)?;
            packer.finish()?;
            eprintln!("packed {} -> {}", input.display(), output.display());
        }
        Commands::Cat {
            input,
            path,
            pretty,
        } => {
            let reader = LazyReader::open(&input)?;
            let resolved = match path.as_deref() {
                Some(path) => reader.read_path(path)?,
                None => reader.read()?,
            };
            let json = value_to_json(&resolved.to_plain()?)?;
            if pretty {
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("{json}");
            }
        }
        Commands::Inspect { input } => {
            let reader = LazyReader::open(&input)?;
            println!("payload bytes: {}", reader.payload_len());
            let mut summary = TocSummary::default();
            summary.visit(reader.toc());
            println!("root: {}", shape_name(reader.toc()));
            println!("toc nodes: {}", summary.nodes);
            println!("  keyed: {}", summary.keyed);
            println!("  positional: {}", summary.positional);
            println!("  grouped: {} ({} blocks)", summary.grouped, summary.blocks);
            println!("  opaque: {}", summary.leaves);
        }
        Commands::Combine { output, inputs } => {
            let refs = inputs
                .iter()
                .map(|spec| match spec.split_once('=') {
                    Some((name, path)) => FileRef::named(path, name),
                    None => FileRef::new(spec),
                })
                .collect::<Vec<_>>();
            combine_with_config(&output, &refs, Config::default())?;
            eprintln!("combined {} inputs -> {}", refs.len(), output.display());
        }
    }
    Ok(())
}

#[derive(Default)]
struct TocSummary {
    nodes: usize,
    keyed: usize,
    positional: usize,
    grouped: usize,
    blocks: usize,
    leaves: usize,
}

impl TocSummary {
    fn visit(&mut self, node: &TocNode) {
        self.nodes += 1;
        match &node.children {
            None => self.leaves += 1,
            Some(TocChildren::Keyed(keyed)) => {
                self.keyed += 1;
                for (_, child) in keyed.iter() {
                    self.visit(child);
                }
            }
            Some(TocChildren::Positional(children)) => {
                self.positional += 1;
                for child in children {
                    self.visit(child);
                }
            }
            Some(TocChildren::Grouped(blocks)) => {
                self.grouped += 1;
                self.blocks += blocks.len();
            }
        }
    }
}

fn shape_name(node: &TocNode) -> &'static str {
    match &node.children {
        None => "opaque",
        Some(TocChildren::Keyed(_)) => "keyed",
        Some(TocChildren::Positional(_)) => "positional",
        Some(TocChildren::Grouped(_)) => "grouped",
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(flag) => Value::Boolean(flag),
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::from(int)
            } else if let Some(int) = number.as_u64() {
                Value::from(int)
            } else {
                Value::F64(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(text) => Value::from(text),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (Value::from(key), json_to_value(value)))
                .collect(),
        ),
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, Box<dyn Error>> {
    Ok(match value {
        Value::Nil => serde_json::Value::Null,
        Value::Boolean(flag) => serde_json::Value::Bool(*flag),
        Value::Integer(int) => {
            if let Some(signed) = int.as_i64() {
                serde_json::Value::from(signed)
            } else if let Some(unsigned) = int.as_u64() {
                serde_json::Value::from(unsigned)
            } else {
                return Err("integer outside the JSON range".into());
            }
        }
        Value::F32(float) => serde_json::Value::from(*float as f64),
        Value::F64(float) => serde_json::Value::from(*float),
        Value::String(text) => serde_json::Value::String(
            text.as_str().ok_or("non-UTF-8 string")?.to_string(),
        ),
        Value::Binary(bytes) => serde_json::Value::Array(
            bytes.iter().map(|&b| serde_json::Value::from(b)).collect(),
        ),
        Value::Array(items) => serde_json::Value::Array(
            items
                .iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, entry) in entries {
                let key = key.as_str().ok_or("non-string map key")?;
                object.insert(key.to_string(), value_to_json(entry)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Ext(code, _) => {
            return Err(format!("ext value (type {code}) has no JSON form").into())
        }
    })
}
