//! blkcat - dump byte ranges of local files through the block reader

mod dump;

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use blockstream::{BlockBufferedReader, IoSource, DEFAULT_BLOCK_SIZE};
use clap::Parser;
use handlecache::{BoundedCache, CacheBounds};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::dump::{copy_range, HexWriter};

type OpenSource = Mutex<IoSource<File>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to read (a path may repeat; its open handle is reused)
    #[arg(required = true)]
    files: Vec<String>,

    /// Byte offset to start at
    #[arg(short, long, default_value_t = 0)]
    offset: u64,

    /// Number of bytes to copy (default: to end of file)
    #[arg(short, long)]
    length: Option<u64>,

    /// Block size in bytes (0 disables buffering)
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Maximum number of open file handles kept
    #[arg(long, default_value_t = 100)]
    max_open: u32,

    /// Handles kept after an eviction pass (default: 80% of --max-open)
    #[arg(long)]
    min_open: Option<u32>,

    /// Print a hex dump instead of raw bytes
    #[arg(long)]
    hex: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let bounds = match args.min_open {
        Some(min) => CacheBounds::new(min, args.max_open),
        None => CacheBounds::with_max_items(args.max_open),
    };
    info!(
        block_size = args.block_size,
        max_open = bounds.max_items,
        min_open = bounds.min_items,
        "starting blkcat"
    );

    let handles: BoundedCache<OpenSource> = BoundedCache::with_bounds(bounds);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for path in &args.files {
        let handle = open_cached(&handles, path)?;
        let copied = dump_file(&handle, &args, &mut out)
            .with_context(|| format!("Failed to read {}", path))?;
        debug!(path = %path, copied, "file done");
    }
    out.flush()?;

    let stats = handles.stats();
    info!(
        hits = stats.hits(),
        misses = stats.misses(),
        shrinks = stats.shrinks(),
        evictions = stats.evictions(),
        "handle cache"
    );
    Ok(())
}

fn open_cached(handles: &BoundedCache<OpenSource>, path: &str) -> Result<Arc<OpenSource>> {
    handles
        .get_or_try_insert_with(path, || {
            debug!(path = %path, "opening");
            File::open(path).map(|file| Mutex::new(IoSource::new(file)))
        })
        .with_context(|| format!("Failed to open {}", path))
}

fn dump_file(handle: &OpenSource, args: &Args, out: &mut dyn Write) -> Result<u64> {
    let mut source = handle.lock();
    let mut reader = BlockBufferedReader::new(&mut *source, args.block_size);
    reader
        .seek_absolute(args.offset)
        .with_context(|| format!("Failed to seek to {}", args.offset))?;

    if args.hex {
        let mut hex = HexWriter::new(out, args.offset);
        let copied = copy_range(&mut reader, args.length, &mut hex)?;
        hex.finish()?;
        Ok(copied)
    } else {
        Ok(copy_range(&mut reader, args.length, out)?)
    }
}
