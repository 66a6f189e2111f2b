//! Decode a general-writer stream and print one JSON line per event.
//!
//! ```text
//! cargo run --example gw-write -- --packed | cargo run --example gw-dump
//! cargo run --example gw-dump -- stream.gw
//! ```
//!
//! Set `RUST_LOG=general_writer=trace` to see every decoded event.

use std::env;
use std::io::{self, BufWriter};

use general_writer::handler::JsonDumper;
use general_writer::reader::{read_stream, ReaderConfig};
use general_writer::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut dumper = JsonDumper::new(BufWriter::new(stdout.lock()));
    let config = ReaderConfig::default();

    let summary = match env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            read_stream(file, &mut dumper, &config).await?
        }
        None => read_stream(tokio::io::stdin(), &mut dumper, &config).await?,
    };

    tracing::info!(
        version = summary.header.version,
        packed = summary.header.packing.is_packed(),
        reversed = summary.header.reversed,
        events = summary.events,
        bytes = summary.bytes,
        closed = summary.closed,
        "stream decoded"
    );
    Ok(())
}
