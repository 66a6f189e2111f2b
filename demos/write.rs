//! Write a small sample stream to stdout.
//!
//! ```text
//! cargo run --example gw-write -- [--packed] [--big-endian] > stream.gw
//! ```

use std::env;

use bytes::Bytes;
use general_writer::codec::EncoderConfig;
use general_writer::protocol::{
    ByteOrder, ColumnDecl, CreateMode, Event, MemberDecl, MemberKind, MetadataTarget, Packing,
    Progress,
};
use general_writer::writer::{EventSender, WriterConfig};
use general_writer::Result;

const BASES: &[u8] = b"ACGT";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = EncoderConfig::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--packed" => config = config.packing(Packing::Packed),
            "--big-endian" => config = config.byte_order(ByteOrder::Big),
            other => tracing::warn!("ignoring unknown argument {}", other),
        }
    }

    let (mut sender, writer) =
        EventSender::spawn(tokio::io::stdout(), config, WriterConfig::default())?;

    let events = [
        Event::OpenStream,
        Event::SoftwareName {
            name: "gw-write".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        },
        Event::RemotePath("sample.db".into()),
        Event::UseSchema {
            file: "sample.vschema".into(),
            name: "SAMPLE:db".into(),
        },
        Event::NewTable {
            id: 1,
            name: "SEQUENCE".into(),
        },
        Event::NewColumn(ColumnDecl {
            id: 1,
            table_id: 1,
            elem_bits: 8,
            flag_bits: 0,
            name: "READ".into(),
        }),
        Event::NewColumn(ColumnDecl {
            id: 2,
            table_id: 1,
            elem_bits: 32,
            flag_bits: 0,
            name: "READ_LEN".into(),
        }),
        Event::MetadataNode {
            target: MetadataTarget::Database,
            id: 0,
            node: "loader/name".into(),
            value: "gw-write".into(),
        },
        Event::AddMember(MemberDecl {
            kind: MemberKind::Table,
            id: 2,
            db_id: 0,
            member_name: "REFERENCE".into(),
            name: "SAMPLE:ref".into(),
            create_mode: CreateMode::CREATE.with_flags(CreateMode::MD5),
        }),
    ];
    for event in &events {
        sender.send(event).await?;
    }

    let rows = 16u32;
    for row in 0..rows {
        let len = 4 + (row as usize % 8);
        let read: Vec<u8> = (0..len).map(|i| BASES[(i + row as usize) % 4]).collect();
        let read_len = sender.encoder().config().byte_order.u32_bytes(len as u32);

        sender
            .send(&Event::CellData {
                column_id: 1,
                data: Bytes::from(read),
            })
            .await?;
        sender
            .send(&Event::CellData {
                column_id: 2,
                data: Bytes::copy_from_slice(&read_len),
            })
            .await?;
        sender.send(&Event::NextRow { table_id: 1 }).await?;

        if row % 4 == 3 {
            sender
                .send(&Event::Progress(Progress {
                    pid: std::process::id().max(1),
                    name: "gw-write".into(),
                    timestamp: 1,
                    version: 1,
                    percent: ((row + 1) * 100 / rows) as u8,
                }))
                .await?;
        }
    }

    sender.send(&Event::EmptyDefault { column_id: 1 }).await?;
    sender
        .send(&Event::MoveAhead {
            table_id: 1,
            rows: 4,
        })
        .await?;
    sender.send(&Event::LogMessage("sample complete".into())).await?;

    let bytes = sender.encoder().bytes_written();
    sender.finish().await?;
    writer.await.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

    tracing::info!(bytes, rows, "stream written");
    Ok(())
}
