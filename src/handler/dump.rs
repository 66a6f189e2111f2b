//! JSON-lines rendering of a stream.
//!
//! Each sink call becomes one line, for example
//! `{"event":"new-table","id":1,"name":"reads"}`. Cell bytes are hex.

use std::io::Write;

use serde::Serialize;

use super::EventSink;
use crate::error::Result;
use crate::protocol::{ColumnDecl, MemberDecl, MemberKind, MetadataTarget, Progress};

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum Record<'a> {
    OpenStream,
    EndStream,
    #[serde(rename = "errmsg")]
    ErrMsg { message: &'a str },
    #[serde(rename = "logmsg")]
    LogMsg { message: &'a str },
    #[serde(rename = "progmsg")]
    ProgMsg {
        pid: u32,
        name: &'a str,
        timestamp: u32,
        version: u32,
        percent: u8,
    },
    RemotePath { path: &'a str },
    UseSchema { file: &'a str, name: &'a str },
    SoftwareName { name: &'a str, version: &'a str },
    DbMetadataNode { id: u32, node: &'a str, value: &'a str },
    TblMetadataNode { id: u32, node: &'a str, value: &'a str },
    ColMetadataNode { id: u32, node: &'a str, value: &'a str },
    #[serde(rename_all = "kebab-case")]
    AddMbrDb { id: u32, db_id: u32, member_name: &'a str, name: &'a str, mode: &'static str },
    #[serde(rename_all = "kebab-case")]
    AddMbrTbl { id: u32, db_id: u32, member_name: &'a str, name: &'a str, mode: &'static str },
    NewTable { id: u32, name: &'a str },
    #[serde(rename_all = "kebab-case")]
    NewColumn {
        id: u32,
        table_id: u32,
        elem_bits: u32,
        flag_bits: u8,
        name: &'a str,
    },
    #[serde(rename_all = "kebab-case")]
    CellDefault { column_id: u32, size: usize, data: String },
    #[serde(rename_all = "kebab-case")]
    CellData { column_id: u32, size: usize, data: String },
    #[serde(rename_all = "kebab-case")]
    NextRow { table_id: u32 },
    #[serde(rename_all = "kebab-case")]
    MoveAhead { table_id: u32, rows: u64 },
}

/// Sink that writes every operation as a JSON line.
pub struct JsonDumper<W: Write> {
    out: W,
    lines: u64,
}

impl<W: Write> JsonDumper<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Number of lines written so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, record: &Record<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write> EventSink for JsonDumper<W> {
    fn open_stream(&mut self) -> Result<()> {
        self.emit(&Record::OpenStream)
    }

    fn close_stream(&mut self) -> Result<()> {
        self.emit(&Record::EndStream)?;
        self.out.flush()?;
        Ok(())
    }

    fn declare_table(&mut self, id: u32, name: &str) -> Result<()> {
        self.emit(&Record::NewTable { id, name })
    }

    fn declare_column(&mut self, column: &ColumnDecl) -> Result<()> {
        self.emit(&Record::NewColumn {
            id: column.id,
            table_id: column.table_id,
            elem_bits: column.elem_bits,
            flag_bits: column.flag_bits,
            name: &column.name,
        })
    }

    fn set_cell_default(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
        self.emit(&Record::CellDefault {
            column_id,
            size: data.len(),
            data: hex::encode(data),
        })
    }

    fn append_cell(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
        self.emit(&Record::CellData {
            column_id,
            size: data.len(),
            data: hex::encode(data),
        })
    }

    fn advance_row(&mut self, table_id: u32) -> Result<()> {
        self.emit(&Record::NextRow { table_id })
    }

    fn advance_rows(&mut self, table_id: u32, rows: u64) -> Result<()> {
        self.emit(&Record::MoveAhead { table_id, rows })
    }

    fn error_message(&mut self, message: &str) -> Result<()> {
        self.emit(&Record::ErrMsg { message })
    }

    fn log_message(&mut self, message: &str) -> Result<()> {
        self.emit(&Record::LogMsg { message })
    }

    fn progress(&mut self, progress: &Progress) -> Result<()> {
        self.emit(&Record::ProgMsg {
            pid: progress.pid,
            name: &progress.name,
            timestamp: progress.timestamp,
            version: progress.version,
            percent: progress.percent,
        })
    }

    fn remote_path(&mut self, path: &str) -> Result<()> {
        self.emit(&Record::RemotePath { path })
    }

    fn use_schema(&mut self, file: &str, name: &str) -> Result<()> {
        self.emit(&Record::UseSchema { file, name })
    }

    fn software_name(&mut self, name: &str, version: &str) -> Result<()> {
        self.emit(&Record::SoftwareName { name, version })
    }

    fn metadata_node(
        &mut self,
        target: MetadataTarget,
        id: u32,
        node: &str,
        value: &str,
    ) -> Result<()> {
        let record = match target {
            MetadataTarget::Database => Record::DbMetadataNode { id, node, value },
            MetadataTarget::Table => Record::TblMetadataNode { id, node, value },
            MetadataTarget::Column => Record::ColMetadataNode { id, node, value },
        };
        self.emit(&record)
    }

    fn add_member(&mut self, member: &MemberDecl) -> Result<()> {
        let (id, db_id, member_name, name) =
            (member.id, member.db_id, member.member_name.as_str(), member.name.as_str());
        let mode = member.create_mode.mode_name();
        let record = match member.kind {
            MemberKind::Database => Record::AddMbrDb { id, db_id, member_name, name, mode },
            MemberKind::Table => Record::AddMbrTbl { id, db_id, member_name, name, mode },
        };
        self.emit(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::dispatch;
    use crate::protocol::{CreateMode, Event};
    use bytes::Bytes;

    fn dump(events: &[Event]) -> Vec<String> {
        let mut dumper = JsonDumper::new(Vec::new());
        for event in events {
            dispatch(event, &mut dumper).unwrap();
        }
        assert_eq!(dumper.lines(), events.len() as u64);
        String::from_utf8(dumper.into_inner())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_table_and_cell_lines() {
        let lines = dump(&[
            Event::OpenStream,
            Event::NewTable {
                id: 1,
                name: "reads".into(),
            },
            Event::CellData {
                column_id: 1,
                data: Bytes::from_static(b"ACGT"),
            },
            Event::EndStream,
        ]);
        assert_eq!(
            lines,
            vec![
                r#"{"event":"open-stream"}"#,
                r#"{"event":"new-table","id":1,"name":"reads"}"#,
                r#"{"event":"cell-data","column-id":1,"size":4,"data":"41434754"}"#,
                r#"{"event":"end-stream"}"#,
            ]
        );
    }

    #[test]
    fn test_column_and_row_fields_are_kebab_case() {
        let lines = dump(&[
            Event::NewColumn(ColumnDecl {
                id: 2,
                table_id: 1,
                elem_bits: 32,
                flag_bits: 1,
                name: "POS".into(),
            }),
            Event::MoveAhead {
                table_id: 1,
                rows: 1 << 40,
            },
            Event::EmptyDefault { column_id: 2 },
        ]);
        assert_eq!(
            lines[0],
            r#"{"event":"new-column","id":2,"table-id":1,"elem-bits":32,"flag-bits":1,"name":"POS"}"#
        );
        assert_eq!(
            lines[1],
            r#"{"event":"move-ahead","table-id":1,"rows":1099511627776}"#
        );
        assert_eq!(
            lines[2],
            r#"{"event":"cell-default","column-id":2,"size":0,"data":""}"#
        );
    }

    #[test]
    fn test_v2_event_lines() {
        let lines = dump(&[
            Event::LogMessage("loading".into()),
            Event::Progress(Progress {
                pid: 42,
                name: "vcf-load".into(),
                timestamp: 1_700_000_000,
                version: 1,
                percent: 50,
            }),
            Event::MetadataNode {
                target: MetadataTarget::Database,
                id: 0,
                node: "source".into(),
                value: "1000G".into(),
            },
            Event::AddMember(MemberDecl {
                kind: MemberKind::Database,
                id: 3,
                db_id: 0,
                member_name: "sub".into(),
                name: "NCBI:db".into(),
                create_mode: CreateMode::INIT,
            }),
        ]);
        assert_eq!(lines[0], r#"{"event":"logmsg","message":"loading"}"#);
        assert!(lines[1].starts_with(r#"{"event":"progmsg","pid":42,"#));
        assert_eq!(
            lines[2],
            r#"{"event":"db-metadata-node","id":0,"node":"source","value":"1000G"}"#
        );
        assert_eq!(
            lines[3],
            r#"{"event":"add-mbr-db","id":3,"db-id":0,"member-name":"sub","name":"NCBI:db","mode":"init"}"#
        );
    }
}
