//! Storage-engine sink and event dispatch.
//!
//! The decoder knows nothing about tables or rows; it turns bytes into
//! [`Event`]s. [`dispatch`] turns each event into exactly one call on an
//! [`EventSink`], which is where a storage engine plugs in. The sink does its
//! own semantic validation (unknown tables, duplicate columns, ...).

use crate::codec::{Decoder, StreamSummary};
use crate::error::Result;
use crate::protocol::{ColumnDecl, Event, MemberDecl, MetadataTarget, Progress};

/// Receiver of decoded stream operations.
///
/// Table, column and cell operations are required. Message and metadata
/// events default to no-ops so a sink only handles what it stores.
pub trait EventSink {
    /// `open-stream`.
    fn open_stream(&mut self) -> Result<()>;

    /// `end-stream`.
    fn close_stream(&mut self) -> Result<()>;

    fn declare_table(&mut self, id: u32, name: &str) -> Result<()>;

    fn declare_column(&mut self, column: &ColumnDecl) -> Result<()>;

    /// Set the value repeated in rows that carry no data for the column.
    /// `data` is empty for `empty-default`.
    fn set_cell_default(&mut self, column_id: u32, data: &[u8]) -> Result<()>;

    /// Append bytes to the column's current cell.
    fn append_cell(&mut self, column_id: u32, data: &[u8]) -> Result<()>;

    /// Commit the current row of a table.
    fn advance_row(&mut self, table_id: u32) -> Result<()>;

    /// Skip `rows` rows of a table, filling them with defaults.
    fn advance_rows(&mut self, table_id: u32, rows: u64) -> Result<()>;

    fn error_message(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn log_message(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }

    fn progress(&mut self, _progress: &Progress) -> Result<()> {
        Ok(())
    }

    fn remote_path(&mut self, _path: &str) -> Result<()> {
        Ok(())
    }

    fn use_schema(&mut self, _file: &str, _name: &str) -> Result<()> {
        Ok(())
    }

    fn software_name(&mut self, _name: &str, _version: &str) -> Result<()> {
        Ok(())
    }

    fn metadata_node(
        &mut self,
        _target: MetadataTarget,
        _id: u32,
        _node: &str,
        _value: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn add_member(&mut self, _member: &MemberDecl) -> Result<()> {
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn open_stream(&mut self) -> Result<()> {
        (**self).open_stream()
    }

    fn close_stream(&mut self) -> Result<()> {
        (**self).close_stream()
    }

    fn declare_table(&mut self, id: u32, name: &str) -> Result<()> {
        (**self).declare_table(id, name)
    }

    fn declare_column(&mut self, column: &ColumnDecl) -> Result<()> {
        (**self).declare_column(column)
    }

    fn set_cell_default(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
        (**self).set_cell_default(column_id, data)
    }

    fn append_cell(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
        (**self).append_cell(column_id, data)
    }

    fn advance_row(&mut self, table_id: u32) -> Result<()> {
        (**self).advance_row(table_id)
    }

    fn advance_rows(&mut self, table_id: u32, rows: u64) -> Result<()> {
        (**self).advance_rows(table_id, rows)
    }

    fn error_message(&mut self, message: &str) -> Result<()> {
        (**self).error_message(message)
    }

    fn log_message(&mut self, message: &str) -> Result<()> {
        (**self).log_message(message)
    }

    fn progress(&mut self, progress: &Progress) -> Result<()> {
        (**self).progress(progress)
    }

    fn remote_path(&mut self, path: &str) -> Result<()> {
        (**self).remote_path(path)
    }

    fn use_schema(&mut self, file: &str, name: &str) -> Result<()> {
        (**self).use_schema(file, name)
    }

    fn software_name(&mut self, name: &str, version: &str) -> Result<()> {
        (**self).software_name(name, version)
    }

    fn metadata_node(
        &mut self,
        target: MetadataTarget,
        id: u32,
        node: &str,
        value: &str,
    ) -> Result<()> {
        (**self).metadata_node(target, id, node, value)
    }

    fn add_member(&mut self, member: &MemberDecl) -> Result<()> {
        (**self).add_member(member)
    }
}

/// Forward one decoded event to the sink.
pub fn dispatch<S: EventSink + ?Sized>(event: &Event, sink: &mut S) -> Result<()> {
    match event {
        Event::OpenStream => sink.open_stream(),
        Event::EndStream => sink.close_stream(),
        Event::ErrorMessage(message) => sink.error_message(message),
        Event::LogMessage(message) => sink.log_message(message),
        Event::Progress(progress) => sink.progress(progress),
        Event::RemotePath(path) => sink.remote_path(path),
        Event::UseSchema { file, name } => sink.use_schema(file, name),
        Event::SoftwareName { name, version } => sink.software_name(name, version),
        Event::MetadataNode {
            target,
            id,
            node,
            value,
        } => sink.metadata_node(*target, *id, node, value),
        Event::AddMember(member) => sink.add_member(member),
        Event::NewTable { id, name } => sink.declare_table(*id, name),
        Event::NewColumn(column) => sink.declare_column(column),
        Event::CellDefault { column_id, data } => sink.set_cell_default(*column_id, data),
        Event::EmptyDefault { column_id } => sink.set_cell_default(*column_id, &[]),
        Event::CellData { column_id, data } => sink.append_cell(*column_id, data),
        Event::NextRow { table_id } => sink.advance_row(*table_id),
        Event::MoveAhead { table_id, rows } => sink.advance_rows(*table_id, *rows),
    }
}

/// Decode a complete in-memory stream into a sink.
///
/// A short tail is `TruncatedInput`. Stopping on an event boundary without
/// end-stream succeeds with `closed: false`.
pub fn replay<S: EventSink + ?Sized>(bytes: &[u8], sink: &mut S) -> Result<StreamSummary> {
    let (mut decoder, mut offset) = Decoder::from_header(bytes)?;
    while offset < bytes.len() {
        let (event, used) = decoder.next_event(&bytes[offset..])?;
        dispatch(&event, sink)?;
        offset += used;
    }

    let summary = decoder.summary();
    if !summary.closed {
        tracing::warn!(bytes = summary.bytes, "stream ended without end-stream");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encoder, EncoderConfig};
    use crate::error::GwError;
    use crate::protocol::{CreateMode, MemberKind, Packing};

    /// Records every call as a line of text.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl EventSink for Recorder {
        fn open_stream(&mut self) -> Result<()> {
            self.calls.push("open".into());
            Ok(())
        }

        fn close_stream(&mut self) -> Result<()> {
            self.calls.push("close".into());
            Ok(())
        }

        fn declare_table(&mut self, id: u32, name: &str) -> Result<()> {
            self.calls.push(format!("table {} {}", id, name));
            Ok(())
        }

        fn declare_column(&mut self, column: &ColumnDecl) -> Result<()> {
            self.calls.push(format!(
                "column {} {} {} {}",
                column.id, column.table_id, column.elem_bits, column.name
            ));
            Ok(())
        }

        fn set_cell_default(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
            self.calls.push(format!("default {} {:?}", column_id, data));
            Ok(())
        }

        fn append_cell(&mut self, column_id: u32, data: &[u8]) -> Result<()> {
            self.calls.push(format!("cell {} {:?}", column_id, data));
            Ok(())
        }

        fn advance_row(&mut self, table_id: u32) -> Result<()> {
            self.calls.push(format!("row {}", table_id));
            Ok(())
        }

        fn advance_rows(&mut self, table_id: u32, rows: u64) -> Result<()> {
            self.calls.push(format!("rows {} {}", table_id, rows));
            Ok(())
        }

        fn add_member(&mut self, member: &MemberDecl) -> Result<()> {
            self.calls.push(format!("member {} {}", member.id, member.member_name));
            Ok(())
        }
    }

    /// Rejects data for column 2.
    struct Picky;

    impl EventSink for Picky {
        fn open_stream(&mut self) -> Result<()> {
            Ok(())
        }
        fn close_stream(&mut self) -> Result<()> {
            Ok(())
        }
        fn declare_table(&mut self, _id: u32, _name: &str) -> Result<()> {
            Ok(())
        }
        fn declare_column(&mut self, _column: &ColumnDecl) -> Result<()> {
            Ok(())
        }
        fn set_cell_default(&mut self, _column_id: u32, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        fn append_cell(&mut self, column_id: u32, _data: &[u8]) -> Result<()> {
            if column_id == 2 {
                return Err(GwError::malformed(0, "column 2 is read-only"));
            }
            Ok(())
        }
        fn advance_row(&mut self, _table_id: u32) -> Result<()> {
            Ok(())
        }
        fn advance_rows(&mut self, _table_id: u32, _rows: u64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_one_call_per_event() {
        let mut sink = Recorder::default();
        let events = [
            Event::OpenStream,
            Event::NewTable {
                id: 1,
                name: "reads".into(),
            },
            Event::EmptyDefault { column_id: 1 },
            Event::MoveAhead {
                table_id: 1,
                rows: 5,
            },
            Event::LogMessage("ignored by default".into()),
            Event::EndStream,
        ];
        for event in &events {
            dispatch(event, &mut sink).unwrap();
        }
        assert_eq!(
            sink.calls,
            vec!["open", "table 1 reads", "default 1 []", "rows 1 5", "close"]
        );
    }

    #[test]
    fn test_replay_full_stream() {
        let mut enc = Encoder::new(EncoderConfig::default().packing(Packing::Packed)).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&enc.write_open_stream().unwrap());
        bytes.extend_from_slice(&enc.write_new_table(1, "reads").unwrap());
        bytes.extend_from_slice(&enc.write_new_column(1, 1, 8, 0, "name:ascii").unwrap());
        bytes.extend_from_slice(&enc.write_cell_data(1, 4, b"ACGT").unwrap());
        bytes.extend_from_slice(&enc.write_next_row(1).unwrap());
        bytes.extend_from_slice(
            &enc.write_add_member(&MemberDecl {
                kind: MemberKind::Table,
                id: 2,
                db_id: 0,
                member_name: "refs".into(),
                name: "REFERENCE".into(),
                create_mode: CreateMode::CREATE,
            })
            .unwrap(),
        );
        bytes.extend_from_slice(&enc.write_end_stream().unwrap());

        let mut sink = Recorder::default();
        let summary = replay(&bytes, &mut sink).unwrap();
        assert!(summary.closed);
        assert_eq!(summary.events, 7);
        assert_eq!(summary.bytes, bytes.len() as u64);
        assert_eq!(
            sink.calls,
            vec![
                "open",
                "table 1 reads",
                "column 1 1 8 name:ascii",
                "cell 1 [65, 67, 71, 84]",
                "row 1",
                "member 2 refs",
                "close",
            ]
        );
    }

    #[test]
    fn test_replay_stops_on_sink_error() {
        let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&enc.write_new_table(1, "t").unwrap());
        bytes.extend_from_slice(&enc.write_new_column(1, 1, 8, 0, "a").unwrap());
        bytes.extend_from_slice(&enc.write_new_column(2, 1, 8, 0, "b").unwrap());
        bytes.extend_from_slice(&enc.write_cell_data(2, 1, b"x").unwrap());
        bytes.extend_from_slice(&enc.write_end_stream().unwrap());

        let err = replay(&bytes, &mut Picky).unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_replay_without_end_stream() {
        let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
        let bytes = enc.write_open_stream().unwrap();

        let mut sink = Recorder::default();
        let summary = replay(&bytes, &mut sink).unwrap();
        assert!(!summary.closed);
        assert_eq!(sink.calls, vec!["open"]);
    }

    #[test]
    fn test_sink_by_mutable_reference() {
        fn drive<S: EventSink>(mut sink: S) {
            dispatch(&Event::NextRow { table_id: 3 }, &mut sink).unwrap();
        }

        let mut sink = Recorder::default();
        drive(&mut sink);
        assert_eq!(sink.calls, vec!["row 3"]);
    }
}
