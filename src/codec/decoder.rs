//! Event decoder.
//!
//! [`Decoder::next_event`] reads exactly one event from the front of a byte
//! slice and reports how many bytes it used. Decoder state (known columns,
//! stream position, closed flag) changes only after an event decodes
//! completely, so a caller holding a partial event can retry with more bytes.

use std::collections::HashMap;

use bytes::Bytes;

use super::wire::WireReader;
use crate::error::{GwError, RangeError, Result};
use crate::protocol::{
    decode_id_packed, decode_len_u16, decode_len_u32, decode_len_u8, parse_header, unpack_header,
    ColumnDecl, CreateMode, Event, EventId, HeaderInfo, MemberDecl, MemberKind, MetadataTarget,
    PayloadShape, Progress, SizeClass, COLUMN_FLAG_INT_PACKING, MAX_PACKED_ID,
};

/// Outcome of decoding a whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub header: HeaderInfo,
    /// Events decoded, end-stream included.
    pub events: u64,
    /// Bytes consumed, header included.
    pub bytes: u64,
    /// Whether end-stream was seen.
    pub closed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Width {
    Full,
    Packed(SizeClass),
}

/// Decodes the events of one stream.
pub struct Decoder {
    info: HeaderInfo,
    /// Column id to bits per element.
    columns: HashMap<u32, u32>,
    /// Stream offset of the next event.
    position: u64,
    events: u64,
    closed: bool,
}

impl Decoder {
    /// Decoder for a stream whose header has already been parsed.
    pub fn new(info: HeaderInfo) -> Self {
        Self {
            info,
            columns: HashMap::new(),
            position: info.header_size as u64,
            events: 0,
            closed: false,
        }
    }

    /// Parse the stream header at the start of `buf`.
    ///
    /// Returns the decoder and the number of header bytes consumed.
    pub fn from_header(buf: &[u8]) -> Result<(Self, usize)> {
        let (info, consumed) = parse_header(buf)?;
        tracing::debug!(
            version = info.version,
            packed = info.packing.is_packed(),
            reversed = info.reversed,
            "stream header accepted"
        );
        Ok((Self::new(info), consumed))
    }

    pub fn info(&self) -> &HeaderInfo {
        &self.info
    }

    /// Stream offset of the next event.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Element size of a declared column.
    pub fn column_bits(&self, column_id: u32) -> Option<u32> {
        self.columns.get(&column_id).copied()
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            header: self.info,
            events: self.events,
            bytes: self.position,
            closed: self.closed,
        }
    }

    /// Decode one event from the front of `input`.
    ///
    /// Returns the event and the bytes it occupied, padding included.
    /// Input shorter than the event fails with `TruncatedInput` and leaves
    /// the decoder untouched.
    pub fn next_event(&mut self, input: &[u8]) -> Result<(Event, usize)> {
        if self.closed {
            return Err(GwError::UnexpectedDataAfterEndStream {
                offset: self.position,
            });
        }

        let mut r = WireReader::new(input, self.position, self.info.byte_order);
        let (event, new_column) = self.read_event(&mut r)?;
        let consumed = r.consumed();

        if let Some((id, bits)) = new_column {
            self.columns.insert(id, bits);
        }
        if event.is_end_stream() {
            self.closed = true;
            tracing::debug!(offset = self.position, "end of stream");
        }
        self.position += consumed as u64;
        self.events += 1;
        tracing::trace!(event = event.name(), len = consumed, "decoded event");
        Ok((event, consumed))
    }

    fn read_len(r: &mut WireReader<'_>, width: Width) -> Result<usize> {
        match width {
            Width::Full => {
                let at = r.offset();
                let w = r.u32()?;
                decode_len_u32(w).map_err(|source| GwError::FieldOutOfRange { offset: at, source })
            }
            Width::Packed(SizeClass::U8) => Ok(decode_len_u8(r.u8()?)),
            Width::Packed(SizeClass::U16) => Ok(decode_len_u16(r.u16()?)),
        }
    }

    /// Read a full-mode id field that must be non-zero.
    fn read_full_id(r: &mut WireReader<'_>, field: &'static str) -> Result<u32> {
        let at = r.offset();
        match r.u32()? {
            0 => Err(GwError::FieldOutOfRange {
                offset: at,
                source: RangeError::new(field, 0, 1, u32::MAX as u64),
            }),
            id => Ok(id),
        }
    }

    /// Read the event header, validate the code, and return `(event, id)`.
    fn read_header(&self, r: &mut WireReader<'_>) -> Result<(EventId, u32)> {
        let start = r.offset();
        let packed = self.info.packing.is_packed();

        let (id, code) = if packed {
            let code = r.u8()?;
            let id = decode_id_packed(r.u8()?);
            (id, code)
        } else {
            unpack_header(r.u32()?)
        };

        let event = EventId::from_u8(code).ok_or(GwError::UnknownEventCode {
            code,
            offset: start,
        })?;
        if event.min_version() > self.info.version {
            return Err(GwError::UnknownEventCode {
                code,
                offset: start,
            });
        }

        if packed {
            if event.is_id_less() {
                return Ok((event, 0));
            }
            if event.base_variant() == EventId::DbMetadataNode && id == MAX_PACKED_ID {
                return Ok((event, 0));
            }
            return Ok((event, id));
        }

        if event.is_packed_only() {
            return Err(GwError::malformed(
                start,
                format!("packed event {} within non-packed stream", event.name()),
            ));
        }
        if event.is_id_less() && id != 0 {
            return Err(GwError::malformed(
                start,
                format!("non-zero id {} within {} event", id, event.name()),
            ));
        }
        if !event.is_id_less() && id == 0 && event != EventId::DbMetadataNode {
            return Err(GwError::FieldOutOfRange {
                offset: start,
                source: RangeError::new("id", 0, 1, u32::MAX as u64),
            });
        }
        Ok((event, id))
    }

    /// Read one event. Returns the event and, for `new-column`, the column to
    /// register once the caller commits.
    fn read_event(&self, r: &mut WireReader<'_>) -> Result<(Event, Option<(u32, u32)>)> {
        let start = r.offset();
        let (code, id) = self.read_header(r)?;
        let packed = self.info.packing.is_packed();

        let width = match (packed, code.shape()) {
            (false, _) => Width::Full,
            (
                true,
                PayloadShape::OneString(c) | PayloadShape::TwoStrings(c) | PayloadShape::Data(c),
            ) => Width::Packed(c),
            (true, _) => Width::Packed(SizeClass::U8),
        };

        let mut new_column = None;
        let event = match code.base_variant() {
            EventId::OpenStream => Event::OpenStream,
            EventId::EndStream => Event::EndStream,
            EventId::ErrMsg => Event::ErrorMessage(Self::read_string(r, width, "error message")?),
            EventId::LogMsg => Event::LogMessage(Self::read_string(r, width, "log message")?),
            EventId::RemotePath => Event::RemotePath(Self::read_string(r, width, "remote path")?),
            EventId::NewTable => Event::NewTable {
                id,
                name: Self::read_string(r, width, "table name")?,
            },
            EventId::UseSchema => {
                let (file, name) = Self::read_two_strings(r, width, "schema file", "schema name")?;
                Event::UseSchema { file, name }
            }
            EventId::SoftwareName => {
                let (name, version) =
                    Self::read_two_strings(r, width, "software name", "software version")?;
                Event::SoftwareName { name, version }
            }
            base @ (EventId::DbMetadataNode | EventId::TblMetadataNode | EventId::ColMetadataNode) => {
                let target = match base {
                    EventId::DbMetadataNode => MetadataTarget::Database,
                    EventId::TblMetadataNode => MetadataTarget::Table,
                    _ => MetadataTarget::Column,
                };
                let (node, value) =
                    Self::read_two_strings(r, width, "metadata node", "metadata value")?;
                Event::MetadataNode {
                    target,
                    id,
                    node,
                    value,
                }
            }
            EventId::NewColumn => {
                let decl = self.read_column(r, id)?;
                new_column = Some((decl.id, decl.elem_bits));
                Event::NewColumn(decl)
            }
            EventId::CellDefault => Event::CellDefault {
                column_id: id,
                data: self.read_cells(r, id, width)?,
            },
            EventId::CellData => Event::CellData {
                column_id: id,
                data: self.read_cells(r, id, width)?,
            },
            EventId::EmptyDefault => Event::EmptyDefault { column_id: id },
            EventId::NextRow => Event::NextRow { table_id: id },
            EventId::MoveAhead => Event::MoveAhead {
                table_id: id,
                rows: r.u64()?,
            },
            kind @ (EventId::AddMbrDb | EventId::AddMbrTbl) => {
                let kind = if kind == EventId::AddMbrDb {
                    MemberKind::Database
                } else {
                    MemberKind::Table
                };
                Event::AddMember(self.read_member(r, kind, id)?)
            }
            EventId::ProgMsg => Event::Progress(self.read_status(r)?),
            other => {
                return Err(GwError::malformed(
                    start,
                    format!("no payload layout for {}", other.name()),
                ))
            }
        };

        if !packed {
            r.align()?;
        }
        Ok((event, new_column))
    }

    fn read_string(r: &mut WireReader<'_>, width: Width, what: &str) -> Result<String> {
        let len = Self::read_len(r, width)?;
        r.string(len, what)
    }

    fn read_two_strings(
        r: &mut WireReader<'_>,
        width: Width,
        first: &str,
        second: &str,
    ) -> Result<(String, String)> {
        let len1 = Self::read_len(r, width)?;
        let len2 = Self::read_len(r, width)?;
        Ok((r.string(len1, first)?, r.string(len2, second)?))
    }

    fn read_column(&self, r: &mut WireReader<'_>, id: u32) -> Result<ColumnDecl> {
        let (table_id, elem_bits, flag_bits, name_len) = if self.info.packing.is_packed() {
            let table_id = decode_id_packed(r.u8()?);
            let elem_bits = decode_len_u8(r.u8()?) as u32;
            let at = r.offset();
            let flag_bits = r.u8()?;
            if flag_bits & !COLUMN_FLAG_INT_PACKING != 0 {
                return Err(GwError::FieldOutOfRange {
                    offset: at,
                    source: RangeError::new(
                        "column flags",
                        flag_bits as u64,
                        0,
                        COLUMN_FLAG_INT_PACKING as u64,
                    ),
                });
            }
            let name_len = decode_len_u8(r.u8()?);
            (table_id, elem_bits, flag_bits, name_len)
        } else {
            let table_id = Self::read_full_id(r, "table id")?;
            let elem_bits = Self::read_full_id(r, "element bits")?;
            let name_len = Self::read_len(r, Width::Full)?;
            (table_id, elem_bits, 0, name_len)
        };

        Ok(ColumnDecl {
            id,
            table_id,
            elem_bits,
            flag_bits,
            name: r.string(name_len, "column name")?,
        })
    }

    fn read_cells(&self, r: &mut WireReader<'_>, column_id: u32, width: Width) -> Result<Bytes> {
        let len = match width {
            Width::Full => {
                let at = r.offset();
                let count = Self::read_full_id(r, "element count")?;
                let bits = self.column_bits(column_id).ok_or(GwError::UnknownColumn {
                    column_id,
                    offset: at,
                })?;
                let len = (bits as u64 * count as u64 + 7) / 8;
                usize::try_from(len)
                    .map_err(|_| GwError::malformed(at, "cell data larger than address space"))?
            }
            packed => Self::read_len(r, packed)?,
        };
        Ok(Bytes::copy_from_slice(r.bytes(len)?))
    }

    fn read_member(&self, r: &mut WireReader<'_>, kind: MemberKind, id: u32) -> Result<MemberDecl> {
        let (db_id, len1, len2) = if self.info.packing.is_packed() {
            let db_id = r.u8()? as u32;
            let len1 = decode_len_u8(r.u8()?);
            let len2 = decode_len_u8(r.u8()?);
            (db_id, len1, len2)
        } else {
            let db_id = r.u32()?;
            let len1 = Self::read_len(r, Width::Full)?;
            let len2 = Self::read_len(r, Width::Full)?;
            (db_id, len1, len2)
        };

        let at = r.offset();
        let bits = r.u8()?;
        let create_mode = CreateMode::from_bits(bits)
            .ok_or_else(|| GwError::malformed(at, format!("bad create mode {:#04x}", bits)))?;
        if !self.info.packing.is_packed() {
            r.skip(3)?;
        }

        Ok(MemberDecl {
            kind,
            id,
            db_id,
            member_name: r.string(len1, "member name")?,
            name: r.string(len2, "member type name")?,
            create_mode,
        })
    }

    /// Packed layout has no padding after the event header; see [`Progress`].
    fn read_status(&self, r: &mut WireReader<'_>) -> Result<Progress> {
        let start = r.offset();
        let version = r.u32()?;
        let timestamp = r.u32()?;
        let pid = r.u32()?;
        let (name_len, percent) = if self.info.packing.is_packed() {
            let name_len = decode_len_u8(r.u8()?);
            (name_len, r.u8()? as u32)
        } else {
            let name_len = Self::read_len(r, Width::Full)?;
            (name_len, r.u32()?)
        };

        for (field, value) in [("pid", pid), ("timestamp", timestamp), ("version", version)] {
            if value == 0 {
                return Err(GwError::malformed(start, format!("zero {} in progress event", field)));
            }
        }
        if percent > 100 {
            return Err(GwError::malformed(
                start,
                format!("percent {} above 100 in progress event", percent),
            ));
        }

        Ok(Progress {
            pid,
            name: r.string(name_len, "process name")?,
            timestamp,
            version,
            percent: percent as u8,
        })
    }

    /// Decode a complete in-memory stream.
    ///
    /// Trailing bytes that do not form a whole event fail with
    /// `TruncatedInput`; bytes after end-stream fail with
    /// `UnexpectedDataAfterEndStream`.
    pub fn decode_all(bytes: &[u8]) -> Result<(StreamSummary, Vec<Event>)> {
        let (mut decoder, mut offset) = Self::from_header(bytes)?;
        let mut events = Vec::new();
        while offset < bytes.len() {
            let (event, used) = decoder.next_event(&bytes[offset..])?;
            offset += used;
            events.push(event);
        }
        Ok((decoder.summary(), events))
    }
}
