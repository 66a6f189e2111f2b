//! Event encoder.
//!
//! One method per logical operation. Each returns the complete bytes for the
//! event (header, payload, padding) or an error; a failed call emits nothing
//! and leaves the encoder unchanged. The caller owns the transport.
//!
//! In packed mode string and data events start with the 8-bit size variant
//! and escalate to the 16-bit sibling when a size does not fit.
//!
//! # Example
//!
//! ```
//! use general_writer::codec::{Encoder, EncoderConfig};
//! use general_writer::protocol::Packing;
//!
//! let mut enc = Encoder::new(EncoderConfig::default().packing(Packing::Packed)).unwrap();
//! let mut out = Vec::new();
//! out.extend_from_slice(&enc.write_header().unwrap());
//! out.extend_from_slice(&enc.write_open_stream().unwrap());
//! out.extend_from_slice(&enc.write_new_table(1, "reads").unwrap());
//! out.extend_from_slice(&enc.write_end_stream().unwrap());
//! assert_eq!(out.len(), 24 + 2 + 3 + 5 + 2);
//! ```

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use super::wire::WireWriter;
use crate::error::{GwError, RangeError, Result};
use crate::protocol::{
    check_id_full, encode_elem_bits_packed, encode_id_packed, encode_len_u16, encode_len_u32,
    encode_len_u8, pack_header, select_size_class, ByteOrder, ColumnDecl, Event,
    EventId, MemberDecl, MemberKind, MetadataTarget, Packing, PayloadShape, Progress, SizeClass,
    StreamHeader, COLUMN_FLAG_INT_PACKING, CURRENT_VERSION, HEADER_SIZE, MAX_FULL_ID,
    STRING_LIMIT_8,
};

/// Encoder settings, fixed for the life of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub packing: Packing,
    pub byte_order: ByteOrder,
    pub version: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            packing: Packing::Full,
            byte_order: ByteOrder::native(),
            version: CURRENT_VERSION,
        }
    }
}

impl EncoderConfig {
    pub fn packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// Width of a size field as chosen for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Full,
    Packed(SizeClass),
}

/// Serializes events for one stream.
pub struct Encoder {
    config: EncoderConfig,
    header_written: bool,
    closed: bool,
    /// Column id to bits per element, for cell size checks.
    columns: HashMap<u32, u32>,
    bytes_written: u64,
}

impl Encoder {
    /// Create an encoder. Fails if the configured version is unsupported.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        if config.version == 0 || config.version > CURRENT_VERSION {
            return Err(GwError::UnsupportedVersion(config.version));
        }
        Ok(Self {
            config,
            header_written: false,
            closed: false,
            columns: HashMap::new(),
            bytes_written: 0,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Total bytes handed out so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    fn packed(&self) -> bool {
        self.config.packing.is_packed()
    }

    /// Emit the stream header. Must come before any event; if it does not,
    /// the first event carries it implicitly.
    pub fn write_header(&mut self) -> Result<Bytes> {
        if self.header_written {
            return Err(GwError::HeaderAlreadyWritten);
        }
        let header = StreamHeader {
            byte_order: self.config.byte_order,
            version: self.config.version,
            packing: self.config.packing,
        };
        self.header_written = true;
        self.bytes_written += HEADER_SIZE as u64;
        tracing::debug!(
            version = header.version,
            packed = self.packed(),
            order = ?header.byte_order,
            "writing stream header"
        );
        Ok(Bytes::copy_from_slice(&header.encode()))
    }

    /// Start an event: lifecycle and version checks, then the event header.
    fn begin(&self, event: EventId, id: u32, payload_hint: usize) -> Result<WireWriter> {
        if self.closed {
            return Err(GwError::StreamClosed);
        }
        if event.min_version() > self.config.version {
            return Err(GwError::EventNotInVersion {
                event: event.name(),
                required: event.min_version(),
                version: self.config.version,
            });
        }

        let mut w = WireWriter::with_capacity(self.config.byte_order, 16 + payload_hint);
        if self.packed() {
            w.put_u8(event.code());
            // Id 0 (id-less events, root database) travels as 0xFF.
            let id_byte = if id == 0 { 0xFF } else { encode_id_packed(id)? };
            w.put_u8(id_byte);
        } else {
            w.put_u32(pack_header(id, event)?);
        }
        Ok(w)
    }

    /// Hand out a finished event, prefixing the stream header if needed.
    fn finish(&mut self, mut w: WireWriter, event: EventId) -> Bytes {
        if !self.packed() {
            w.pad();
        }
        let body = w.freeze();

        let out = if self.header_written {
            body
        } else {
            let header = StreamHeader {
                byte_order: self.config.byte_order,
                version: self.config.version,
                packing: self.config.packing,
            };
            let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
            buf.put_slice(&header.encode());
            buf.put_slice(&body);
            self.header_written = true;
            buf.freeze()
        };

        if event == EventId::EndStream {
            self.closed = true;
        }
        self.bytes_written += out.len() as u64;
        tracing::trace!(event = event.name(), len = out.len(), "encoded event");
        out
    }

    /// Pick the event code and size width for a string or data event.
    fn select(&self, base: EventId, lens: &[usize]) -> Result<(EventId, Width)> {
        if !self.packed() {
            for &len in lens {
                encode_len_u32(len)?;
            }
            return Ok((base, Width::Full));
        }

        let fixed = match base.shape() {
            PayloadShape::OneString(class)
            | PayloadShape::TwoStrings(class)
            | PayloadShape::Data(class) => class,
            _ => SizeClass::U8,
        };
        if fixed == SizeClass::U16 {
            // No narrower sibling exists (logmsg).
            select_size_class(lens)?;
            return Ok((base, Width::Packed(SizeClass::U16)));
        }

        match select_size_class(lens)? {
            SizeClass::U8 => Ok((base, Width::Packed(SizeClass::U8))),
            SizeClass::U16 => match base.wide_variant() {
                Some(wide) => Ok((wide, Width::Packed(SizeClass::U16))),
                None => Err(GwError::PayloadTooLarge {
                    len: lens.iter().copied().max().unwrap_or(0),
                    max: STRING_LIMIT_8,
                }),
            },
        }
    }

    fn put_len(w: &mut WireWriter, width: Width, len: usize) -> Result<()> {
        match width {
            Width::Full => w.put_u32(encode_len_u32(len)?),
            Width::Packed(SizeClass::U8) => w.put_u8(encode_len_u8(len)?),
            Width::Packed(SizeClass::U16) => w.put_u16(encode_len_u16(len)?),
        }
        Ok(())
    }

    /// Check an object id that must be present.
    fn object_id(&self, id: u32) -> Result<u32> {
        if self.packed() {
            encode_id_packed(id)?;
            Ok(id)
        } else {
            Ok(check_id_full(id)?)
        }
    }

    fn header_only(&mut self, event: EventId, id: u32) -> Result<Bytes> {
        let w = self.begin(event, id, 0)?;
        Ok(self.finish(w, event))
    }

    fn one_string(&mut self, base: EventId, id: u32, s: &str) -> Result<Bytes> {
        let (event, width) = self.select(base, &[s.len()])?;
        let mut w = self.begin(event, id, s.len())?;
        Self::put_len(&mut w, width, s.len())?;
        w.put_slice(s.as_bytes());
        Ok(self.finish(w, event))
    }

    fn two_strings(&mut self, base: EventId, id: u32, s1: &str, s2: &str) -> Result<Bytes> {
        let (event, width) = self.select(base, &[s1.len(), s2.len()])?;
        let mut w = self.begin(event, id, s1.len() + s2.len())?;
        Self::put_len(&mut w, width, s1.len())?;
        Self::put_len(&mut w, width, s2.len())?;
        w.put_slice(s1.as_bytes());
        w.put_slice(s2.as_bytes());
        Ok(self.finish(w, event))
    }

    pub fn write_open_stream(&mut self) -> Result<Bytes> {
        self.header_only(EventId::OpenStream, 0)
    }

    /// Emit end-stream. Every later write fails with `StreamClosed`.
    pub fn write_end_stream(&mut self) -> Result<Bytes> {
        let out = self.header_only(EventId::EndStream, 0)?;
        tracing::debug!(bytes = self.bytes_written, "stream closed");
        Ok(out)
    }

    pub fn write_error_message(&mut self, message: &str) -> Result<Bytes> {
        self.one_string(EventId::ErrMsg, 0, message)
    }

    /// Log message. Packed streams always use a 16-bit size here.
    pub fn write_log_message(&mut self, message: &str) -> Result<Bytes> {
        self.one_string(EventId::LogMsg, 0, message)
    }

    pub fn write_remote_path(&mut self, path: &str) -> Result<Bytes> {
        self.one_string(EventId::RemotePath, 0, path)
    }

    pub fn write_use_schema(&mut self, file: &str, name: &str) -> Result<Bytes> {
        self.two_strings(EventId::UseSchema, 0, file, name)
    }

    pub fn write_software_name(&mut self, name: &str, version: &str) -> Result<Bytes> {
        self.two_strings(EventId::SoftwareName, 0, name, version)
    }

    /// Metadata node on a database, table or column. Database id 0 is the root.
    pub fn write_metadata_node(
        &mut self,
        target: MetadataTarget,
        id: u32,
        node: &str,
        value: &str,
    ) -> Result<Bytes> {
        let event = match target {
            MetadataTarget::Database => EventId::DbMetadataNode,
            MetadataTarget::Table => EventId::TblMetadataNode,
            MetadataTarget::Column => EventId::ColMetadataNode,
        };
        if !(target == MetadataTarget::Database && id == 0) {
            self.object_id(id)?;
        }
        self.two_strings(event, id, node, value)
    }

    pub fn write_new_table(&mut self, id: u32, name: &str) -> Result<Bytes> {
        self.object_id(id)?;
        self.one_string(EventId::NewTable, id, name)
    }

    /// Declare a column. `flag_bits` only travels in packed streams.
    pub fn write_new_column(
        &mut self,
        id: u32,
        table_id: u32,
        elem_bits: u32,
        flag_bits: u8,
        name: &str,
    ) -> Result<Bytes> {
        let event = EventId::NewColumn;
        self.object_id(id)?;
        self.object_id(table_id)?;

        let mut w = if self.packed() {
            if flag_bits & !COLUMN_FLAG_INT_PACKING != 0 {
                return Err(RangeError::new(
                    "column flags",
                    flag_bits as u64,
                    0,
                    COLUMN_FLAG_INT_PACKING as u64,
                )
                .into());
            }
            let bits = encode_elem_bits_packed(elem_bits)?;
            let name_len = encode_len_u8(name.len()).map_err(|e| {
                if name.is_empty() {
                    GwError::Range(e)
                } else {
                    GwError::PayloadTooLarge {
                        len: name.len(),
                        max: STRING_LIMIT_8,
                    }
                }
            })?;
            let mut w = self.begin(event, id, 4 + name.len())?;
            w.put_u8(encode_id_packed(table_id)?);
            w.put_u8(bits);
            w.put_u8(flag_bits);
            w.put_u8(name_len);
            w
        } else {
            if elem_bits == 0 {
                return Err(RangeError::new("element bits", 0, 1, u32::MAX as u64).into());
            }
            let name_len = encode_len_u32(name.len())?;
            let mut w = self.begin(event, id, 12 + name.len())?;
            w.put_u32(table_id);
            w.put_u32(elem_bits);
            w.put_u32(name_len);
            w
        };
        w.put_slice(name.as_bytes());

        let out = self.finish(w, event);
        self.columns.insert(id, elem_bits);
        Ok(out)
    }

    /// Same as [`write_new_column`](Self::write_new_column) from a declaration.
    pub fn write_column(&mut self, decl: &ColumnDecl) -> Result<Bytes> {
        self.write_new_column(decl.id, decl.table_id, decl.elem_bits, decl.flag_bits, &decl.name)
    }

    /// Check `data` against the declared element size of `column_id`.
    ///
    /// Only full streams put the element count on the wire. Packed cells
    /// carry a byte length, and integer-packed columns hold variable-length
    /// bytes, so nothing is checked there.
    fn check_cells(&self, column_id: u32, elem_count: u32, data: &[u8]) -> Result<()> {
        if self.packed() {
            return Ok(());
        }
        if elem_count == 0 {
            return Err(RangeError::new("element count", 0, 1, u32::MAX as u64).into());
        }
        let bits = match self.columns.get(&column_id) {
            Some(bits) => *bits,
            None => {
                return Err(GwError::UnknownColumn {
                    column_id,
                    offset: self.bytes_written,
                })
            }
        };
        let expected = (bits as u64 * elem_count as u64 + 7) / 8;
        if expected != data.len() as u64 {
            return Err(GwError::DataSizeMismatch {
                column_id,
                elem_count,
                expected,
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn cells(&mut self, base: EventId, column_id: u32, elem_count: u32, data: &[u8]) -> Result<Bytes> {
        self.object_id(column_id)?;
        self.check_cells(column_id, elem_count, data)?;

        let (event, width) = self.select(base, &[data.len()])?;
        let mut w = self.begin(event, column_id, data.len())?;
        match width {
            Width::Full => w.put_u32(elem_count),
            packed => Self::put_len(&mut w, packed, data.len())?,
        }
        w.put_slice(data);
        Ok(self.finish(w, event))
    }

    /// Set the default value of a column. Empty data becomes `empty-default`.
    pub fn write_cell_default(&mut self, column_id: u32, elem_count: u32, data: &[u8]) -> Result<Bytes> {
        if data.is_empty() {
            return self.write_empty_default(column_id);
        }
        self.cells(EventId::CellDefault, column_id, elem_count, data)
    }

    pub fn write_empty_default(&mut self, column_id: u32) -> Result<Bytes> {
        self.object_id(column_id)?;
        self.header_only(EventId::EmptyDefault, column_id)
    }

    /// Append data to the current cell of a column.
    ///
    /// `elem_count` goes on the wire in full streams and must match
    /// `data.len()`. Packed streams ignore it.
    pub fn write_cell_data(&mut self, column_id: u32, elem_count: u32, data: &[u8]) -> Result<Bytes> {
        self.cells(EventId::CellData, column_id, elem_count, data)
    }

    /// Commit the current row of a table.
    pub fn write_next_row(&mut self, table_id: u32) -> Result<Bytes> {
        self.object_id(table_id)?;
        self.header_only(EventId::NextRow, table_id)
    }

    /// Skip `rows` rows of a table.
    pub fn write_move_ahead(&mut self, table_id: u32, rows: u64) -> Result<Bytes> {
        let event = EventId::MoveAhead;
        self.object_id(table_id)?;
        let mut w = self.begin(event, table_id, 8)?;
        w.put_u64(rows);
        Ok(self.finish(w, event))
    }

    /// Add a member database or table under database `decl.db_id`.
    pub fn write_add_member(&mut self, decl: &MemberDecl) -> Result<Bytes> {
        let event = match decl.kind {
            MemberKind::Database => EventId::AddMbrDb,
            MemberKind::Table => EventId::AddMbrTbl,
        };
        self.object_id(decl.id)?;
        let (s1, s2) = (decl.member_name.as_bytes(), decl.name.as_bytes());

        let mut w = if self.packed() {
            if decl.db_id > u8::MAX as u32 {
                return Err(RangeError::new("parent db id", decl.db_id as u64, 0, 255).into());
            }
            for len in [s1.len(), s2.len()] {
                if len > STRING_LIMIT_8 {
                    return Err(GwError::PayloadTooLarge {
                        len,
                        max: STRING_LIMIT_8,
                    });
                }
            }
            let (l1, l2) = (encode_len_u8(s1.len())?, encode_len_u8(s2.len())?);
            let mut w = self.begin(event, decl.id, 4 + s1.len() + s2.len())?;
            w.put_u8(decl.db_id as u8);
            w.put_u8(l1);
            w.put_u8(l2);
            w.put_u8(decl.create_mode.bits());
            w
        } else {
            if decl.db_id > MAX_FULL_ID {
                return Err(RangeError::new("parent db id", decl.db_id as u64, 0, MAX_FULL_ID as u64).into());
            }
            let (l1, l2) = (encode_len_u32(s1.len())?, encode_len_u32(s2.len())?);
            let mut w = self.begin(event, decl.id, 16 + s1.len() + s2.len())?;
            w.put_u32(decl.db_id);
            w.put_u32(l1);
            w.put_u32(l2);
            w.put_u8(decl.create_mode.bits());
            w.put_slice(&[0, 0, 0]);
            w
        };
        w.put_slice(s1);
        w.put_slice(s2);
        Ok(self.finish(w, event))
    }

    /// Progress report from process `progress.pid`.
    pub fn write_progress(&mut self, progress: &Progress) -> Result<Bytes> {
        let event = EventId::ProgMsg;
        for (field, value) in [
            ("pid", progress.pid),
            ("timestamp", progress.timestamp),
            ("version", progress.version),
        ] {
            if value == 0 {
                return Err(RangeError::new(field, 0, 1, u32::MAX as u64).into());
            }
        }
        if progress.percent > 100 {
            return Err(RangeError::new("percent", progress.percent as u64, 0, 100).into());
        }
        let name = progress.name.as_bytes();

        let mut w = if self.packed() {
            let name_len = encode_len_u8(name.len()).map_err(|e| {
                if name.is_empty() {
                    GwError::Range(e)
                } else {
                    GwError::PayloadTooLarge {
                        len: name.len(),
                        max: STRING_LIMIT_8,
                    }
                }
            })?;
            let mut w = self.begin(event, 0, 14 + name.len())?;
            w.put_u32(progress.version);
            w.put_u32(progress.timestamp);
            w.put_u32(progress.pid);
            w.put_u8(name_len);
            w.put_u8(progress.percent);
            w
        } else {
            let name_len = encode_len_u32(name.len())?;
            let mut w = self.begin(event, 0, 20 + name.len())?;
            w.put_u32(progress.version);
            w.put_u32(progress.timestamp);
            w.put_u32(progress.pid);
            w.put_u32(name_len);
            w.put_u32(progress.percent as u32);
            w
        };
        w.put_slice(name);
        Ok(self.finish(w, event))
    }

    /// Encode a decoded event.
    ///
    /// Cell events carry no element count; in full streams it is derived
    /// from the byte length and the column's element size. Packed streams
    /// need none, so decoded packed cells re-encode byte for byte.
    pub fn encode(&mut self, event: &Event) -> Result<Bytes> {
        match event {
            Event::OpenStream => self.write_open_stream(),
            Event::EndStream => self.write_end_stream(),
            Event::ErrorMessage(msg) => self.write_error_message(msg),
            Event::LogMessage(msg) => self.write_log_message(msg),
            Event::Progress(progress) => self.write_progress(progress),
            Event::RemotePath(path) => self.write_remote_path(path),
            Event::UseSchema { file, name } => self.write_use_schema(file, name),
            Event::SoftwareName { name, version } => self.write_software_name(name, version),
            Event::MetadataNode {
                target,
                id,
                node,
                value,
            } => self.write_metadata_node(*target, *id, node, value),
            Event::AddMember(decl) => self.write_add_member(decl),
            Event::NewTable { id, name } => self.write_new_table(*id, name),
            Event::NewColumn(decl) => self.write_column(decl),
            Event::CellDefault { column_id, data } => {
                let count = self.derive_elem_count(*column_id, data.len());
                self.write_cell_default(*column_id, count, data)
            }
            Event::EmptyDefault { column_id } => self.write_empty_default(*column_id),
            Event::CellData { column_id, data } => {
                let count = self.derive_elem_count(*column_id, data.len());
                self.write_cell_data(*column_id, count, data)
            }
            Event::NextRow { table_id } => self.write_next_row(*table_id),
            Event::MoveAhead { table_id, rows } => self.write_move_ahead(*table_id, *rows),
        }
    }

    /// Largest element count whose packed size fits `len` bytes.
    fn derive_elem_count(&self, column_id: u32, len: usize) -> u32 {
        if self.packed() {
            return 0;
        }
        match self.columns.get(&column_id) {
            Some(&bits) if bits > 0 => ((len as u64 * 8) / bits as u64).min(u32::MAX as u64) as u32,
            _ => u32::try_from(len).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CreateMode;

    fn full() -> Encoder {
        let config = EncoderConfig::default().byte_order(ByteOrder::Little);
        let mut enc = Encoder::new(config).unwrap();
        enc.write_header().unwrap();
        enc
    }

    fn packed() -> Encoder {
        let config = EncoderConfig::default()
            .packing(Packing::Packed)
            .byte_order(ByteOrder::Little);
        let mut enc = Encoder::new(config).unwrap();
        enc.write_header().unwrap();
        enc
    }

    fn header_config(packing: Packing) -> EncoderConfig {
        EncoderConfig::default()
            .packing(packing)
            .byte_order(ByteOrder::Little)
    }

    #[test]
    fn test_config_builder() {
        let config = EncoderConfig::default()
            .packing(Packing::Packed)
            .byte_order(ByteOrder::Big)
            .version(1);
        assert_eq!(config.packing, Packing::Packed);
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        assert!(matches!(
            Encoder::new(EncoderConfig::default().version(0)),
            Err(GwError::UnsupportedVersion(0))
        ));
        assert!(Encoder::new(EncoderConfig::default().version(3)).is_err());
    }

    #[test]
    fn test_full_string_padding() {
        let mut enc = full();
        // header word + size word + 5 bytes + 3 pad
        let bytes = enc.write_remote_path("hello").unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 5 + 3);
        assert_eq!(&bytes[13..], &[0, 0, 0]);

        let bytes = enc.write_remote_path("four").unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 4);

        let bytes = enc.write_remote_path("sevenxx").unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 7 + 1);
    }

    #[test]
    fn test_full_header_word_layout() {
        let mut enc = full();
        let bytes = enc.write_new_table(0x010203, "t").unwrap();
        assert_eq!(&bytes[0..4], &[0x03, 0x02, 0x01, EventId::NewTable.code()]);
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_packed_new_table_layout() {
        let mut enc = packed();
        let bytes = enc.write_new_table(1, "reads").unwrap();
        assert_eq!(&bytes[..], &[5, 0, 4, b'r', b'e', b'a', b'd', b's']);
    }

    #[test]
    fn test_packed_escalates_to_wide_variant() {
        let mut enc = packed();
        let name = "x".repeat(300);
        let bytes = enc.write_new_table(2, &name).unwrap();
        assert_eq!(bytes[0], EventId::NewTable2.code());
        assert_eq!(bytes[1], 1);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 299);
        assert_eq!(bytes.len(), 4 + 300);
    }

    #[test]
    fn test_packed_payload_too_large() {
        let mut enc = packed();
        let data = vec![0u8; 65537];
        let err = enc.write_cell_data(1, 65537, &data).unwrap_err();
        assert!(matches!(err, GwError::PayloadTooLarge { len: 65537, .. }));
    }

    #[test]
    fn test_packed_software_name_has_no_wide_variant() {
        let mut enc = packed();
        let err = enc.write_software_name(&"n".repeat(257), "1.0").unwrap_err();
        assert!(matches!(err, GwError::PayloadTooLarge { max: 256, .. }));
    }

    #[test]
    fn test_packed_logmsg_always_wide() {
        let mut enc = packed();
        let bytes = enc.write_log_message("hi").unwrap();
        assert_eq!(&bytes[..], &[EventId::LogMsg.code(), 0xFF, 1, 0, b'h', b'i']);
    }

    #[test]
    fn test_packed_id_out_of_range() {
        let mut enc = packed();
        assert!(matches!(
            enc.write_new_table(257, "t"),
            Err(GwError::Range(_))
        ));
        assert!(matches!(enc.write_next_row(0), Err(GwError::Range(_))));
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut enc = full();
        assert!(matches!(enc.write_new_table(1, ""), Err(GwError::Range(_))));
        let mut enc = packed();
        assert!(matches!(enc.write_remote_path(""), Err(GwError::Range(_))));
    }

    #[test]
    fn test_full_cell_data_requires_known_column() {
        let mut enc = full();
        let err = enc.write_cell_data(9, 4, b"ACGT").unwrap_err();
        assert!(matches!(err, GwError::UnknownColumn { column_id: 9, .. }));

        enc.write_new_column(9, 1, 8, 0, "READ").unwrap();
        let bytes = enc.write_cell_data(9, 4, b"ACGT").unwrap();
        assert_eq!(bytes.len(), 4 + 4 + 4);
        assert_eq!(&bytes[4..8], &[4, 0, 0, 0]);
    }

    #[test]
    fn test_cell_size_mismatch() {
        let mut enc = full();
        enc.write_new_column(1, 1, 32, 0, "POS").unwrap();
        let err = enc.write_cell_data(1, 2, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            GwError::DataSizeMismatch {
                expected: 8,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_packed_int_packed_cells_skip_size_check() {
        let mut enc = packed();
        enc.write_new_column(1, 1, 32, COLUMN_FLAG_INT_PACKING, "X").unwrap();
        let bytes = enc.write_cell_data(1, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&bytes[..], &[EventId::CellData.code(), 0, 3, 1, 2, 3, 4]);

        // Plain packed columns carry the byte length only.
        enc.write_new_column(2, 1, 32, 0, "Y").unwrap();
        assert!(enc.write_cell_data(2, 1, &[9]).is_ok());
    }

    #[test]
    fn test_packed_decoded_cells_reencode() {
        let header = StreamHeader {
            byte_order: ByteOrder::Little,
            version: CURRENT_VERSION,
            packing: Packing::Packed,
        };
        let mut stream = header.encode().to_vec();
        stream.extend_from_slice(&[EventId::NewColumn.code(), 0, 0, 31, 1, 0, b'X']);
        stream.extend_from_slice(&[EventId::CellData.code(), 0, 2, 7, 8, 9]);

        let (_, events) = crate::codec::Decoder::decode_all(&stream).unwrap();
        assert_eq!(
            events[1],
            Event::CellData {
                column_id: 1,
                data: Bytes::from_static(&[7, 8, 9])
            }
        );

        let mut enc = Encoder::new(header_config(Packing::Packed)).unwrap();
        let mut out = enc.write_header().unwrap().to_vec();
        for event in &events {
            out.extend_from_slice(&enc.encode(event).unwrap());
        }
        assert_eq!(out, stream);
    }

    #[test]
    fn test_full_cells_need_element_count() {
        let mut enc = full();
        enc.write_new_column(1, 1, 8, 0, "READ").unwrap();
        assert!(matches!(
            enc.write_cell_data(1, 0, b"A"),
            Err(GwError::Range(_))
        ));
    }

    #[test]
    fn test_empty_default_routing() {
        let mut enc = packed();
        let bytes = enc.write_cell_default(3, 0, &[]).unwrap();
        assert_eq!(&bytes[..], &[EventId::EmptyDefault.code(), 2]);
    }

    #[test]
    fn test_move_ahead_layouts() {
        let mut enc = full();
        let bytes = enc.write_move_ahead(1, 0x1_0000_0002).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[4..12], &0x1_0000_0002u64.to_le_bytes());

        let mut enc = packed();
        let bytes = enc.write_move_ahead(1, 5).unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn test_closed_after_end_stream() {
        let mut enc = packed();
        enc.write_end_stream().unwrap();
        assert!(enc.is_closed());
        assert!(matches!(enc.write_next_row(1), Err(GwError::StreamClosed)));
    }

    #[test]
    fn test_header_prepended_when_missing() {
        let mut enc = Encoder::new(EncoderConfig::default().packing(Packing::Packed)).unwrap();
        let bytes = enc.write_open_stream().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 2);
        assert_eq!(&bytes[..8], b"NCBIgnld");
        assert!(matches!(
            enc.write_header(),
            Err(GwError::HeaderAlreadyWritten)
        ));
    }

    #[test]
    fn test_v2_events_gated_by_version() {
        let mut enc = Encoder::new(EncoderConfig::default().version(1)).unwrap();
        let err = enc.write_log_message("hello").unwrap_err();
        assert!(matches!(err, GwError::EventNotInVersion { required: 2, .. }));
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let mut enc = packed();
        let before = enc.bytes_written();
        assert!(enc.write_new_column(1, 1, 0, 0, "c").is_err());
        assert_eq!(enc.bytes_written(), before);
        assert!(enc.write_cell_default(1, 1, &[1]).is_ok());
    }

    #[test]
    fn test_progress_validation() {
        let mut enc = full();
        let mut progress = Progress {
            pid: 42,
            name: "loader".into(),
            timestamp: 1_700_000_000,
            version: 1,
            percent: 50,
        };
        let bytes = enc.write_progress(&progress).unwrap();
        assert_eq!(bytes.len(), 4 + 20 + 6 + 2);

        progress.percent = 101;
        assert!(enc.write_progress(&progress).is_err());
        progress.percent = 100;
        progress.pid = 0;
        assert!(enc.write_progress(&progress).is_err());
    }

    #[test]
    fn test_add_member_layouts() {
        let decl = MemberDecl {
            kind: MemberKind::Table,
            id: 2,
            db_id: 0,
            member_name: "SEQ".into(),
            name: "seq_tbl".into(),
            create_mode: CreateMode::CREATE,
        };
        let bytes = full().write_add_member(&decl).unwrap();
        // 4 hdr + 16 fixed + 10 strings + 2 pad
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[16], CreateMode::CREATE.bits());

        let bytes = packed().write_add_member(&decl).unwrap();
        assert_eq!(&bytes[..6], &[EventId::AddMbrTbl.code(), 1, 0, 2, 6, 2]);
        assert_eq!(bytes.len(), 6 + 10);
    }

    #[test]
    fn test_root_db_metadata_id() {
        let mut enc = packed();
        let bytes = enc
            .write_metadata_node(MetadataTarget::Database, 0, "loader", "gw")
            .unwrap();
        assert_eq!(&bytes[..2], &[EventId::DbMetadataNode.code(), 0xFF]);
        assert!(enc
            .write_metadata_node(MetadataTarget::Table, 0, "a", "b")
            .is_err());
    }
}
