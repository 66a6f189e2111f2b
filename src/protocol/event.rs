//! Decoded events.
//!
//! One variant per logical event. Size-class siblings (`cell-data` and
//! `cell-data2`, ...) decode to the same variant, and every id and length is
//! already bias-corrected.

use bytes::Bytes;

use super::event_id::EventId;

/// Column declaration carried by `new-column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDecl {
    pub id: u32,
    pub table_id: u32,
    /// Bits per element, at least 1.
    pub elem_bits: u32,
    /// Packed streams only: bit 0 marks integer-packed cells. Always 0 in
    /// full streams.
    pub flag_bits: u8,
    /// Column name or spec, for example `"READ:ascii"`.
    pub name: String,
}

/// Column flag: cell data uses integer element packing.
pub const COLUMN_FLAG_INT_PACKING: u8 = 0x01;

/// Object kind addressed by a metadata node event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataTarget {
    Database,
    Table,
    Column,
}

/// Kind of member added by `add-mbr-db` / `add-mbr-tbl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Database,
    Table,
}

/// Open/create mode of a member database or table.
///
/// The low nibble is the mode, the high bits are option flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateMode(u8);

impl CreateMode {
    pub const OPEN: CreateMode = CreateMode(0);
    pub const INIT: CreateMode = CreateMode(1);
    pub const CREATE: CreateMode = CreateMode(2);

    /// Also write MD5 checksums.
    pub const MD5: u8 = 0x40;
    /// Create missing parent directories.
    pub const PARENTS: u8 = 0x80;

    const VALUE_MASK: u8 = 0x0F;
    const FLAG_MASK: u8 = Self::MD5 | Self::PARENTS;

    /// Validate a raw mode byte.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & Self::VALUE_MASK > 2 {
            return None;
        }
        if bits & !(Self::VALUE_MASK | Self::FLAG_MASK) != 0 {
            return None;
        }
        Some(CreateMode(bits))
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Same mode with extra flag bits set.
    pub fn with_flags(self, flags: u8) -> Self {
        CreateMode(self.0 | (flags & Self::FLAG_MASK))
    }

    pub fn mode_name(self) -> &'static str {
        match self.0 & Self::VALUE_MASK {
            0 => "open",
            1 => "init",
            _ => "create",
        }
    }

    pub fn has_md5(self) -> bool {
        self.0 & Self::MD5 != 0
    }

    pub fn has_parents(self) -> bool {
        self.0 & Self::PARENTS != 0
    }
}

/// Member database or table declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub kind: MemberKind,
    /// Id assigned to the new member.
    pub id: u32,
    /// Parent database id, 0 for the root database.
    pub db_id: u32,
    /// Member name inside the parent.
    pub member_name: String,
    /// Database or table name (schema type).
    pub name: String,
    pub create_mode: CreateMode,
}

/// Progress report carried by `progmsg`.
///
/// Packed streams lay the fields out back to back: three `u32`, the biased
/// name size and percent as `u8`, then the name. The C struct
/// `gwp_status_evt_v1` aligns its `u32` fields and puts 2 pad bytes after
/// the event header, so packed progress events from such writers do not
/// decode here. Full streams are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub pid: u32,
    pub name: String,
    pub timestamp: u32,
    pub version: u32,
    /// 0..=100.
    pub percent: u8,
}

/// A decoded event.
///
/// Names, paths, messages and metadata values are `String`: the decoder
/// rejects text fields that are not UTF-8 with `MalformedEvent` at the
/// field's offset. Cell payloads are opaque `Bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OpenStream,
    EndStream,
    ErrorMessage(String),
    LogMessage(String),
    Progress(Progress),
    RemotePath(String),
    UseSchema {
        file: String,
        name: String,
    },
    SoftwareName {
        name: String,
        version: String,
    },
    MetadataNode {
        target: MetadataTarget,
        /// Object id; 0 addresses the root database.
        id: u32,
        node: String,
        value: String,
    },
    AddMember(MemberDecl),
    NewTable {
        id: u32,
        name: String,
    },
    NewColumn(ColumnDecl),
    CellDefault {
        column_id: u32,
        data: Bytes,
    },
    EmptyDefault {
        column_id: u32,
    },
    CellData {
        column_id: u32,
        data: Bytes,
    },
    NextRow {
        table_id: u32,
    },
    MoveAhead {
        table_id: u32,
        rows: u64,
    },
}

impl Event {
    /// Base event code of this event, before any size-class selection.
    pub fn event_id(&self) -> EventId {
        match self {
            Event::OpenStream => EventId::OpenStream,
            Event::EndStream => EventId::EndStream,
            Event::ErrorMessage(_) => EventId::ErrMsg,
            Event::LogMessage(_) => EventId::LogMsg,
            Event::Progress(_) => EventId::ProgMsg,
            Event::RemotePath(_) => EventId::RemotePath,
            Event::UseSchema { .. } => EventId::UseSchema,
            Event::SoftwareName { .. } => EventId::SoftwareName,
            Event::MetadataNode { target, .. } => match target {
                MetadataTarget::Database => EventId::DbMetadataNode,
                MetadataTarget::Table => EventId::TblMetadataNode,
                MetadataTarget::Column => EventId::ColMetadataNode,
            },
            Event::AddMember(decl) => match decl.kind {
                MemberKind::Database => EventId::AddMbrDb,
                MemberKind::Table => EventId::AddMbrTbl,
            },
            Event::NewTable { .. } => EventId::NewTable,
            Event::NewColumn(_) => EventId::NewColumn,
            Event::CellDefault { .. } => EventId::CellDefault,
            Event::EmptyDefault { .. } => EventId::EmptyDefault,
            Event::CellData { .. } => EventId::CellData,
            Event::NextRow { .. } => EventId::NextRow,
            Event::MoveAhead { .. } => EventId::MoveAhead,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.event_id().name()
    }

    #[inline]
    pub fn is_end_stream(&self) -> bool {
        matches!(self, Event::EndStream)
    }
}
