//! Event catalog.
//!
//! Every event on the wire starts with one of these codes. Codes are stable
//! across protocol versions; v2 only appends new ones.

/// Sentinel code 0, never valid on the wire.
pub const BAD_EVENT: u8 = 0;

/// Sentinel one past the last assigned code.
pub const MAX_EVENT_ID: u8 = 30;

/// Event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventId {
    ErrMsg = 1,
    EndStream = 2,
    RemotePath = 3,
    UseSchema = 4,
    NewTable = 5,
    NewColumn = 6,
    OpenStream = 7,
    CellDefault = 8,
    CellData = 9,
    NextRow = 10,
    MoveAhead = 11,
    ErrMsg2 = 12,
    RemotePath2 = 13,
    UseSchema2 = 14,
    NewTable2 = 15,
    CellDefault2 = 16,
    CellData2 = 17,
    EmptyDefault = 18,
    SoftwareName = 19,
    DbMetadataNode = 20,
    TblMetadataNode = 21,
    ColMetadataNode = 22,
    DbMetadataNode2 = 23,
    TblMetadataNode2 = 24,
    ColMetadataNode2 = 25,
    AddMbrDb = 26,
    AddMbrTbl = 27,
    LogMsg = 28,
    ProgMsg = 29,
}

/// Width of a packed size field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// `u8` holding size - 1 (1..=256).
    U8,
    /// `u16` holding size - 1 (1..=65536).
    U16,
}

/// Payload layout following the event header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    HeaderOnly,
    OneString(SizeClass),
    TwoStrings(SizeClass),
    Column,
    Data(SizeClass),
    MoveAhead,
    AddMember,
    Status,
}

impl EventId {
    /// All assigned codes in wire order.
    pub const ALL: [EventId; 29] = [
        EventId::ErrMsg,
        EventId::EndStream,
        EventId::RemotePath,
        EventId::UseSchema,
        EventId::NewTable,
        EventId::NewColumn,
        EventId::OpenStream,
        EventId::CellDefault,
        EventId::CellData,
        EventId::NextRow,
        EventId::MoveAhead,
        EventId::ErrMsg2,
        EventId::RemotePath2,
        EventId::UseSchema2,
        EventId::NewTable2,
        EventId::CellDefault2,
        EventId::CellData2,
        EventId::EmptyDefault,
        EventId::SoftwareName,
        EventId::DbMetadataNode,
        EventId::TblMetadataNode,
        EventId::ColMetadataNode,
        EventId::DbMetadataNode2,
        EventId::TblMetadataNode2,
        EventId::ColMetadataNode2,
        EventId::AddMbrDb,
        EventId::AddMbrTbl,
        EventId::LogMsg,
        EventId::ProgMsg,
    ];

    /// Look up a wire code. Sentinels and unassigned codes give `None`.
    pub fn from_u8(code: u8) -> Option<Self> {
        if code == BAD_EVENT || code >= MAX_EVENT_ID {
            return None;
        }
        Some(Self::ALL[(code - 1) as usize])
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// First protocol version in which this code may appear.
    pub fn min_version(self) -> u32 {
        if self.code() >= EventId::SoftwareName.code() {
            2
        } else {
            1
        }
    }

    /// Codes that only exist in packed streams (the 16-bit size siblings).
    pub fn is_packed_only(self) -> bool {
        matches!(
            self,
            EventId::ErrMsg2
                | EventId::RemotePath2
                | EventId::UseSchema2
                | EventId::NewTable2
                | EventId::CellDefault2
                | EventId::CellData2
                | EventId::DbMetadataNode2
                | EventId::TblMetadataNode2
                | EventId::ColMetadataNode2
        )
    }

    /// Events whose header id carries no meaning.
    ///
    /// Full streams must send 0 for these; packed streams ignore the byte.
    pub fn is_id_less(self) -> bool {
        matches!(
            self,
            EventId::OpenStream
                | EventId::EndStream
                | EventId::ErrMsg
                | EventId::ErrMsg2
                | EventId::LogMsg
                | EventId::ProgMsg
                | EventId::RemotePath
                | EventId::RemotePath2
                | EventId::UseSchema
                | EventId::UseSchema2
                | EventId::SoftwareName
        )
    }

    /// The 16-bit packed sibling of an 8-bit packed event, if any.
    pub fn wide_variant(self) -> Option<EventId> {
        match self {
            EventId::ErrMsg => Some(EventId::ErrMsg2),
            EventId::RemotePath => Some(EventId::RemotePath2),
            EventId::UseSchema => Some(EventId::UseSchema2),
            EventId::NewTable => Some(EventId::NewTable2),
            EventId::CellDefault => Some(EventId::CellDefault2),
            EventId::CellData => Some(EventId::CellData2),
            EventId::DbMetadataNode => Some(EventId::DbMetadataNode2),
            EventId::TblMetadataNode => Some(EventId::TblMetadataNode2),
            EventId::ColMetadataNode => Some(EventId::ColMetadataNode2),
            _ => None,
        }
    }

    /// The 8-bit base event of a 16-bit sibling; identity for everything else.
    pub fn base_variant(self) -> EventId {
        match self {
            EventId::ErrMsg2 => EventId::ErrMsg,
            EventId::RemotePath2 => EventId::RemotePath,
            EventId::UseSchema2 => EventId::UseSchema,
            EventId::NewTable2 => EventId::NewTable,
            EventId::CellDefault2 => EventId::CellDefault,
            EventId::CellData2 => EventId::CellData,
            EventId::DbMetadataNode2 => EventId::DbMetadataNode,
            EventId::TblMetadataNode2 => EventId::TblMetadataNode,
            EventId::ColMetadataNode2 => EventId::ColMetadataNode,
            other => other,
        }
    }

    /// Payload layout in packed streams.
    ///
    /// Full streams use the same shapes with every size field widened to an
    /// unbiased `u32`, so the size class is irrelevant there.
    pub fn shape(self) -> PayloadShape {
        use PayloadShape::*;
        use SizeClass::*;

        match self {
            EventId::OpenStream | EventId::EndStream | EventId::NextRow | EventId::EmptyDefault => {
                HeaderOnly
            }
            EventId::ErrMsg | EventId::RemotePath | EventId::NewTable => OneString(U8),
            EventId::ErrMsg2 | EventId::RemotePath2 | EventId::NewTable2 | EventId::LogMsg => {
                OneString(U16)
            }
            EventId::UseSchema
            | EventId::SoftwareName
            | EventId::DbMetadataNode
            | EventId::TblMetadataNode
            | EventId::ColMetadataNode => TwoStrings(U8),
            EventId::UseSchema2
            | EventId::DbMetadataNode2
            | EventId::TblMetadataNode2
            | EventId::ColMetadataNode2 => TwoStrings(U16),
            EventId::NewColumn => Column,
            EventId::CellDefault | EventId::CellData => Data(U8),
            EventId::CellDefault2 | EventId::CellData2 => Data(U16),
            EventId::MoveAhead => MoveAhead,
            EventId::AddMbrDb | EventId::AddMbrTbl => AddMember,
            EventId::ProgMsg => Status,
        }
    }

    /// Name as used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            EventId::ErrMsg => "errmsg",
            EventId::EndStream => "end-stream",
            EventId::RemotePath => "remote-path",
            EventId::UseSchema => "use-schema",
            EventId::NewTable => "new-table",
            EventId::NewColumn => "new-column",
            EventId::OpenStream => "open-stream",
            EventId::CellDefault => "cell-default",
            EventId::CellData => "cell-data",
            EventId::NextRow => "next-row",
            EventId::MoveAhead => "move-ahead",
            EventId::ErrMsg2 => "errmsg2",
            EventId::RemotePath2 => "remote-path2",
            EventId::UseSchema2 => "use-schema2",
            EventId::NewTable2 => "new-table2",
            EventId::CellDefault2 => "cell-default2",
            EventId::CellData2 => "cell-data2",
            EventId::EmptyDefault => "empty-default",
            EventId::SoftwareName => "software-name",
            EventId::DbMetadataNode => "db-metadata-node",
            EventId::TblMetadataNode => "tbl-metadata-node",
            EventId::ColMetadataNode => "col-metadata-node",
            EventId::DbMetadataNode2 => "db-metadata-node2",
            EventId::TblMetadataNode2 => "tbl-metadata-node2",
            EventId::ColMetadataNode2 => "col-metadata-node2",
            EventId::AddMbrDb => "add-mbr-db",
            EventId::AddMbrTbl => "add-mbr-tbl",
            EventId::LogMsg => "logmsg",
            EventId::ProgMsg => "progmsg",
        }
    }
}
