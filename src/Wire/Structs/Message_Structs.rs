// Wire shapes exchanged with the host. Every struct here is encoded with
// crate::Wire::codec; byte fields travel as CBOR byte strings.

use crate::Wire::codec::bytes;
use crate::Wire::scalar::ScalarValue;
use serde::{Deserialize, Serialize};

/// A single grid coordinate. Ordering is row-major.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Inclusive, axis-aligned block of cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub row_first: i32,
    pub row_last: i32,
    pub col_first: i32,
    pub col_last: i32,
}

impl Rect {
    pub fn new(row_first: i32, row_last: i32, col_first: i32, col_last: i32) -> Self {
        Self {
            row_first,
            row_last,
            col_first,
            col_last,
        }
    }

    pub fn single(cell: Cell) -> Self {
        Self::new(cell.row, cell.row, cell.col, cell.col)
    }

    /// Number of cells covered. Inverted bounds cover nothing.
    pub fn cell_count(&self) -> u64 {
        if self.row_last < self.row_first || self.col_last < self.col_first {
            return 0;
        }
        let rows = (self.row_last as i64 - self.row_first as i64 + 1) as u64;
        let cols = (self.col_last as i64 - self.col_first as i64 + 1) as u64;
        rows.saturating_mul(cols)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (self.row_first..=self.row_last).contains(&cell.row)
            && (self.col_first..=self.col_last).contains(&cell.col)
    }

    /// Row-major iteration over every covered cell.
    pub fn cells(&self) -> impl Iterator<Item = Cell> {
        let (cf, cl) = (self.col_first, self.col_last);
        (self.row_first..=self.row_last)
            .flat_map(move |row| (cf..=cl).map(move |col| Cell { row, col }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub sheet_name: String,
    pub rects: Vec<Rect>,
}

impl Range {
    pub fn new(sheet_name: impl Into<String>, rects: Vec<Rect>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            rects,
        }
    }

    pub fn cell_count(&self) -> u64 {
        self.rects
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.cell_count()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub id: u64,
    pub ok: bool,
}

/// One window of a fragmented transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: u64,
    pub total_size: u32,
    pub offset: u32,
    #[serde(with = "bytes")]
    pub data: Vec<u8>,
    /// Message type of the reassembled payload.
    pub inner_type: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRefCacheRequest {
    pub key: String,
    #[serde(with = "bytes")]
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtdConnectRequest {
    pub topic_id: i32,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub new_values: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtdDisconnectRequest {
    pub topic_id: i32,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub new_values: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtdConnectResponse {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RtdUpdate {
    pub topic_id: i32,
    pub value: ScalarValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AsyncOutcome {
    Result(ScalarValue),
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsyncResult {
    #[serde(with = "bytes")]
    pub handle: Vec<u8>,
    pub outcome: AsyncOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchAsyncResponse {
    pub results: Vec<AsyncResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetCommand {
    pub target: Range,
    pub value: ScalarValue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCommand {
    pub target: Range,
    pub format: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Set(SetCommand),
    Format(FormatCommand),
}

impl Command {
    pub fn target(&self) -> &Range {
        match self {
            Command::Set(cmd) => &cmd.target,
            Command::Format(cmd) => &cmd.target,
        }
    }
}

/// Commands the host applies once a calculation cycle has ended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleEndResponse {
    pub commands: Vec<Command>,
}
