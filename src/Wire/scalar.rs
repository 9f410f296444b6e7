use super::codec::bytes;
use super::Structs::Message_Structs::Range;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Excel error codes carried by [`ScalarValue::Err`].
pub mod xl_error {
    pub const NULL: i16 = 0;
    pub const DIV0: i16 = 7;
    pub const VALUE: i16 = 15;
    pub const REF: i16 = 23;
    pub const NAME: i16 = 29;
    pub const NUM: i16 = 36;
    pub const NA: i16 = 42;
    pub const GETTING_DATA: i16 = 43;
}

/// Any value exchanged with the host. Exactly one variant is active.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    #[default]
    None,
    Bool(bool),
    Int(i32),
    Num(f64),
    Str(String),
    Err(i16),
    Nil,
    Grid(Grid),
    NumGrid(NumGrid),
    Range(Range),
    RefCacheRef(String),
    AsyncHandle(#[serde(with = "bytes")] Vec<u8>),
}

/// Element of a [`Grid`]. Grids never nest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellScalar {
    #[default]
    Nil,
    Bool(bool),
    Int(i32),
    Num(f64),
    Str(String),
    Err(i16),
    AsyncHandle(#[serde(with = "bytes")] Vec<u8>),
}

/// Row-major block of mixed values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
    pub data: Vec<CellScalar>,
}

/// Row-major block of numbers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NumGrid {
    pub rows: i32,
    pub cols: i32,
    pub data: Vec<f64>,
}

/// The subset of [`ScalarValue`] that can be expanded cell by cell.
///
/// Hashable so identical values can be grouped before meshing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlainScalar {
    Bool(bool),
    Int(i32),
    Num(OrderedFloat<f64>),
    Str(String),
    Err(i16),
}

impl ScalarValue {
    /// Returns the cell-expandable form of this value, if it has one.
    pub fn as_plain(&self) -> Option<PlainScalar> {
        match self {
            ScalarValue::Bool(v) => Some(PlainScalar::Bool(*v)),
            ScalarValue::Int(v) => Some(PlainScalar::Int(*v)),
            ScalarValue::Num(v) => Some(PlainScalar::Num(OrderedFloat(*v))),
            ScalarValue::Str(v) => Some(PlainScalar::Str(v.clone())),
            ScalarValue::Err(v) => Some(PlainScalar::Err(*v)),
            ScalarValue::None
            | ScalarValue::Nil
            | ScalarValue::Grid(_)
            | ScalarValue::NumGrid(_)
            | ScalarValue::Range(_)
            | ScalarValue::RefCacheRef(_)
            | ScalarValue::AsyncHandle(_) => None,
        }
    }
}

impl From<PlainScalar> for ScalarValue {
    fn from(v: PlainScalar) -> Self {
        match v {
            PlainScalar::Bool(b) => ScalarValue::Bool(b),
            PlainScalar::Int(i) => ScalarValue::Int(i),
            PlainScalar::Num(n) => ScalarValue::Num(n.into_inner()),
            PlainScalar::Str(s) => ScalarValue::Str(s),
            PlainScalar::Err(e) => ScalarValue::Err(e),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Num(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Str(v)
    }
}
