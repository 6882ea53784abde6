//! Cell addressing, values, storage, and structural-edit translation

pub mod address;
pub mod shift;
pub mod storage;
pub mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use shift::{translate_address, translate_position, translate_range, ShiftOp, Translation};
pub use storage::{CellData, CellStorage};
pub use value::{CellError, CellValue, SharedString};
