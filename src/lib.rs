//! A native reader for Waters/Micromass MassLynx `.raw` instrument data
//! directories, with no dependency on the vendor API.
//!
//! A MassLynx dataset is a directory holding a `$$`-keyed text header
//! (`_HEADER.TXT`), a fixed-stride array of per-function descriptor records
//! (`_functns.inf`), and one fixed-stride scan index per function
//! (`_func001.idx`, `_func002.idx`, ...). This crate decodes those three
//! auxiliary formats byte for byte: the legacy wrapped-integer fields, the
//! packed bit fields, the two acquisition-data-type-dependent scan record
//! layouts, and the `T<n>`-tagged calibration coefficient strings.
//!
//! ```no_run
//! use mzmasslynx::MassLynxReader;
//!
//! # fn main() -> Result<(), mzmasslynx::MassLynxError> {
//! let mut reader = MassLynxReader::new();
//! let path = "./QC_Shew_13_04.raw";
//! for n in 1..=reader.function_count(path) {
//!     let function = reader.function_info(path, n)?;
//!     println!("function {n}: {} with {} scans", function.function_type, function.scan_count);
//!     let first = reader.scan_info(path, n, 1)?;
//!     println!("  scan 1 TIC {} at {} min", first.tic, first.scan_time_minutes);
//! }
//! #    Ok(())
//! # }
//! ```

pub mod calibration;
pub mod error;
pub mod function;
pub mod header;
pub mod packing;
pub mod reader;
pub mod scan;
pub mod utils;

pub use crate::calibration::CalibrationEquation;
pub use crate::error::{MassLynxError, MassLynxErrorKind};
pub use crate::function::{FunctionDescriptor, FunctionSegment};
pub use crate::header::DatasetHeader;
pub use crate::packing::{FunctionType, IonMode, ScanFlags};
pub use crate::reader::{is_masslynx_data, MassLynxReader, ValidatedDataset};
pub use crate::scan::{ScanIndexRecord, ScanRecordLayout};
