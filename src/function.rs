//! Per-function descriptors and the fixed-stride `_functns.inf` reader.
//!
//! `_functns.inf` is a bare array of 416-byte little-endian records, one per
//! acquisition function, with function `n` (1-based) at byte offset
//! `(n - 1) * 416`. The on-disk scan count field is always written as zero
//! by the format, so the real scan count is derived from the size of the
//! function's scan index file instead.

use std::{
    fs::{self, File},
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::calibration::CalibrationEquation;
use crate::error::MassLynxError;
use crate::packing::{self, FunctionType, IonMode};
use crate::scan::scan_index_file_name;
use crate::utils::int32_to_unsigned;

pub const FUNCTION_INDEX_FILE_NAME: &str = "_functns.inf";

/// Fixed size of one `_functns.inf` record in bytes
pub const FUNCTION_RECORD_SIZE: u64 = 416;

/// The segment tables hold at most this many entries per function
pub const MAX_SEGMENT_COUNT: usize = 32;

/// One scan-time/mass-range triple from a segmented MS/MS acquisition
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSegment {
    pub scan_time: i64,
    pub start_mass: i64,
    pub end_mass: i64,
}

impl FunctionSegment {
    pub fn is_empty(&self) -> bool {
        self.scan_time == 0 && self.start_mass == 0 && self.end_mass == 0
    }
}

/// The decoded descriptor for one acquisition function, constructed once
/// during dataset validation and immutable afterwards.
///
/// Function numbers are 1-based throughout the public surface.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub function_number: usize,
    pub function_type: FunctionType,
    pub ion_mode: IonMode,
    /// Selects the scan index record layout for this function
    pub acquisition_data_type: i16,
    pub cycle_time_seconds: f32,
    pub inter_scan_delay_seconds: f32,
    pub start_rt_minutes: f32,
    pub end_rt_minutes: f32,
    /// Best-effort mass range derived from the segment tables; stays 0/0
    /// when no segment carries one
    pub start_mass: f64,
    pub end_mass: f64,
    /// Scan count derived from the scan index file size, never from the
    /// on-disk descriptor field
    pub scan_count: usize,
    pub msms_collision_energy: u16,
    pub segment_channel_count: u16,
    pub function_set_mass: f32,
    pub inter_segment_channel_time: f32,
    /// Populated segment triples, at most [`MAX_SEGMENT_COUNT`]
    pub segments: Vec<FunctionSegment>,
    /// Per-function calibration merged in from `_HEADER.TXT`
    pub calibration: CalibrationEquation,
}

impl FunctionDescriptor {
    pub fn function_type_label(&self) -> &'static str {
        self.function_type.label()
    }

    /// Whether this function acquires MS/MS spectra with a precursor set
    /// mass
    pub fn is_msms(&self) -> bool {
        self.function_type.is_msms()
    }
}

/// The raw field sequence of one `_functns.inf` record, before unpacking
#[derive(Debug, Default, Clone)]
pub(crate) struct RawFunctionRecord {
    pub packed_function_info: i16,
    pub cycle_time: f32,
    pub inter_scan_delay: f32,
    pub start_rt: f32,
    pub end_rt: f32,
    /// Always zero in practice; retained only so validation can log when a
    /// writer ever disagrees with the file-size-derived count
    pub scan_count_on_disk: i32,
    pub packed_msms_info: i16,
    pub function_set_mass: f32,
    pub inter_segment_channel_time: f32,
    pub segment_scan_times: [i32; MAX_SEGMENT_COUNT],
    pub segment_start_masses: [i32; MAX_SEGMENT_COUNT],
    pub segment_end_masses: [i32; MAX_SEGMENT_COUNT],
}

impl RawFunctionRecord {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut record = Self {
            packed_function_info: reader.read_i16::<LittleEndian>()?,
            cycle_time: reader.read_f32::<LittleEndian>()?,
            inter_scan_delay: reader.read_f32::<LittleEndian>()?,
            start_rt: reader.read_f32::<LittleEndian>()?,
            end_rt: reader.read_f32::<LittleEndian>()?,
            scan_count_on_disk: reader.read_i32::<LittleEndian>()?,
            packed_msms_info: reader.read_i16::<LittleEndian>()?,
            function_set_mass: reader.read_f32::<LittleEndian>()?,
            inter_segment_channel_time: reader.read_f32::<LittleEndian>()?,
            ..Default::default()
        };
        reader.read_i32_into::<LittleEndian>(&mut record.segment_scan_times)?;
        reader.read_i32_into::<LittleEndian>(&mut record.segment_start_masses)?;
        reader.read_i32_into::<LittleEndian>(&mut record.segment_end_masses)?;
        Ok(record)
    }

    /// An all-zero packed info word and timing block marks a slot the
    /// acquisition never filled in
    fn is_empty_slot(&self) -> bool {
        self.packed_function_info == 0
            && self.cycle_time == 0.0
            && self.inter_scan_delay == 0.0
            && self.start_rt == 0.0
            && self.end_rt == 0.0
    }

    fn unpack(&self, function_number: usize) -> FunctionDescriptor {
        let segment_channel_count = packing::msms_segment_channel_count(self.packed_msms_info);
        let segment_limit = (segment_channel_count as usize).min(MAX_SEGMENT_COUNT);

        let segments: Vec<FunctionSegment> = (0..segment_limit)
            .map(|i| FunctionSegment {
                scan_time: int32_to_unsigned(self.segment_scan_times[i]),
                start_mass: int32_to_unsigned(self.segment_start_masses[i]),
                end_mass: int32_to_unsigned(self.segment_end_masses[i]),
            })
            .collect();

        let start_mass = segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.start_mass)
            .filter(|&m| m > 0)
            .min()
            .unwrap_or(0) as f64;
        let end_mass = segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.end_mass)
            .max()
            .unwrap_or(0) as f64;

        FunctionDescriptor {
            function_number,
            function_type: packing::function_type(self.packed_function_info),
            ion_mode: packing::ion_mode(self.packed_function_info),
            acquisition_data_type: packing::acquisition_data_type(self.packed_function_info),
            cycle_time_seconds: self.cycle_time,
            inter_scan_delay_seconds: self.inter_scan_delay,
            start_rt_minutes: self.start_rt,
            end_rt_minutes: self.end_rt,
            start_mass,
            end_mass,
            scan_count: 0,
            msms_collision_energy: packing::msms_collision_energy(self.packed_msms_info),
            segment_channel_count,
            function_set_mass: self.function_set_mass,
            inter_segment_channel_time: self.inter_segment_channel_time,
            segments,
            calibration: CalibrationEquation::default(),
        }
    }
}

/// Derive the function count from the size of `_functns.inf`.
///
/// The file must be an exact multiple of the record size; a partial trailing
/// record makes the whole file unreadable.
pub fn function_count<P: AsRef<Path>>(directory: P) -> Result<usize, MassLynxError> {
    let path = directory.as_ref().join(FUNCTION_INDEX_FILE_NAME);
    let size = fs::metadata(&path)
        .map_err(|e| MassLynxError::directory_read(&path, e))?
        .len();
    if size % FUNCTION_RECORD_SIZE != 0 {
        return Err(MassLynxError::directory_read(
            &path,
            format!("{size} bytes is not a multiple of the {FUNCTION_RECORD_SIZE} byte record size"),
        ));
    }
    Ok((size / FUNCTION_RECORD_SIZE) as usize)
}

/// Read and unpack the descriptor for `function_number` (1-based).
///
/// The returned descriptor's `scan_count` is left at zero; the caller
/// derives it from the scan index file size.
pub fn read_function_record<P: AsRef<Path>>(
    directory: P,
    function_number: usize,
) -> Result<FunctionDescriptor, MassLynxError> {
    let directory = directory.as_ref();
    let count = function_count(directory)?;
    let path = directory.join(FUNCTION_INDEX_FILE_NAME);
    if function_number < 1 || function_number > count {
        return Err(MassLynxError::directory_read(
            &path,
            format!("function {function_number} is outside 1..={count}"),
        ));
    }

    let handle = File::open(&path).map_err(|e| MassLynxError::directory_read(&path, e))?;
    let mut reader = BufReader::new(handle);
    reader
        .seek(SeekFrom::Start((function_number as u64 - 1) * FUNCTION_RECORD_SIZE))
        .map_err(|e| MassLynxError::directory_read(&path, e))?;
    let record = RawFunctionRecord::read_from(&mut reader)
        .map_err(|e| MassLynxError::directory_read(&path, e))?;

    if record.is_empty_slot() {
        let index_path = directory.join(scan_index_file_name(function_number));
        if index_path.exists() {
            // Truncated metadata with real scan data behind it; accept the
            // function with an empty descriptor
            log::warn!(
                "Function {function_number} has an all-zero descriptor but {index_path:?} exists; \
                 accepting it with defaulted fields"
            );
            return Ok(FunctionDescriptor {
                function_number,
                ..Default::default()
            });
        }
        return Err(MassLynxError::directory_read(
            &path,
            format!(
                "function {function_number} has an all-zero descriptor and no scan index file"
            ),
        ));
    }

    let descriptor = record.unpack(function_number);
    if record.scan_count_on_disk != 0 {
        // The format writer always leaves this zero; anything else is worth
        // noting but the file-size-derived count stays authoritative
        log::debug!(
            "Function {function_number} stores scan count {} on disk; ignoring it",
            record.scan_count_on_disk
        );
    }
    Ok(descriptor)
}
