//! Per-scan index records and the fixed-stride `_func<NNN>.idx` reader.
//!
//! Each function has its own index file of 22-byte little-endian records,
//! one per scan, with scan `n` (1-based) at byte offset `(n - 1) * 22`. The
//! record layout is not self-describing: the owning function's acquisition
//! data type selects between two mutually exclusive field sequences, so a
//! populated [`FunctionDescriptor`] is required to decode anything.

use std::{
    fs::{self, File},
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::MassLynxError;
use crate::function::FunctionDescriptor;
use crate::packing::{self, ScanFlags};
use crate::utils::int32_to_unsigned;

/// Fixed size of one `_func<NNN>.idx` record in bytes
pub const SCAN_RECORD_SIZE: u64 = 22;

/// The scan index file name for `function_number`, zero-padded to three
/// digits (`_func001.idx`)
pub fn scan_index_file_name(function_number: usize) -> String {
    format!("_func{function_number:03}.idx")
}

/// Which of the two on-disk scan record layouts a function uses, resolved
/// once from the function descriptor's acquisition data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRecordLayout {
    /// Acquisition data type 0. The base peak intensity has no field of its
    /// own; mass and intensity are both packed into the info word, followed
    /// by a spare i16.
    Compressed,
    /// Any nonzero acquisition data type. Carries a separate packed base
    /// peak intensity mantissa ahead of the info word.
    Standard,
}

impl ScanRecordLayout {
    pub fn for_acquisition_data_type(acquisition_data_type: i16) -> Self {
        if acquisition_data_type == 0 {
            Self::Compressed
        } else {
            Self::Standard
        }
    }
}

impl From<&FunctionDescriptor> for ScanRecordLayout {
    fn from(descriptor: &FunctionDescriptor) -> Self {
        Self::for_acquisition_data_type(descriptor.acquisition_data_type)
    }
}

/// One decoded scan index record. Read on demand per query and not cached.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanIndexRecord {
    /// Byte offset of the scan's raw data blob in the function's data file
    pub data_offset: i64,
    pub peak_count: u32,
    pub segment_number: u16,
    pub flags: ScanFlags,
    pub tic: f32,
    pub scan_time_minutes: f32,
    pub base_peak_intensity: f32,
    pub base_peak_mass: f64,
    /// Not stored in the index record; stays 0 unless a later data-file
    /// decode fills it
    pub low_mass: f32,
    pub high_mass: f32,
    /// MS/MS precursor set mass, filled from the owning function's
    /// descriptor rather than the record itself
    pub set_mass: f32,
}

impl ScanIndexRecord {
    pub fn uses_following_continuum(&self) -> bool {
        self.flags.contains(ScanFlags::USES_FOLLOWING_CONTINUUM)
    }

    pub fn continuum_data_override(&self) -> bool {
        self.flags.contains(ScanFlags::CONTINUUM_DATA_OVERRIDE)
    }

    pub fn contains_molecular_masses(&self) -> bool {
        self.flags.contains(ScanFlags::CONTAINS_MOLECULAR_MASSES)
    }

    pub fn contains_calibrated_masses(&self) -> bool {
        self.flags.contains(ScanFlags::CONTAINS_CALIBRATED_MASSES)
    }

    pub fn is_overloaded(&self) -> bool {
        self.flags.contains(ScanFlags::OVERLOAD)
    }
}

/// Derive the scan count for `function_number` from its index file size.
///
/// The file must be an exact multiple of the record size; a partial trailing
/// record makes the index unreadable for that function.
pub fn scan_count<P: AsRef<Path>>(
    directory: P,
    function_number: usize,
) -> Result<usize, MassLynxError> {
    let path = directory.as_ref().join(scan_index_file_name(function_number));
    let size = fs::metadata(&path)
        .map_err(|e| MassLynxError::directory_read(&path, e))?
        .len();
    if size % SCAN_RECORD_SIZE != 0 {
        return Err(MassLynxError::directory_read(
            &path,
            format!("{size} bytes is not a multiple of the {SCAN_RECORD_SIZE} byte record size"),
        ));
    }
    Ok((size / SCAN_RECORD_SIZE) as usize)
}

/// Read and decode the index record for one scan of a function.
///
/// `scan_number` is 1-based; values below 1 are clamped up to 1 to match the
/// legacy reader, while values beyond the file-derived scan count fail.
pub fn read_scan_record<P: AsRef<Path>>(
    directory: P,
    function: &FunctionDescriptor,
    scan_number: usize,
) -> Result<ScanIndexRecord, MassLynxError> {
    let directory = directory.as_ref();
    let scan_number = if scan_number < 1 {
        log::debug!(
            "Scan number {scan_number} for function {} clamped up to 1",
            function.function_number
        );
        1
    } else {
        scan_number
    };

    let count = scan_count(directory, function.function_number)?;
    let path = directory.join(scan_index_file_name(function.function_number));
    if scan_number > count {
        return Err(MassLynxError::directory_read(
            &path,
            format!("scan {scan_number} is beyond the {count} scans on disk"),
        ));
    }

    let handle = File::open(&path).map_err(|e| MassLynxError::directory_read(&path, e))?;
    let mut reader = BufReader::new(handle);
    reader
        .seek(SeekFrom::Start((scan_number as u64 - 1) * SCAN_RECORD_SIZE))
        .map_err(|e| MassLynxError::directory_read(&path, e))?;

    decode_record(&mut reader, function).map_err(|e| MassLynxError::directory_read(&path, e))
}

fn decode_record<R: Read>(
    reader: &mut R,
    function: &FunctionDescriptor,
) -> std::io::Result<ScanIndexRecord> {
    let layout = ScanRecordLayout::from(function);

    let start_scan_offset = reader.read_i32::<LittleEndian>()?;
    let packed_scan_info = reader.read_i32::<LittleEndian>()?;
    let tic = reader.read_f32::<LittleEndian>()?;
    let scan_time = reader.read_f32::<LittleEndian>()?;
    let (packed_base_peak_intensity, packed_base_peak_info) = match layout {
        ScanRecordLayout::Compressed => {
            let info = reader.read_i32::<LittleEndian>()?;
            let _spare = reader.read_i16::<LittleEndian>()?;
            (0, info)
        }
        ScanRecordLayout::Standard => {
            let intensity = reader.read_i16::<LittleEndian>()?;
            let info = reader.read_i32::<LittleEndian>()?;
            (intensity, info)
        }
    };

    Ok(ScanIndexRecord {
        data_offset: int32_to_unsigned(start_scan_offset),
        peak_count: packing::scan_peak_count(packed_scan_info),
        segment_number: packing::scan_segment_number(packed_scan_info),
        flags: packing::scan_flags(packed_scan_info),
        tic,
        scan_time_minutes: scan_time,
        base_peak_intensity: packing::unpack_base_peak_intensity(
            packed_base_peak_intensity,
            packed_base_peak_info,
            function.acquisition_data_type,
        ),
        base_peak_mass: packing::unpack_base_peak_mass(
            packed_base_peak_info,
            function.acquisition_data_type,
        ),
        ..Default::default()
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::function::FunctionDescriptor;

    fn encode_standard_record(
        offset: i32,
        packed_scan_info: i32,
        tic: f32,
        scan_time: f32,
        packed_intensity: i16,
        packed_info: i32,
    ) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SCAN_RECORD_SIZE as usize);
        buffer.extend(offset.to_le_bytes());
        buffer.extend(packed_scan_info.to_le_bytes());
        buffer.extend(tic.to_le_bytes());
        buffer.extend(scan_time.to_le_bytes());
        buffer.extend(packed_intensity.to_le_bytes());
        buffer.extend(packed_info.to_le_bytes());
        assert_eq!(buffer.len(), SCAN_RECORD_SIZE as usize);
        buffer
    }

    fn encode_compressed_record(
        offset: i32,
        packed_scan_info: i32,
        tic: f32,
        scan_time: f32,
        packed_info: i32,
    ) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SCAN_RECORD_SIZE as usize);
        buffer.extend(offset.to_le_bytes());
        buffer.extend(packed_scan_info.to_le_bytes());
        buffer.extend(tic.to_le_bytes());
        buffer.extend(scan_time.to_le_bytes());
        buffer.extend(packed_info.to_le_bytes());
        buffer.extend(0i16.to_le_bytes());
        assert_eq!(buffer.len(), SCAN_RECORD_SIZE as usize);
        buffer
    }

    fn function_with_data_type(acquisition_data_type: i16) -> FunctionDescriptor {
        FunctionDescriptor {
            function_number: 1,
            acquisition_data_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_layout_selection() {
        assert_eq!(
            ScanRecordLayout::for_acquisition_data_type(0),
            ScanRecordLayout::Compressed
        );
        for data_type in [1, 3, 8, 12] {
            assert_eq!(
                ScanRecordLayout::for_acquisition_data_type(data_type),
                ScanRecordLayout::Standard
            );
        }
    }

    #[test]
    fn test_scan_count_from_file_size() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        std::fs::write(
            tmpdir.path().join(scan_index_file_name(1)),
            vec![0u8; 5 * SCAN_RECORD_SIZE as usize],
        )?;
        assert_eq!(scan_count(tmpdir.path(), 1).unwrap(), 5);
        assert!(scan_count(tmpdir.path(), 2).is_err());

        std::fs::write(
            tmpdir.path().join(scan_index_file_name(2)),
            vec![0u8; SCAN_RECORD_SIZE as usize + 3],
        )?;
        assert!(scan_count(tmpdir.path(), 2).is_err());
        Ok(())
    }

    #[test]
    fn test_decode_standard_layout() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        let packed_scan_info = 850
            | (2 << 22)
            | ScanFlags::CONTAINS_CALIBRATED_MASSES.bits() as i32
            | ScanFlags::OVERLOAD.bits() as i32;
        // base peak: mantissa 4978 * 2^-3 = 622.25, intensity 1200 * 4^1
        let packed_info = crate::utils::int32_from_unsigned((4978i64 << 9) | ((20 << 4) | 1) as i64);
        let mut bytes =
            encode_standard_record(1024, packed_scan_info, 8.5e4, 12.25, 1200, packed_info);
        bytes.extend(encode_standard_record(2048, 10, 100.0, 12.5, 5, 0));
        std::fs::write(tmpdir.path().join(scan_index_file_name(1)), &bytes)?;

        let function = function_with_data_type(3);
        let record = read_scan_record(tmpdir.path(), &function, 1).unwrap();
        assert_eq!(record.data_offset, 1024);
        assert_eq!(record.peak_count, 850);
        assert_eq!(record.segment_number, 2);
        assert!(record.contains_calibrated_masses());
        assert!(record.is_overloaded());
        assert!(!record.uses_following_continuum());
        assert_eq!(record.tic, 8.5e4);
        assert_eq!(record.scan_time_minutes, 12.25);
        assert_eq!(record.base_peak_intensity, 4800.0);
        assert!((record.base_peak_mass - 622.25).abs() < 1e-9);
        assert_eq!(record.low_mass, 0.0);
        assert_eq!(record.set_mass, 0.0);

        let second = read_scan_record(tmpdir.path(), &function, 2).unwrap();
        assert_eq!(second.data_offset, 2048);
        assert_eq!(second.peak_count, 10);
        Ok(())
    }

    #[test]
    fn test_decode_compressed_layout() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        // mass 500.0 Da -> 4000 eighth-Da steps; intensity 150 * 4^2
        let packed_info = crate::utils::int32_from_unsigned((4000i64 << 11) | (150 << 3) | 2);
        let bytes = encode_compressed_record(64, 33, 1.5e3, 0.75, packed_info);
        std::fs::write(tmpdir.path().join(scan_index_file_name(1)), &bytes)?;

        let function = function_with_data_type(0);
        let record = read_scan_record(tmpdir.path(), &function, 1).unwrap();
        assert_eq!(record.data_offset, 64);
        assert_eq!(record.peak_count, 33);
        assert_eq!(record.tic, 1.5e3);
        assert_eq!(record.base_peak_intensity, 150.0 * 16.0);
        assert!((record.base_peak_mass - 500.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_layout_changes_decoding_of_identical_bytes() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        let bytes = encode_standard_record(64, 5, 10.0, 1.0, 321, 0x0012_3456);
        std::fs::write(tmpdir.path().join(scan_index_file_name(1)), &bytes)?;

        let standard = read_scan_record(tmpdir.path(), &function_with_data_type(2), 1).unwrap();
        let compressed = read_scan_record(tmpdir.path(), &function_with_data_type(0), 1).unwrap();
        assert_eq!(standard.data_offset, compressed.data_offset);
        assert_ne!(standard.base_peak_intensity, compressed.base_peak_intensity);
        assert_ne!(standard.base_peak_mass, compressed.base_peak_mass);
        Ok(())
    }

    #[test]
    fn test_scan_number_clamping_and_bounds() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        let bytes = encode_compressed_record(64, 1, 10.0, 1.0, 0);
        std::fs::write(tmpdir.path().join(scan_index_file_name(1)), &bytes)?;

        let function = function_with_data_type(0);
        // scan 0 clamps to scan 1
        let clamped = read_scan_record(tmpdir.path(), &function, 0).unwrap();
        assert_eq!(clamped.data_offset, 64);
        // beyond the file-derived count fails
        assert!(read_scan_record(tmpdir.path(), &function, 2).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_index_file_fails() {
        let tmpdir = tempfile::tempdir().unwrap();
        let function = function_with_data_type(1);
        let err = read_scan_record(tmpdir.path(), &function, 1).unwrap_err();
        assert_eq!(err.kind(), crate::MassLynxErrorKind::DirectoryRead);
    }
}
