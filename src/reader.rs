//! The dataset session: validation, caching, and the public query surface.
//!
//! A [`MassLynxReader`] owns at most one [`ValidatedDataset`] at a time.
//! Validating a path decodes the header and every function descriptor in one
//! pass and replaces the cache wholesale; re-validating the same path is a
//! no-op, so repeated queries against one dataset parse its metadata only
//! once. Scan index records are never cached and are read by direct offset
//! seek per query.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::calibration::CalibrationEquation;
use crate::error::{MassLynxError, MassLynxErrorKind};
use crate::function::{self, FunctionDescriptor, FUNCTION_INDEX_FILE_NAME};
use crate::header::{DatasetHeader, HEADER_FILE_NAME};
use crate::scan::{self, ScanIndexRecord};

/// Matches the per-function calibration header keys, e.g. `CAL FUNCTION 2`
/// and `CAL STDDEV FUNCTION 2`
fn cal_function_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^CAL (STDDEV )?FUNCTION (\d+)$").expect("the pattern is valid")
    })
}

/// Check whether `path` names a MassLynx raw data directory (or a file
/// inside one).
///
/// MassLynx datasets are directories; the function descriptor index
/// `_functns.inf` is the one file every readable dataset must have.
pub fn is_masslynx_data<P: AsRef<Path>>(path: P) -> bool {
    match resolve_directory(path.as_ref()) {
        Ok(directory) => directory.join(FUNCTION_INDEX_FILE_NAME).is_file(),
        Err(_) => false,
    }
}

/// Resolve a dataset path to its directory, stepping up to the parent when
/// the path names a file inside the dataset
fn resolve_directory(path: &Path) -> Result<PathBuf, MassLynxError> {
    let invalid = || MassLynxError::InvalidDirectory {
        path: path.to_path_buf(),
    };
    let meta = std::fs::metadata(path).map_err(|_| invalid())?;
    if meta.is_dir() {
        Ok(path.to_path_buf())
    } else {
        let parent = path.parent().filter(|p| p.is_dir()).ok_or_else(invalid)?;
        Ok(parent.to_path_buf())
    }
}

/// The fully decoded metadata of one dataset directory: header, function
/// table, and the path it was read from. Constructed by
/// [`MassLynxReader::validate`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDataset {
    path: PathBuf,
    header: DatasetHeader,
    /// Stored 0-based; the public boundary is 1-based
    functions: Vec<FunctionDescriptor>,
}

impl ValidatedDataset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Look up the descriptor for `function_number` (1-based)
    pub fn function(&self, function_number: usize) -> Option<&FunctionDescriptor> {
        function_number
            .checked_sub(1)
            .and_then(|i| self.functions.get(i))
    }

    pub fn functions(&self) -> &[FunctionDescriptor] {
        &self.functions
    }

    /// Decode everything validation needs from `directory`. Returns the
    /// dataset plus an advisory error kind when the header existed but
    /// could not be read (a condition that does not fail validation).
    fn from_directory(directory: &Path) -> Result<(Self, Option<MassLynxErrorKind>), MassLynxError> {
        let (header, header_warning) = match DatasetHeader::from_directory(directory) {
            Ok(header) => (header, None),
            Err(MassLynxError::HeaderRead { source })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                // No header at all is normal enough; every field defaults
                log::debug!("{directory:?} has no {HEADER_FILE_NAME}; using a default header");
                (DatasetHeader::default(), None)
            }
            Err(e) => {
                log::warn!("Could not read {HEADER_FILE_NAME} in {directory:?}: {e}");
                (DatasetHeader::default(), Some(e.kind()))
            }
        };

        let count = function::function_count(directory)?;
        let mut functions = Vec::with_capacity(count);
        for function_number in 1..=count {
            let mut descriptor = function::read_function_record(directory, function_number)?;
            descriptor.scan_count = match scan::scan_count(directory, function_number) {
                Ok(count) => count,
                Err(e) => {
                    log::warn!("No usable scan index for function {function_number}: {e}");
                    0
                }
            };
            functions.push(descriptor);
        }

        let mut dataset = Self {
            path: directory.to_path_buf(),
            header,
            functions,
        };
        dataset.merge_function_calibrations(directory);
        Ok((dataset, header_warning))
    }

    /// Second pass over `_HEADER.TXT` for `CAL FUNCTION <n>` and
    /// `CAL STDDEV FUNCTION <n>` lines, merged into the matching function's
    /// calibration. Read problems here are ignored; the first pass already
    /// decided how much header there is.
    fn merge_function_calibrations(&mut self, directory: &Path) {
        let Ok(handle) = File::open(directory.join(HEADER_FILE_NAME)) else {
            return;
        };
        for line in BufReader::new(handle).lines() {
            let Ok(line) = line else {
                return;
            };
            let Some((key, value)) = crate::header::split_header_line(&line) else {
                continue;
            };
            let Some(captures) = cal_function_key_pattern().captures(key) else {
                continue;
            };
            let is_std_dev = captures.get(1).is_some();
            let Some(function_number) = captures[2].parse::<usize>().ok().filter(|&n| n >= 1)
            else {
                continue;
            };
            let Some(descriptor) = self
                .functions
                .get_mut(function_number - 1) else {
                log::debug!(
                    "Header calibration for function {function_number} has no matching function"
                );
                continue;
            };
            if is_std_dev {
                descriptor.calibration.std_dev = value.parse().unwrap_or_default();
            } else {
                let parsed = CalibrationEquation::parse(value);
                descriptor.calibration.coefficients = parsed.coefficients;
                descriptor.calibration.calibration_type = parsed.calibration_type;
            }
        }
    }
}

/// A session over MassLynx datasets.
///
/// Every query takes the dataset path and re-validates it first; validation
/// against the currently cached path is free. The session is not safe for
/// concurrent use from multiple threads, as queries mutate the cache; use
/// one reader per thread or an external lock.
#[derive(Debug, Default)]
pub struct MassLynxReader {
    dataset: Option<ValidatedDataset>,
    last_error: Option<MassLynxErrorKind>,
}

impl MassLynxReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The category of the most recent failure, or the advisory
    /// header-read condition from the most recent validation
    pub fn last_error(&self) -> Option<MassLynxErrorKind> {
        self.last_error
    }

    /// The currently cached dataset, if the last validation succeeded
    pub fn dataset(&self) -> Option<&ValidatedDataset> {
        self.dataset.as_ref()
    }

    /// Validate `path` as a MassLynx dataset directory, decoding its header
    /// and function table into the session cache.
    ///
    /// Re-validating the cached path (compared case-insensitively) is a
    /// short-circuit success. Any failure clears the cache entirely.
    pub fn validate<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MassLynxError> {
        let directory = match resolve_directory(path.as_ref()) {
            Ok(directory) => directory,
            Err(e) => {
                self.dataset = None;
                self.last_error = Some(e.kind());
                return Err(e);
            }
        };

        if let Some(dataset) = &self.dataset {
            if paths_match(dataset.path(), &directory) {
                return Ok(());
            }
        }

        self.dataset = None;
        match ValidatedDataset::from_directory(&directory) {
            Ok((dataset, header_warning)) => {
                self.last_error = header_warning;
                self.dataset = Some(dataset);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.kind());
                Err(e)
            }
        }
    }

    /// The number of acquisition functions in the dataset, or 0 when the
    /// path fails to validate
    pub fn function_count<P: AsRef<Path>>(&mut self, path: P) -> usize {
        match self.validate(path) {
            Ok(()) => self.dataset.as_ref().map(|d| d.function_count()).unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// The descriptor for `function_number` (1-based)
    pub fn function_info<P: AsRef<Path>>(
        &mut self,
        path: P,
        function_number: usize,
    ) -> Result<FunctionDescriptor, MassLynxError> {
        self.validate(&path)?;
        let outcome = match self.dataset.as_ref() {
            Some(dataset) => match dataset.function(function_number) {
                Some(descriptor) => Ok(descriptor.clone()),
                None => Err(MassLynxError::directory_read(
                    dataset.path(),
                    format!(
                        "function {function_number} is outside 1..={}",
                        dataset.function_count()
                    ),
                )),
            },
            None => Err(MassLynxError::InvalidDirectory {
                path: path.as_ref().to_path_buf(),
            }),
        };
        if let Err(e) = &outcome {
            self.last_error = Some(e.kind());
        }
        outcome
    }

    /// The scan count for `function_number`, derived from the index file
    /// size at validation time; 0 on any failure
    pub fn num_scans<P: AsRef<Path>>(&mut self, path: P, function_number: usize) -> usize {
        self.function_info(path, function_number)
            .map(|d| d.scan_count)
            .unwrap_or(0)
    }

    /// The index record for one scan (both numbers 1-based), with the
    /// precursor set mass filled in for MS/MS-bearing functions
    pub fn scan_info<P: AsRef<Path>>(
        &mut self,
        path: P,
        function_number: usize,
        scan_number: usize,
    ) -> Result<ScanIndexRecord, MassLynxError> {
        let descriptor = self.function_info(&path, function_number)?;
        let directory = match self.dataset.as_ref() {
            Some(dataset) => dataset.path().to_path_buf(),
            None => path.as_ref().to_path_buf(),
        };
        match scan::read_scan_record(&directory, &descriptor, scan_number) {
            Ok(mut record) => {
                if descriptor.is_msms() {
                    record.set_mass = descriptor.function_set_mass;
                }
                Ok(record)
            }
            Err(e) => {
                self.last_error = Some(e.kind());
                Err(e)
            }
        }
    }

    /// The acquisition header for the dataset. Defaults for every field the
    /// header file does not supply.
    pub fn file_info<P: AsRef<Path>>(&mut self, path: P) -> Result<DatasetHeader, MassLynxError> {
        self.validate(&path)?;
        match self.dataset.as_ref() {
            Some(dataset) => Ok(dataset.header().clone()),
            None => Err(MassLynxError::InvalidDirectory {
                path: path.as_ref().to_path_buf(),
            }),
        }
    }
}

/// The legacy cache key is a case-insensitive path-string comparison
fn paths_match(cached: &Path, requested: &Path) -> bool {
    cached
        .to_string_lossy()
        .eq_ignore_ascii_case(&requested.to_string_lossy())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_paths_match_is_case_insensitive() {
        assert!(paths_match(
            Path::new("/data/sample.raw"),
            Path::new("/data/SAMPLE.RAW")
        ));
        assert!(!paths_match(
            Path::new("/data/sample.raw"),
            Path::new("/data/other.raw")
        ));
    }

    #[test]
    fn test_cal_function_key_pattern() {
        let pattern = cal_function_key_pattern();
        let captures = pattern.captures("CAL FUNCTION 3").unwrap();
        assert!(captures.get(1).is_none());
        assert_eq!(&captures[2], "3");

        let captures = pattern.captures("Cal StdDev Function 12").unwrap();
        assert!(captures.get(1).is_some());
        assert_eq!(&captures[2], "12");

        assert!(pattern.captures("CAL MS1 STATIC").is_none());
        assert!(pattern.captures("CAL FUNCTION").is_none());
    }

    #[test]
    fn test_invalid_directory() {
        let mut reader = MassLynxReader::new();
        let err = reader.validate("/no/such/place.raw").unwrap_err();
        assert_eq!(err.kind(), MassLynxErrorKind::InvalidDirectory);
        assert_eq!(reader.last_error(), Some(MassLynxErrorKind::InvalidDirectory));
        assert!(reader.dataset().is_none());
        assert_eq!(reader.function_count("/no/such/place.raw"), 0);
    }
}
