//! The acquisition-level metadata stored in a dataset's `_HEADER.TXT`.
//!
//! The header is a permissive line-oriented text format. Only lines of the
//! shape `$$ <KEY>: <value>` mean anything; everything else, including keys
//! this reader does not know, is skipped. Absent keys are normal and leave
//! the corresponding field at its default.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::calibration::CalibrationEquation;
use crate::error::MassLynxError;

pub const HEADER_FILE_NAME: &str = "_HEADER.TXT";

const LINE_MARKER: &str = "$$ ";

/// Acquisition metadata for a MassLynx dataset, parsed once per directory
/// validation and immutable afterwards
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DatasetHeader {
    pub version: String,
    pub acquired_name: String,
    pub acquired_date: String,
    pub acquired_time: String,
    pub job_code: String,
    pub task_code: String,
    pub user_name: String,
    pub laboratory_name: String,
    pub instrument: String,
    pub instrument_type: String,
    pub conditions: String,
    pub sample_description: String,
    pub solvent_delay_minutes: f32,
    pub submitter: String,
    pub sample_id: String,
    pub bottle_number: String,
    pub plate_description: String,
    /// Multiplexer stream number, 0 when not multiplexed
    pub mux_stream: i32,
    /// Static MS1 calibration from the `CAL MS1 STATIC` key
    pub cal_ms1_static: CalibrationEquation,
    /// Static MS2 calibration from the `CAL MS2 STATIC` key
    pub cal_ms2_static: CalibrationEquation,
}

impl DatasetHeader {
    /// Read `_HEADER.TXT` from `directory`.
    ///
    /// Fails only when the file cannot be opened or read; a file with no
    /// recognized lines parses to an all-default header.
    pub fn from_directory<P: AsRef<Path>>(directory: P) -> Result<Self, MassLynxError> {
        let path = directory.as_ref().join(HEADER_FILE_NAME);
        let handle = File::open(&path).map_err(|source| MassLynxError::HeaderRead { source })?;
        let reader = BufReader::new(handle);

        let mut header = Self::default();
        for line in reader.lines() {
            let line = line.map_err(|source| MassLynxError::HeaderRead { source })?;
            header.ingest_line(&line);
        }
        Ok(header)
    }

    fn ingest_line(&mut self, line: &str) {
        let Some((key, value)) = split_header_line(line) else {
            return;
        };
        match key.to_ascii_uppercase().as_str() {
            "VERSION" => self.version = value.to_string(),
            "ACQUIRED NAME" => self.acquired_name = value.to_string(),
            "ACQUIRED DATE" => self.acquired_date = value.to_string(),
            "ACQUIRED TIME" => self.acquired_time = value.to_string(),
            "JOB CODE" => self.job_code = value.to_string(),
            "TASK CODE" => self.task_code = value.to_string(),
            "USER NAME" => self.user_name = value.to_string(),
            "LABORATORY NAME" => self.laboratory_name = value.to_string(),
            "INSTRUMENT" => self.instrument = value.to_string(),
            "INSTRUMENT TYPE" => self.instrument_type = value.to_string(),
            "CONDITIONS" => self.conditions = value.to_string(),
            "SAMPLE DESCRIPTION" => self.sample_description = value.to_string(),
            "SOLVENT DELAY" => {
                self.solvent_delay_minutes = value.parse().unwrap_or_default();
            }
            "SUBMITTER" => self.submitter = value.to_string(),
            "SAMPLEID" => self.sample_id = value.to_string(),
            "BOTTLE NUMBER" => self.bottle_number = value.to_string(),
            "PLATE DESC" => self.plate_description = value.to_string(),
            "MUX STREAM" => self.mux_stream = value.parse().unwrap_or_default(),
            "CAL MS1 STATIC" => self.cal_ms1_static = CalibrationEquation::parse(value),
            "CAL MS2 STATIC" => self.cal_ms2_static = CalibrationEquation::parse(value),
            other => {
                log::trace!("Skipping unrecognized header key {other:?}");
            }
        }
    }

    /// Combine the acquired date and time strings into a timestamp, when
    /// both are present and parseable (`02-Mar-2006` / `14:33:08`)
    pub fn acquired_datetime(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.acquired_date.trim(), "%d-%b-%Y").ok()?;
        let time = self.acquired_time.trim();
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .ok()?;
        Some(date.and_time(time))
    }
}

/// Split a `$$ <KEY>: <value>` header line into its key and value, or
/// `None` for any other line shape
pub(crate) fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(LINE_MARKER)?;
    let (key, value) = rest.split_once(':')?;
    Some((key.trim(), value.trim()))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_header(dir: &Path, lines: &[&str]) {
        let mut fh = std::fs::File::create(dir.join(HEADER_FILE_NAME)).unwrap();
        for line in lines {
            writeln!(fh, "{line}").unwrap();
        }
    }

    #[test]
    fn test_parse_header() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        write_header(
            tmpdir.path(),
            &[
                "$$ Version: 01.00",
                "$$ Acquired Name: QC_Shew_13_04",
                "$$ Acquired Date: 02-Mar-2006",
                "$$ Acquired Time: 14:33:08",
                "$$ Instrument: Q-TOF Premier",
                "$$ Sample Description: QC standard",
                "$$ Solvent Delay: 2.5",
                "$$ MUX Stream: 3",
                "$$ Cal MS1 Static: 0.0,1.0,T1",
                "$$ Cal Function 1: 0.1,0.9,T1",
                "$$ Some Future Key: ignored",
                "not a header line",
            ],
        );

        let header = DatasetHeader::from_directory(tmpdir.path()).unwrap();
        assert_eq!(header.version, "01.00");
        assert_eq!(header.acquired_name, "QC_Shew_13_04");
        assert_eq!(header.instrument, "Q-TOF Premier");
        assert_eq!(header.sample_description, "QC standard");
        assert_eq!(header.solvent_delay_minutes, 2.5);
        assert_eq!(header.mux_stream, 3);
        assert_eq!(header.cal_ms1_static.coefficients, vec![0.0, 1.0]);
        assert_eq!(header.cal_ms1_static.calibration_type, 1);
        assert!(header.cal_ms2_static.is_empty());

        let when = header.acquired_datetime().unwrap();
        assert_eq!(when.to_string(), "2006-03-02 14:33:08");
        Ok(())
    }

    #[test]
    fn test_empty_file_defaults() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        write_header(tmpdir.path(), &["just noise", "$$ malformed without colon"]);
        let header = DatasetHeader::from_directory(tmpdir.path()).unwrap();
        assert_eq!(header, DatasetHeader::default());
        assert!(header.acquired_datetime().is_none());
        Ok(())
    }

    #[test]
    fn test_missing_file_fails() {
        let tmpdir = tempfile::tempdir().unwrap();
        let err = DatasetHeader::from_directory(tmpdir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::MassLynxErrorKind::HeaderRead);
    }

    #[test]
    fn test_crlf_lines() -> std::io::Result<()> {
        let tmpdir = tempfile::tempdir()?;
        std::fs::write(
            tmpdir.path().join(HEADER_FILE_NAME),
            "$$ Acquired Name: sample\r\n$$ Job Code: J-9\r\n",
        )?;
        let header = DatasetHeader::from_directory(tmpdir.path()).unwrap();
        assert_eq!(header.acquired_name, "sample");
        assert_eq!(header.job_code, "J-9");
        Ok(())
    }
}
