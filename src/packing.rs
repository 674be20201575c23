//! Shift-and-mask decoding of the packed integer words found in MassLynx
//! function descriptor and scan index records.
//!
//! A scan index record cannot be fully decoded on its own: the base peak
//! encoding branches on the owning function's acquisition data type, so the
//! base peak helpers here take that selector as an argument.

use std::fmt::{self, Display};

use bitflags::bitflags;

use crate::utils::{int16_to_unsigned, int32_to_unsigned};

// Packed function info word (i16)
const MASK_FUNCTION_TYPE: i32 = 0x001F;
const FUNCTION_ION_MODE_SHIFT: i32 = 5;
const MASK_ION_MODE: i32 = 0x001F;
const FUNCTION_DATA_TYPE_SHIFT: i32 = 10;
const MASK_ACQUISITION_DATA_TYPE: i32 = 0x001F;

// Packed MS/MS info word (i16)
const MASK_COLLISION_ENERGY: i32 = 0x00FF;
const MSMS_SEGMENT_CHANNEL_SHIFT: i32 = 8;

// Packed scan info word (i32)
const MASK_PEAK_COUNT: i32 = 0x003F_FFFF;
const MASK_SEGMENT_NUMBER: i32 = 0x03C0_0000;
const SCAN_SEGMENT_SHIFT: i32 = 22;

// Packed base peak info word (i32), standard data (acquisition data type != 0)
const MASK_BP_INTENSITY_SCALE: i32 = 0x000F;
const MASK_BP_MASS_EXPONENT: i32 = 0x01F0;
const BP_MASS_EXPONENT_SHIFT: i32 = 4;
const BP_MASS_EXPONENT_BIAS: i32 = 23;
const BP_MASS_MANTISSA_SHIFT: i64 = 9;

// Packed base peak info word (i32), compressed data (acquisition data type == 0)
const MASK_BP_COMPRESSED_INTENSITY_SCALE: i32 = 0x0007;
const MASK_BP_COMPRESSED_INTENSITY: i32 = 0x07F8;
const BP_COMPRESSED_INTENSITY_SHIFT: i32 = 3;
const BP_COMPRESSED_MASS_SHIFT: i64 = 11;
const BP_COMPRESSED_MASS_STEP_DA: f64 = 0.125;

/// The acquisition function type encoded in the low bits of the packed
/// function info word.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionType {
    MS,
    SIR,
    DLY,
    CAT,
    OFF,
    PAR,
    DAU,
    NL,
    NG,
    MRM,
    Q1F,
    MS2,
    DAD,
    TOF,
    PSD,
    TofMSMS,
    TofMS,
    #[default]
    Unknown,
}

impl FunctionType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::MS,
            1 => Self::SIR,
            2 => Self::DLY,
            3 => Self::CAT,
            4 => Self::OFF,
            5 => Self::PAR,
            6 => Self::DAU,
            7 => Self::NL,
            8 => Self::NG,
            9 => Self::MRM,
            10 => Self::Q1F,
            11 => Self::MS2,
            12 => Self::DAD,
            13 => Self::TOF,
            14 => Self::PSD,
            16 => Self::TofMSMS,
            17 | 18 => Self::TofMS,
            _ => Self::Unknown,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::MS => "MS",
            Self::SIR => "SIR",
            Self::DLY => "DLY",
            Self::CAT => "CAT",
            Self::OFF => "OFF",
            Self::PAR => "PAR",
            Self::DAU => "DAU",
            Self::NL => "NL",
            Self::NG => "NG",
            Self::MRM => "MRM",
            Self::Q1F => "Q1F",
            Self::MS2 => "MS2",
            Self::DAD => "DAD",
            Self::TOF => "TOF",
            Self::PSD => "PSD",
            Self::TofMSMS => "TOF MS/MS",
            Self::TofMS => "TOF MS",
            Self::Unknown => "MS Unknown",
        }
    }

    /// Whether this function type carries MS/MS spectra with a precursor
    /// set mass
    pub const fn is_msms(&self) -> bool {
        matches!(self, Self::DAU | Self::MS2 | Self::TofMSMS)
    }
}

impl Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The ionization mode encoded in the packed function info word
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonMode {
    EIPositive,
    EINegative,
    CIPositive,
    CINegative,
    FBPositive,
    FBNegative,
    TSPositive,
    TSNegative,
    ESPositive,
    ESNegative,
    AIPositive,
    AINegative,
    LDPositive,
    LDNegative,
    FIPositive,
    FINegative,
    #[default]
    Unknown,
}

impl IonMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::EIPositive,
            1 => Self::EINegative,
            2 => Self::CIPositive,
            3 => Self::CINegative,
            4 => Self::FBPositive,
            5 => Self::FBNegative,
            6 => Self::TSPositive,
            7 => Self::TSNegative,
            8 => Self::ESPositive,
            9 => Self::ESNegative,
            10 => Self::AIPositive,
            11 => Self::AINegative,
            12 => Self::LDPositive,
            13 => Self::LDNegative,
            14 => Self::FIPositive,
            15 => Self::FINegative,
            _ => Self::Unknown,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::EIPositive => "EI+",
            Self::EINegative => "EI-",
            Self::CIPositive => "CI+",
            Self::CINegative => "CI-",
            Self::FBPositive => "FB+",
            Self::FBNegative => "FB-",
            Self::TSPositive => "TS+",
            Self::TSNegative => "TS-",
            Self::ESPositive => "ES+",
            Self::ESNegative => "ES-",
            Self::AIPositive => "AI+",
            Self::AINegative => "AI-",
            Self::LDPositive => "LD+",
            Self::LDNegative => "LD-",
            Self::FIPositive => "FI+",
            Self::FINegative => "FI-",
            Self::Unknown => "Unknown",
        }
    }

    pub const fn is_positive(&self) -> Option<bool> {
        match self {
            Self::EIPositive
            | Self::CIPositive
            | Self::FBPositive
            | Self::TSPositive
            | Self::ESPositive
            | Self::AIPositive
            | Self::LDPositive
            | Self::FIPositive => Some(true),
            Self::Unknown => None,
            _ => Some(false),
        }
    }
}

impl Display for IonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// The independent boolean attributes packed into the high bits of the
    /// scan info word
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ScanFlags: u32 {
        const USES_FOLLOWING_CONTINUUM = 1 << 26;
        const CONTINUUM_DATA_OVERRIDE = 1 << 27;
        const CONTAINS_MOLECULAR_MASSES = 1 << 28;
        const CONTAINS_CALIBRATED_MASSES = 1 << 29;
        const OVERLOAD = 1 << 30;
    }
}

/// Extract the function type from the packed function info word
pub fn function_type(packed_function_info: i16) -> FunctionType {
    let code = (int16_to_unsigned(packed_function_info) & MASK_FUNCTION_TYPE) as u8;
    FunctionType::from_code(code)
}

/// Extract the ionization mode from the packed function info word
pub fn ion_mode(packed_function_info: i16) -> IonMode {
    let code =
        ((int16_to_unsigned(packed_function_info) >> FUNCTION_ION_MODE_SHIFT) & MASK_ION_MODE) as u8;
    IonMode::from_code(code)
}

/// Extract the acquisition data type selector from the packed function info
/// word. Zero selects the compressed scan index record layout, anything else
/// the standard one.
pub fn acquisition_data_type(packed_function_info: i16) -> i16 {
    ((int16_to_unsigned(packed_function_info) >> FUNCTION_DATA_TYPE_SHIFT)
        & MASK_ACQUISITION_DATA_TYPE) as i16
}

/// Extract the collision energy in eV from the packed MS/MS info word
pub fn msms_collision_energy(packed_msms_info: i16) -> u16 {
    (int16_to_unsigned(packed_msms_info) & MASK_COLLISION_ENERGY) as u16
}

/// Extract the segment or channel count from the packed MS/MS info word
pub fn msms_segment_channel_count(packed_msms_info: i16) -> u16 {
    (int16_to_unsigned(packed_msms_info) >> MSMS_SEGMENT_CHANNEL_SHIFT) as u16
}

/// Extract the spectral peak count from the packed scan info word
pub fn scan_peak_count(packed_scan_info: i32) -> u32 {
    (packed_scan_info & MASK_PEAK_COUNT) as u32
}

/// Extract the segment number from the packed scan info word
pub fn scan_segment_number(packed_scan_info: i32) -> u16 {
    ((packed_scan_info & MASK_SEGMENT_NUMBER) >> SCAN_SEGMENT_SHIFT) as u16
}

/// Extract the boolean attribute flags from the packed scan info word
pub fn scan_flags(packed_scan_info: i32) -> ScanFlags {
    ScanFlags::from_bits_truncate(packed_scan_info as u32)
}

/// Decode the base peak intensity for a scan index record.
///
/// For standard data the mantissa lives in the separate packed intensity
/// field and the info word contributes a power-of-4 scale. Compressed data
/// has no separate intensity field; mantissa and scale both come out of the
/// info word.
pub fn unpack_base_peak_intensity(
    packed_base_peak_intensity: i16,
    packed_base_peak_info: i32,
    acquisition_data_type: i16,
) -> f32 {
    if acquisition_data_type == 0 {
        let mantissa =
            ((packed_base_peak_info & MASK_BP_COMPRESSED_INTENSITY) >> BP_COMPRESSED_INTENSITY_SHIFT) as f32;
        let scale = packed_base_peak_info & MASK_BP_COMPRESSED_INTENSITY_SCALE;
        mantissa * 4f32.powi(scale)
    } else {
        let mantissa = int16_to_unsigned(packed_base_peak_intensity) as f32;
        let scale = packed_base_peak_info & MASK_BP_INTENSITY_SCALE;
        mantissa * 4f32.powi(scale)
    }
}

/// Decode the base peak m/z for a scan index record.
///
/// Standard data stores a 23-bit mantissa with a biased power-of-2 exponent;
/// compressed data stores the mass as a fixed-point value in 1/8 Da steps.
pub fn unpack_base_peak_mass(packed_base_peak_info: i32, acquisition_data_type: i16) -> f64 {
    if acquisition_data_type == 0 {
        (int32_to_unsigned(packed_base_peak_info) >> BP_COMPRESSED_MASS_SHIFT) as f64
            * BP_COMPRESSED_MASS_STEP_DA
    } else {
        let mantissa = (int32_to_unsigned(packed_base_peak_info) >> BP_MASS_MANTISSA_SHIFT) as f64;
        let exponent = ((packed_base_peak_info & MASK_BP_MASS_EXPONENT) >> BP_MASS_EXPONENT_SHIFT)
            - BP_MASS_EXPONENT_BIAS;
        mantissa * 2f64.powi(exponent)
    }
}

/// Build the packed function info word from its sub-fields. Used by the unit
/// tests to synthesize records; exposed for fixture construction.
pub fn pack_function_info(function_type: u8, ion_mode: u8, acquisition_data_type: u8) -> i16 {
    let word = (function_type as i32 & MASK_FUNCTION_TYPE)
        | ((ion_mode as i32 & MASK_ION_MODE) << FUNCTION_ION_MODE_SHIFT)
        | ((acquisition_data_type as i32 & MASK_ACQUISITION_DATA_TYPE) << FUNCTION_DATA_TYPE_SHIFT);
    word as i16
}
