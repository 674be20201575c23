//! Mass calibration equations and the comma-delimited coefficient strings
//! MassLynx stores them in.

/// An ordered polynomial calibration with the instrument's calibration type
/// code and, for per-function calibrations, a fitted standard deviation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CalibrationEquation {
    /// Polynomial coefficients, lowest order first, as written
    pub coefficients: Vec<f64>,
    /// The `T<n>` calibration type code, 0 when absent
    pub calibration_type: i32,
    /// Standard deviation of the calibration fit, 0 when absent
    pub std_dev: f64,
}

impl CalibrationEquation {
    pub fn coefficient_count(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty() && self.calibration_type == 0 && self.std_dev == 0.0
    }

    /// Parse a calibration coefficient list like `"-0.021,1.0,0.0,T1"`.
    ///
    /// Coefficients are collected left to right until the first token that
    /// does not parse as a number; that token is the list terminator, not an
    /// error. The calibration type is found by an independent scan from the
    /// end for a token with a `T`/`t` prefix, so a malformed token in the
    /// middle shortens the coefficient list without losing the type code.
    pub fn parse(text: &str) -> Self {
        let tokens: Vec<&str> = text.split(',').map(|t| t.trim()).collect();

        let coefficients: Vec<f64> = tokens
            .iter()
            .map_while(|token| token.parse::<f64>().ok())
            .collect();

        let calibration_type = tokens
            .iter()
            .rev()
            .find_map(|token| {
                token
                    .strip_prefix(['T', 't'])
                    .and_then(|rest| rest.parse::<i32>().ok())
            })
            .unwrap_or(0);

        Self {
            coefficients,
            calibration_type,
            std_dev: 0.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_with_type_tag() {
        let eq = CalibrationEquation::parse("1.0,2.5,-3.2,T2");
        assert_eq!(eq.coefficients, vec![1.0, 2.5, -3.2]);
        assert_eq!(eq.calibration_type, 2);
        assert_eq!(eq.coefficient_count(), 3);
    }

    #[test]
    fn test_forward_and_backward_scans_are_independent() {
        let eq = CalibrationEquation::parse("1.0,foo,T2");
        assert_eq!(eq.coefficients, vec![1.0]);
        assert_eq!(eq.calibration_type, 2);
    }

    #[test]
    fn test_parse_without_type_tag() {
        let eq = CalibrationEquation::parse("-0.5,1.0,0.25");
        assert_eq!(eq.coefficients, vec![-0.5, 1.0, 0.25]);
        assert_eq!(eq.calibration_type, 0);
    }

    #[test]
    fn test_parse_empty_and_junk() {
        assert!(CalibrationEquation::parse("").coefficients.is_empty());
        let eq = CalibrationEquation::parse("bogus");
        assert!(eq.coefficients.is_empty());
        assert_eq!(eq.calibration_type, 0);
        assert!(eq.is_empty());
    }

    #[test]
    fn test_lowercase_type_tag() {
        let eq = CalibrationEquation::parse("2.0,4.0,t7");
        assert_eq!(eq.coefficients, vec![2.0, 4.0]);
        assert_eq!(eq.calibration_type, 7);
    }
}
