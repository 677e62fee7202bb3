//! Attendance count validation for class records.

use crate::error::CoreError;

/// Upper bound for a single class's headcount.
pub const MAX_CLASS_SIZE: i32 = 1_000;

/// Validate `present`, `absent`, and `total` for a class record.
///
/// All counts must be non-negative, `total` must not exceed
/// [`MAX_CLASS_SIZE`], and `present + absent` must not exceed `total`.
pub fn validate_counts(present: i32, absent: i32, total: i32) -> Result<(), CoreError> {
    if present < 0 || absent < 0 || total < 0 {
        return Err(CoreError::Validation(format!(
            "Attendance counts must be non-negative (present={present}, absent={absent}, total={total})"
        )));
    }
    if total > MAX_CLASS_SIZE {
        return Err(CoreError::Validation(format!(
            "Total students exceeds maximum of {MAX_CLASS_SIZE} (got {total})"
        )));
    }
    if present + absent > total {
        return Err(CoreError::Validation(format!(
            "Present ({present}) plus absent ({absent}) exceeds total students ({total})"
        )));
    }
    Ok(())
}

/// Percentage of students present, rounded to one decimal place.
///
/// Returns `None` for an empty class.
pub fn attendance_percentage(present: i32, total: i32) -> Option<f64> {
    if total <= 0 {
        return None;
    }
    let pct = f64::from(present) * 100.0 / f64::from(total);
    Some((pct * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_attendance_is_valid() {
        assert!(validate_counts(30, 0, 30).is_ok());
        assert!(validate_counts(25, 5, 30).is_ok());
    }

    #[test]
    fn unaccounted_students_are_allowed() {
        assert!(validate_counts(20, 5, 30).is_ok());
    }

    #[test]
    fn overcount_is_rejected() {
        assert!(validate_counts(26, 5, 30).is_err());
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(validate_counts(-1, 0, 10).is_err());
        assert!(validate_counts(0, -1, 10).is_err());
        assert!(validate_counts(0, 0, -10).is_err());
    }

    #[test]
    fn oversized_class_is_rejected() {
        assert!(validate_counts(0, 0, MAX_CLASS_SIZE + 1).is_err());
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(attendance_percentage(25, 30), Some(83.3));
        assert_eq!(attendance_percentage(30, 30), Some(100.0));
        assert_eq!(attendance_percentage(0, 0), None);
    }
}
