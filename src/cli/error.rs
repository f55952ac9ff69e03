// Error handling utilities for consistent error messages and exit codes

use std::process;
use crate::models::SegmentKey;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing leads, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a lead ID is valid (positive integer)
pub fn validate_lead_id(id_str: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid lead ID: '{}'. Lead ID must be a number.", id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid lead ID: {}. Lead ID must be positive.", id))
            }
        })
}

/// Parse a stage name (`new`, `contacted`, `qualifying`, `in_progress`, `won`, `lost`)
pub fn validate_segment(name: &str) -> Result<SegmentKey, String> {
    SegmentKey::from_str(name).ok_or_else(|| {
        let known: Vec<&str> = SegmentKey::ALL.iter().map(|s| s.as_str()).collect();
        format!("Invalid stage: '{}'. Expected one of: {}.", name, known.join(", "))
    })
}

/// Validate a deal value (finite, non-negative)
pub fn validate_deal_value(value: f64) -> Result<f64, String> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("Invalid deal value: {}. Value must be a non-negative number.", value))
    }
}
