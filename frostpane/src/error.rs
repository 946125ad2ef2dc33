//! Blur-engine error types.

use thiserror::Error;

/// Errors from the blur engine.
///
/// Parameter errors are rejected synchronously at the setter boundary and
/// never mutate existing state. Allocation errors are degraded inside the
/// paint cycle (the region falls back to unblurred passthrough for the
/// frame) and never cross it.
#[derive(Error, Debug)]
pub enum BlurError {
    /// A GPU texture or render-target allocation failed.
    #[error("allocation of {what} ({width}x{height}) failed: {reason}")]
    AllocationFailed {
        what: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    /// A parameter value is outside its valid range.
    #[error("parameter '{param}' value {value} out of range [{min}, {max}]")]
    InvalidParameter {
        param: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = BlurError::InvalidParameter {
            param: "radius",
            value: 80,
            min: 0,
            max: 49,
        };
        assert_eq!(
            err.to_string(),
            "parameter 'radius' value 80 out of range [0, 49]"
        );

        let err = BlurError::AllocationFailed {
            what: "working target",
            width: 480,
            height: 270,
            reason: "out of memory".to_string(),
        };
        assert!(err.to_string().contains("working target"));
        assert!(err.to_string().contains("480x270"));
    }
}
