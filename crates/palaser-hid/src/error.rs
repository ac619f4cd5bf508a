//! HID error types.

use thiserror::Error;

/// HID error type.
#[derive(Debug, Error)]
pub enum HidError {
    #[error("Device not found")]
    DeviceNotFound,

    #[error("Permission denied - check udev rules")]
    PermissionDenied,

    #[error("USB error: {0}")]
    UsbError(#[source] rusb::Error),

    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl From<rusb::Error> for HidError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Access => Self::PermissionDenied,
            rusb::Error::NoDevice | rusb::Error::NotFound => Self::DeviceNotFound,
            other => Self::UsbError(other),
        }
    }
}

impl From<HidError> for palaser_core::Error {
    fn from(err: HidError) -> Self {
        Self::Device(Box::new(err))
    }
}

/// Result type for HID operations.
pub type HidResult<T> = Result<T, HidError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_usb_error_mapping() {
        assert_matches!(HidError::from(rusb::Error::Access), HidError::PermissionDenied);
        assert_matches!(HidError::from(rusb::Error::NoDevice), HidError::DeviceNotFound);
        assert_matches!(
            HidError::from(rusb::Error::Timeout),
            HidError::UsbError(rusb::Error::Timeout)
        );
    }

    #[test]
    fn test_converts_into_core_device_error() {
        let err: palaser_core::Error = HidError::PermissionDenied.into();
        assert_matches!(err, palaser_core::Error::Device(_));
        assert_eq!(err.to_string(), "Device error: Permission denied - check udev rules");
    }
}
