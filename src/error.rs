use std::io;

/// A request that cannot be applied to the strip. Nothing was changed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected {expected} color bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("frame {index}: expected {expected} color bytes, got {actual}")]
    FrameLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// Failure on the serial link. Always fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("write to device failed: {0}")]
    Write(#[source] io::Error),

    #[error("read from device failed: {0}")]
    Read(#[source] io::Error),

    #[error("device closed the link")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The writer thread is gone, which only happens after a device failure
    #[error("device writer has stopped")]
    WriterStopped,

    #[error("animation player has stopped")]
    PlayerStopped,
}

/// Why the process is going down
#[derive(Debug)]
pub enum Halt {
    Interrupted,
    Device(DeviceError),
}
