use crate::models::RemoteFileHandle;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device protocol error: {0}")]
    Protocol(String),
}

/// An established session on the device, positioned in its log directory.
///
/// Implementations are blocking; the harvester drives them from a single thread.
pub trait DeviceSession: Send {
    /// Names in the working directory, in the order the device returns them
    fn list(&mut self) -> Result<Vec<RemoteFileHandle>, DeviceError>;

    /// Stream the full content of `file` into `sink`, returning the byte count
    fn retrieve(
        &mut self,
        file: &RemoteFileHandle,
        sink: &mut dyn Write,
    ) -> Result<u64, DeviceError>;

    fn delete(&mut self, file: &RemoteFileHandle) -> Result<(), DeviceError>;

    fn quit(&mut self) -> Result<(), DeviceError>;
}
