use crate::models::RemoteFileHandle;
use crate::services::connection::{ConnectError, Connector, DeviceEndpoint};
use crate::services::device::{DeviceError, DeviceSession};
use std::io::{self, Write};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

const ANONYMOUS_USER: &str = "anonymous";
const ANONYMOUS_PASSWORD: &str = "anonymous@";

fn protocol(e: FtpError) -> DeviceError {
    match e {
        FtpError::ConnectionError(io) => DeviceError::Io(io),
        other => DeviceError::Protocol(other.to_string()),
    }
}

/// Anonymous FTP login to the device, positioned in its log directory
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

impl Connector for FtpConnector {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, ConnectError> {
        let addr = format!("{}:{}", endpoint.host, endpoint.port);

        let mut ftp = FtpStream::connect(addr.as_str()).map_err(|e| ConnectError::Unreachable {
            endpoint: addr.clone(),
            reason: e.to_string(),
        })?;

        ftp.login(ANONYMOUS_USER, ANONYMOUS_PASSWORD)
            .map_err(|e| ConnectError::LoginRejected {
                reason: e.to_string(),
            })?;

        ftp.cwd(&endpoint.working_dir)
            .map_err(|e| ConnectError::Protocol(format!("cwd {}: {}", endpoint.working_dir, e)))?;

        ftp.transfer_type(FileType::Binary)
            .map_err(|e| ConnectError::Protocol(format!("binary mode: {}", e)))?;

        debug!("FTP session ready in {}", endpoint.working_dir);
        Ok(Box::new(FtpSession { ftp }))
    }
}

pub struct FtpSession {
    ftp: FtpStream,
}

impl DeviceSession for FtpSession {
    fn list(&mut self) -> Result<Vec<RemoteFileHandle>, DeviceError> {
        let names = self.ftp.nlst(None).map_err(protocol)?;
        Ok(names.into_iter().map(RemoteFileHandle::new).collect())
    }

    fn retrieve(
        &mut self,
        file: &RemoteFileHandle,
        sink: &mut dyn Write,
    ) -> Result<u64, DeviceError> {
        let mut stream = self.ftp.retr_as_stream(&file.name).map_err(protocol)?;
        let copied = io::copy(&mut stream, sink);
        // Finalize even when the local write failed so the control connection stays usable.
        let finalized = self.ftp.finalize_retr_stream(stream).map_err(protocol);
        let bytes = copied?;
        finalized?;
        Ok(bytes)
    }

    fn delete(&mut self, file: &RemoteFileHandle) -> Result<(), DeviceError> {
        self.ftp.rm(&file.name).map_err(protocol)
    }

    fn quit(&mut self) -> Result<(), DeviceError> {
        self.ftp.quit().map_err(protocol)
    }
}
