//! Platform socket adapter.
//!
//! The resolvers only need to know which platform family they run on. The
//! binary additionally lowers its scheduling priority and inspects the
//! system receive buffer through the same interface.

use serde::Serialize;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// Socket buffer negotiation is unreliable, so buffers are sized explicitly.
    Windows,
    Unix,
}

impl PlatformFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Unix
        }
    }
}

pub trait PlatformSocket {
    fn family(&self) -> PlatformFamily;

    /// Current `SO_RCVBUF` of `socket` in bytes.
    fn recv_buffer_size(&self, socket: &socket2::Socket) -> io::Result<usize> {
        socket.recv_buffer_size()
    }

    /// Run the plugin below normal scheduling priority so it does not starve
    /// the host process.
    fn lower_process_priority(&self) -> io::Result<()>;
}

/// Adapter for the platform this binary was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

#[cfg(unix)]
mod unix_impl {
    use std::io;

    pub fn lower_process_priority() -> io::Result<()> {
        // SAFETY: setpriority only reads its integer arguments.
        let ret = unsafe { libc::setpriority(libc::PRIO_PGRP, 0, 2) };
        if ret == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod windows_impl {
    use std::io;

    pub fn lower_process_priority() -> io::Result<()> {
        use windows::Win32::System::Threading::{
            GetCurrentProcess, SetPriorityClass, BELOW_NORMAL_PRIORITY_CLASS,
        };

        unsafe { SetPriorityClass(GetCurrentProcess(), BELOW_NORMAL_PRIORITY_CLASS) }
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

#[cfg(not(any(unix, windows)))]
mod fallback_impl {
    use std::io;

    pub fn lower_process_priority() -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process priority is not supported on this platform",
        ))
    }
}

#[cfg(unix)]
use unix_impl as native;

#[cfg(windows)]
use windows_impl as native;

#[cfg(not(any(unix, windows)))]
use fallback_impl as native;

impl PlatformSocket for NativePlatform {
    fn family(&self) -> PlatformFamily {
        PlatformFamily::current()
    }

    fn lower_process_priority(&self) -> io::Result<()> {
        native::lower_process_priority()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Protocol, Socket, Type};

    #[test]
    fn test_native_family() {
        let expected = if cfg!(windows) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Unix
        };
        assert_eq!(NativePlatform.family(), expected);
    }

    #[test]
    fn test_recv_buffer_size_reads_socket() {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).unwrap();
        let size = NativePlatform.recv_buffer_size(&socket).unwrap();
        assert!(size > 0);
    }
}
