use crate::options::ResolvedOptions;
use crate::platform::PlatformFamily;
use serde::Serialize;

/// Buffer size used on Windows when none is configured.
pub const WINDOWS_DEFAULT_BUFFER_SIZE: u32 = 196_608;

/// Usual system default; on Windows this value means "leave it alone".
pub const SYSTEM_DEFAULT_BUFFER_SIZE: u32 = 65_536;

/// Socket options passed through to the platform socket layer. Zero means
/// unset for every numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SocketTuning {
    pub tcp_fast_open: bool,
    pub mark: u32,
    pub tx_buf_size: u32,
    pub rx_buf_size: u32,
}

/// Apply the platform defaulting rule to a configured buffer size.
pub fn effective_buffer_size(buf_size: u32, family: PlatformFamily) -> u32 {
    match (family, buf_size) {
        (PlatformFamily::Windows, 0) => WINDOWS_DEFAULT_BUFFER_SIZE,
        (PlatformFamily::Windows, SYSTEM_DEFAULT_BUFFER_SIZE) => 0,
        (_, size) => size,
    }
}

/// Returns `None` when nothing needs tuning, so no empty block reaches the
/// engine.
pub fn resolve(
    fast_open: bool,
    fwmark: u32,
    buf_size: u32,
    family: PlatformFamily,
) -> Option<SocketTuning> {
    let buf_size = effective_buffer_size(buf_size, family);

    let tuning = SocketTuning {
        tcp_fast_open: fast_open,
        mark: fwmark,
        tx_buf_size: buf_size,
        rx_buf_size: buf_size,
    };

    if tuning == SocketTuning::default() {
        None
    } else {
        Some(tuning)
    }
}

pub fn resolve_for(opts: &ResolvedOptions, family: PlatformFamily) -> Option<SocketTuning> {
    resolve(opts.fast_open, opts.fwmark, opts.buf_size, family)
}
