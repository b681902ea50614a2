#[macro_export]
macro_rules! bail_config {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Config {
            message: format!($($arg)*),
            source: None,
        })
    };
}

#[macro_export]
macro_rules! bail_certificate {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::CertificateIo {
            message: format!($($arg)*),
            path: None,
            source: None,
        })
    };
}

/// Parse a mandatory numeric field, turning failures into a
/// [`Error::Parse`](crate::error::Error::Parse) that carries the raw input.
#[macro_export]
macro_rules! parse_required {
    ($ty:ty, $field:expr, $value:expr) => {{
        let raw: &str = $value;
        raw.trim().parse::<$ty>().map_err(|e| {
            $crate::error::Error::parse_with_source(format!("invalid {}: {}", $field, raw), raw, e)
        })?
    }};
}
