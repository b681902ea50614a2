use serde::Serialize;

/// gRPC ("gun") transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrpcSettings {
    pub service_name: String,
}

impl GrpcSettings {
    pub fn new<S: Into<String>>(service_name: S) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl Default for GrpcSettings {
    fn default() -> Self {
        Self::new("GunService")
    }
}
