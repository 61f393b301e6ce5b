use std::time::Duration;

use derive_more::From;
use k8s_openapi::serde_json;

use crate::event::ResourceRef;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Io(std::io::Error),

    /// The hub has been shut down and accepts no more subscribers or events
    HubClosed,

    /// The hub intake could not be acquired within the publish timeout
    PublishTimeout(Duration),

    /// No deployment (or no running pod) exists for the reference
    NotFound(ResourceRef),

    /// Custom error message
    Custom(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
