#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod credential;
pub mod descriptor;
mod endpoint;
mod error;
pub mod frame;
mod identity;
pub mod message;

pub use self::{
    credential::{AuthHeader, Credential, ParseError},
    descriptor::LoginDescriptor,
    endpoint::{ClusterEndpoint, DEFAULT_USER_API_PATH, IN_CLUSTER_CA_FILE},
    error::{BoxError, Error},
    frame::FrameError,
    identity::Identity,
    message::{Message, Problem},
};
