#![deny(warnings, rust_2018_idioms)]
#![deny(unsafe_code)]

mod args;
mod cleanup;
mod exchange;
mod supervisor;

pub use self::{
    args::{Args, LogFormat},
    cleanup::{Cleanup, TokenRevocation},
    exchange::{login, session_cookie, Login, Outcome},
    supervisor::{Exit, Supervisor, INHERITED_ENV},
};

/// The exit code used after a terminal failure message has been written to
/// the host.
pub const REFUSED_EXIT_CODE: i32 = 5;

/// The exit code used when the bridge itself fails.
pub const FATAL_EXIT_CODE: i32 = 127;
