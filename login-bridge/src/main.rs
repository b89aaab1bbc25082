#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use kube_login_bridge_runtime::{Args, Exit, FATAL_EXIT_CODE};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit = match Args::parse_and_run().await {
        Ok(exit) => exit,
        Err(error) => {
            tracing::error!(error = %format_args!("{error:#}"), "login bridge failed");
            Exit::Code(FATAL_EXIT_CODE)
        }
    };
    exit.exit()
}
