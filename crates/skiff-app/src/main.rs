#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! `skiff` binary: scheduled per-tenant file transfer.

use std::process::ExitCode;

use skiff_app::run_app;

/// Parse arguments, run the selected command and map failures to exit codes.
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            ExitCode::from(err.exit_code())
        }
    }
}
