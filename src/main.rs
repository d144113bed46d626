//! Entry point for `gbn-transfer`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, exit codes) and the
//! final totals printout.

use std::fs::File;
use std::io::BufWriter;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use gbn_transfer::{Receiver, Sender, SenderConfig, Socket, TransferError};

/// Go-Back-N reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a remote receiver.
    Send {
        /// Receiver hostname or address.
        host: String,
        /// File to transfer.
        file: PathBuf,
        /// Receiver UDP port.
        #[arg(short, long, default_value_t = 4343)]
        remote: u16,
        /// Retransmission timeout in milliseconds.
        #[arg(short, long, default_value_t = 3000)]
        timeout: u64,
        /// Sliding-window size in frames (≥ 1).
        #[arg(short, long, default_value_t = 25)]
        window: u32,
    },
    /// Receive a file from a remote sender.
    Recv {
        /// Output file path.
        file: PathBuf,
        /// Local UDP port to listen on.
        #[arg(short, long, default_value_t = 12105)]
        local: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.mode {
        Mode::Send {
            host,
            file,
            remote,
            timeout,
            window,
        } => send(host, remote, file, timeout, window).await,
        Mode::Recv { file, local } => recv(local, file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gbn-transfer: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn send(
    host: String,
    remote: u16,
    file: PathBuf,
    timeout_ms: u64,
    window: u32,
) -> Result<(), TransferError> {
    let peer = resolve(&host, remote)?;
    let config = SenderConfig {
        window,
        retransmit_timeout: Duration::from_millis(timeout_ms),
    };

    let socket = Socket::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?;
    log::info!("sending {} to {peer} (window {window})", file.display());

    let mut sender = Sender::connect(socket, peer, &config).await?;
    sender.load(File::open(&file)?)?;
    let report = sender.run().await?;

    println!(
        "Transferred {} bytes in {} frames ({} transmissions)",
        report.file_bytes, report.frames, report.transmissions
    );
    Ok(())
}

async fn recv(local: u16, file: PathBuf) -> Result<(), TransferError> {
    let socket = Socket::bind(SocketAddr::from(([0, 0, 0, 0], local))).await?;
    log::info!("listening on {} for {}", socket.local_addr, file.display());

    let out = BufWriter::new(File::create(&file)?);
    let report = Receiver::new(socket).run(out).await?;

    println!("Total bytes: {}", report.total_bytes);
    println!("Good bytes: {}", report.good_bytes);
    Ok(())
}

/// Resolve `host:port` to the first usable socket address.
fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransferError> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransferError::BadPeer(format!("{host}:{port}")))
}
