//! End-to-end tests for the Go-Back-N transfer engines.
//!
//! Each test spins up a sender and a receiver as separate tokio tasks
//! talking over the loopback interface.  Fault scenarios route the data
//! frames through an in-process UDP relay that drops, corrupts, delays, or
//! duplicates them on a deterministic schedule; acknowledgments pass the
//! relay untouched, so every run terminates.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use gbn_transfer::{Receiver, ReceiverReport, Sender, SenderConfig, SenderReport, Socket};

/// Bind a socket to an OS-assigned port on loopback.
async fn ephemeral() -> Socket {
    let addr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn config(window: u32, timeout_ms: u64) -> SenderConfig {
    SenderConfig {
        window,
        retransmit_timeout: Duration::from_millis(timeout_ms),
    }
}

/// Spawn a receiver task writing into an in-memory buffer.
fn spawn_receiver(socket: Socket) -> JoinHandle<(ReceiverReport, Vec<u8>)> {
    tokio::spawn(async move {
        let mut out = Vec::new();
        let report = Receiver::new(socket).run(&mut out).await.expect("receiver");
        (report, out)
    })
}

async fn run_sender(peer: SocketAddr, data: &[u8], config: SenderConfig) -> SenderReport {
    let mut sender = Sender::connect(ephemeral().await, peer, &config)
        .await
        .expect("connect");
    sender.load(data).expect("load");
    sender.run().await.expect("sender")
}

/// Deterministic fault schedule applied to sender→receiver frames only.
#[derive(Default, Clone)]
struct FaultPlan {
    /// Drop every k-th data frame.
    drop_every: Option<u64>,
    /// Flip a byte in every k-th data frame.
    corrupt_every: Option<u64>,
    /// Hold back exactly the k-th data frame until the next one passes.
    delay_one: Option<u64>,
    /// Deliver every k-th data frame twice.
    duplicate_every: Option<u64>,
}

/// A UDP relay between sender and receiver applying `plan` to data frames.
///
/// Returns its own address; the sender should connect to it instead of the
/// receiver.  Acks (receiver → sender) always pass through unmodified.
async fn spawn_relay(receiver_addr: SocketAddr, plan: FaultPlan) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("relay bind");
    let relay_addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut sender_addr: Option<SocketAddr> = None;
        let mut held: Option<Vec<u8>> = None;
        let mut count = 0u64;
        let mut buf = vec![0u8; 2048];

        loop {
            let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                return;
            };

            if from == receiver_addr {
                if let Some(s) = sender_addr {
                    let _ = socket.send_to(&buf[..n], s).await;
                }
                continue;
            }

            sender_addr = Some(from);
            count += 1;
            let mut frame = buf[..n].to_vec();

            if plan.drop_every.is_some_and(|k| count % k == 0) {
                continue;
            }
            if plan.corrupt_every.is_some_and(|k| count % k == 0) {
                frame[0] ^= 0xff;
            }
            if plan.delay_one == Some(count) {
                held = Some(frame);
                continue;
            }

            let _ = socket.send_to(&frame, receiver_addr).await;
            if plan.duplicate_every.is_some_and(|k| count % k == 0) {
                let _ = socket.send_to(&frame, receiver_addr).await;
            }
            // A delayed frame overtakes: deliver it after its successor.
            if let Some(old) = held.take() {
                let _ = socket.send_to(&old, receiver_addr).await;
            }
        }
    });

    relay_addr
}

/// Patterned payload so misordered writes cannot cancel out.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// ---------------------------------------------------------------------------
// Clean-channel transfers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transfer_2500_bytes_window_2() {
    let input = pattern(2500);
    let receiver_sock = ephemeral().await;
    let receiver_addr = receiver_sock.local_addr;
    let receiver = spawn_receiver(receiver_sock);

    let report = run_sender(receiver_addr, &input, config(2, 3000)).await;
    // 1024 + 1024 + 452 byte chunks plus one terminal frame.
    assert_eq!(report.frames, 4);
    assert_eq!(report.file_bytes, 2500);
    assert_eq!(report.transmissions, 4);

    let (totals, output) = receiver.await.unwrap();
    assert_eq!(output, input);
    assert_eq!(totals.good_bytes, 2500);
    assert_eq!(totals.total_bytes, 2500);
}

#[tokio::test]
async fn transfer_zero_byte_file() {
    let receiver_sock = ephemeral().await;
    let receiver_addr = receiver_sock.local_addr;
    let receiver = spawn_receiver(receiver_sock);

    let report = run_sender(receiver_addr, &[], config(4, 3000)).await;
    assert_eq!(report.frames, 1);
    assert_eq!(report.transmissions, 1);

    let (totals, output) = receiver.await.unwrap();
    assert!(output.is_empty());
    assert_eq!(totals.good_bytes, 0);
    assert_eq!(totals.total_bytes, 0);
}

#[tokio::test]
async fn transfer_exact_chunk_multiple() {
    let input = pattern(2048);
    let receiver_sock = ephemeral().await;
    let receiver_addr = receiver_sock.local_addr;
    let receiver = spawn_receiver(receiver_sock);

    let report = run_sender(receiver_addr, &input, config(8, 3000)).await;
    assert_eq!(report.frames, 3);

    let (totals, output) = receiver.await.unwrap();
    assert_eq!(output, input);
    assert_eq!(totals.good_bytes, 2048);
}

// ---------------------------------------------------------------------------
// Faulty-channel transfers
// ---------------------------------------------------------------------------

async fn faulty_transfer(input: Vec<u8>, plan: FaultPlan) -> Result<()> {
    let receiver_sock = ephemeral().await;
    let receiver_addr = receiver_sock.local_addr;
    let receiver = spawn_receiver(receiver_sock);
    let relay_addr = spawn_relay(receiver_addr, plan).await;

    // A short timeout keeps retransmission rounds fast.
    let sender = run_sender(relay_addr, &input, config(4, 100));
    let report = timeout(Duration::from_secs(30), sender).await?;
    assert_eq!(report.file_bytes, input.len() as u64);

    let (totals, output) = timeout(Duration::from_secs(30), receiver).await??;
    assert_eq!(output, input);
    assert_eq!(totals.good_bytes, input.len() as u64);
    // Retransmits and rejects only ever add to the total counter.
    assert!(totals.total_bytes >= totals.good_bytes);
    Ok(())
}

#[tokio::test]
async fn recovers_from_packet_loss() -> Result<()> {
    faulty_transfer(
        pattern(8192),
        FaultPlan {
            drop_every: Some(5),
            ..FaultPlan::default()
        },
    )
    .await
}

#[tokio::test]
async fn recovers_from_corruption() -> Result<()> {
    faulty_transfer(
        pattern(6000),
        FaultPlan {
            corrupt_every: Some(4),
            ..FaultPlan::default()
        },
    )
    .await
}

#[tokio::test]
async fn recovers_from_reordering() -> Result<()> {
    // Frame 2 overtakes frame 3; the receiver must drop it unbuffered and
    // force a window retransmit rather than accept it early.
    faulty_transfer(
        pattern(5000),
        FaultPlan {
            delay_one: Some(2),
            ..FaultPlan::default()
        },
    )
    .await
}

#[tokio::test]
async fn tolerates_duplicates() -> Result<()> {
    faulty_transfer(
        pattern(4096),
        FaultPlan {
            duplicate_every: Some(3),
            ..FaultPlan::default()
        },
    )
    .await
}

#[tokio::test]
async fn survives_combined_faults() -> Result<()> {
    faulty_transfer(
        pattern(10_000),
        FaultPlan {
            drop_every: Some(7),
            corrupt_every: Some(5),
            duplicate_every: Some(11),
            delay_one: Some(3),
        },
    )
    .await
}

// ---------------------------------------------------------------------------
// File-backed transfer through the real file I/O path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transfer_between_files_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.bin");
    let input = pattern(3 * 1024 + 17);
    std::fs::write(&input_path, &input)?;

    let receiver_sock = ephemeral().await;
    let receiver_addr = receiver_sock.local_addr;
    let receiver = tokio::spawn(async move {
        let mut out = Vec::new();
        let report = Receiver::new(receiver_sock).run(&mut out).await.unwrap();
        (report, out)
    });

    let mut sender = Sender::connect(ephemeral().await, receiver_addr, &config(4, 3000)).await?;
    sender.load(std::fs::File::open(&input_path)?)?;
    let report = sender.run().await?;
    assert_eq!(report.file_bytes, input.len() as u64);

    let (totals, output) = receiver.await?;
    assert_eq!(output, input);
    assert_eq!(totals.good_bytes, input.len() as u64);
    Ok(())
}
