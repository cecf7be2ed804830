//! Request/reply over a lossy UDP loopback
//!
//! The client sends `Message 0..N` plus `END`; the server acknowledges each
//! line with its own stream and a final `complete` stream. Both sides drop
//! and corrupt outbound frames at the rates given on the command line.
//!
//! ```text
//! cargo run --example loopback_echo -- [messages] [loss] [error]
//! ```

use arq_tokio::{ArqConfig, ArqError, Endpoint, FaultConfig, UdpTransport};
use bytes::Bytes;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> arq_tokio::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let count: usize = arg(&args, 1, 10)?;
    let loss: f64 = arg(&args, 2, 0.1)?;
    let error: f64 = arg(&args, 3, 0.1)?;

    let config = ArqConfig::new()
        .timeout_interval(Duration::from_millis(200))
        .linger(Duration::from_secs(2))
        .faults(FaultConfig::new().loss(loss).error(error));

    let server = Endpoint::bind("127.0.0.1:0", config.clone()).await?;
    let client = Endpoint::bind("127.0.0.1:0", config).await?;
    let server_addr = server.local_addr()?;
    info!("Server listening on {}", server_addr);

    let serving = tokio::spawn(serve(server));

    let request: Vec<Bytes> = (0..count)
        .map(|i| Bytes::from(format!("Message {i}")))
        .chain([Bytes::from_static(b"END")])
        .collect();

    let mut sender = client.sender(server_addr);
    sender.send_all(request).await?;
    let stats = sender.stats().await;
    info!(
        frames = stats.frames_sent,
        retransmissions = stats.retransmissions,
        fast = stats.fast_retransmissions,
        timeouts = stats.timeouts,
        "Request delivered"
    );

    for line in client.receive_all().await? {
        println!("{}", String::from_utf8_lossy(&line));
    }
    if let Some(status) = client.receive_all().await?.first() {
        println!("{}", String::from_utf8_lossy(status));
    }

    match serving.await {
        Ok(result) => result,
        Err(e) => {
            warn!("Server task failed: {}", e);
            Err(ArqError::internal(e.to_string()))
        }
    }
}

async fn serve(server: Endpoint<UdpTransport>) -> arq_tokio::Result<()> {
    let mut receiver = server.receiver();
    let (request, peer) = receiver.receive_from().await?;
    info!(
        frames = request.len(),
        corrupt = receiver.stats().corrupt_dropped,
        out_of_order = receiver.stats().out_of_order,
        "Request from {}",
        peer
    );

    let reply: Vec<Bytes> = request
        .iter()
        .map(|line| {
            if &line[..] == b"END" {
                line.clone()
            } else {
                Bytes::from(format!("ACK {}", String::from_utf8_lossy(line)))
            }
        })
        .collect();
    server.send_all(&peer, reply).await?;
    server.send_all(&peer, ["complete", "END"]).await?;
    info!("Reply to {} acknowledged", peer);
    Ok(())
}

fn arg<V: std::str::FromStr>(args: &[String], index: usize, default: V) -> arq_tokio::Result<V> {
    match args.get(index) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ArqError::config(format!("cannot parse argument {index}: {raw}"))),
        None => Ok(default),
    }
}
