//! End-to-end delivery benchmark for the chat hub.
//!
//! Connects many WebSocket clients to one room and measures how many chat
//! messages the server delivers. Each client sends under the per-session
//! rate limit, so the figure reflects fan-out rather than throttling.

use bytes::BytesMut;
use chathub_protocol::{codec, ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const SERVER_URL: &str = "ws://127.0.0.1:3000/ws";
const ROOM: &str = "benchmark";
const SEND_INTERVAL: Duration = Duration::from_millis(250);
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);

    println!("Chat hub end-to-end delivery benchmark");
    println!("  Make sure the server is running: cargo run --release --bin chathub");
    println!();

    run_room_benchmark(num_clients).await;
}

async fn run_room_benchmark(num_clients: usize) {
    println!("Room benchmark: {} clients in '{}'", num_clients, ROOM);
    println!("  Warmup: {}s, Measurement: {}s", WARMUP_SECS, BENCH_SECS);
    println!();

    let delivered = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();

    // Spawn client tasks
    for client_id in 0..num_clients {
        let delivered = Arc::clone(&delivered);
        let barrier = Arc::clone(&barrier);

        let handle = tokio::spawn(async move {
            if let Err(e) = run_client(delivered, barrier).await {
                eprintln!("Client {} error: {}", client_id, e);
            }
        });
        handles.push(handle);
    }

    // Wait for all clients to join the room
    barrier.wait().await;
    println!("All {} clients connected", num_clients);

    println!("Warming up for {}s...", WARMUP_SECS);
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    // Reset counter and start measurement
    delivered.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("Measuring for {}s...", BENCH_SECS);
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = delivered.load(Ordering::SeqCst);
    let per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results");
    println!("  Clients:          {:>10}", num_clients);
    println!("  Duration:         {:>10.2}s", elapsed.as_secs_f64());
    println!("  Delivered:        {:>10}", total);
    println!("  Deliveries/s:     {:>10.0}", per_sec);
    println!("  Per client/s:     {:>10.0}", per_sec / num_clients as f64);

    for handle in handles {
        handle.abort();
    }
}

async fn run_client(
    delivered: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (ws, _) = connect_async(SERVER_URL).await?;
    let (mut sender, mut receiver) = ws.split();

    // Binary frames so replies come back as MessagePack too.
    let join = codec::encode(&ClientEvent::JoinRoom(ROOM.to_string()))?;
    sender.send(Message::Binary(join.to_vec())).await?;

    // Wait until the join is acknowledged
    let mut recv_buf = BytesMut::with_capacity(65536);
    'joined: while let Some(result) = receiver.next().await {
        if let Message::Binary(data) = result? {
            recv_buf.extend_from_slice(&data);
            while let Some(event) = codec::decode_from::<ServerEvent>(&mut recv_buf)? {
                if matches!(event, ServerEvent::Notice(ref text) if text.ends_with(ROOM)) {
                    break 'joined;
                }
            }
        }
    }

    barrier.wait().await;

    let chat = codec::encode(&ClientEvent::send_message("x".repeat(64)))?;
    let chat_msg = Message::Binary(chat.to_vec());

    // Spawn separate receiver task for full-duplex operation
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if let Message::Binary(data) = frame {
                recv_buf.extend_from_slice(&data);
                while let Ok(Some(event)) = codec::decode_from::<ServerEvent>(&mut recv_buf) {
                    if matches!(event, ServerEvent::Message(_)) {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    });

    let mut ticker = tokio::time::interval(SEND_INTERVAL);
    loop {
        ticker.tick().await;
        if sender.send(chat_msg.clone()).await.is_err() {
            break;
        }
    }

    recv_task.abort();
    Ok(())
}
