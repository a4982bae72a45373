//! Simulator driving a live exchange end to end

use exchange::{ExchangeConfig, ExchangeServer};
use simulator::{MarketSimulator, SimulatorConfig};
use services_common::protocol::{
    payload_size_for_type, Message, MessageType, Payload, Subscribe, WIRE_HEADER_SIZE,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn recv_message(stream: &mut TcpStream) -> Message {
    let mut header = [0u8; WIRE_HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    let size = usize::from(u16::from_be_bytes([header[1], header[2]]));
    let mut payload = vec![0u8; size];
    stream.read_exact(&mut payload).await.unwrap();
    let message_type = MessageType::from_u8(header[0]).expect("known type");
    assert_eq!(size, payload_size_for_type(message_type));
    Message::decode(header[0], &payload).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulator_populates_the_exchange_book() {
    let server = ExchangeServer::bind(&ExchangeConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        event_log_dir: None,
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = stop_rx.await;
    }));

    let sim = MarketSimulator::connect(SimulatorConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        seed: 42,
        stream: 1,
        ..SimulatorConfig::default()
    })
    .await
    .unwrap();

    // Let the simulator seed the book and trade for a while.
    sim.run_with_shutdown(tokio::time::sleep(Duration::from_millis(400)))
        .await
        .unwrap();

    // An independent observer subscribes and inspects the surviving book.
    let mut observer = TcpStream::connect(addr).await.unwrap();
    let mut frame = Vec::with_capacity(WIRE_HEADER_SIZE + <Subscribe as Payload>::SIZE);
    services_common::protocol::put_payload_frame(
        &mut frame,
        &Subscribe {
            client_request_id: 1,
        },
    );
    observer.write_all(&frame).await.unwrap();
    observer.flush().await.unwrap();

    let snapshot = match tokio::time::timeout(Duration::from_secs(5), recv_message(&mut observer))
        .await
        .expect("snapshot in time")
    {
        Message::OrderBookSnapshot(snapshot) => snapshot,
        other => panic!("expected snapshot, got {other:?}"),
    };

    let bid_total: u64 = snapshot.bid_volumes.iter().map(|&v| u64::from(v)).sum();
    let ask_total: u64 = snapshot.ask_volumes.iter().map(|&v| u64::from(v)).sum();
    assert!(
        bid_total + ask_total > 0,
        "the simulator should leave resting liquidity behind"
    );
    // No crossed book ever leaves the matching engine.
    if snapshot.bid_prices[0] > 0 && snapshot.ask_prices[0] > 0 {
        assert!(snapshot.bid_prices[0] < snapshot.ask_prices[0]);
    }

    let _ = stop_tx.send(());
    server_task.await.unwrap().unwrap();
}
