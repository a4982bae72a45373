//! End-to-end exchange scenarios over real TCP sessions

use exchange::{ExchangeConfig, ExchangeServer};
use services_common::protocol::{
    payload_size_for_type, AmendOrder, CancelOrder, Connect, InsertOrder, Message, MessageType,
    OrderStatusRequest, Payload, Subscribe, WIRE_HEADER_SIZE,
};
use services_common::{ErrorCode, Lifespan, Side};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestExchange {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestExchange {
    async fn start() -> Self {
        let config = ExchangeConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            event_log_dir: None,
        };
        let server = ExchangeServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_with_shutdown(async move {
            let _ = stop_rx.await;
        }));
        Self {
            addr,
            stop: Some(stop_tx),
            task,
        }
    }

    async fn shutdown(mut self) {
        let _ = self.stop.take().unwrap().send(());
        let _ = self.task.await.unwrap();
    }
}

struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        stream.set_nodelay(true).unwrap();
        Self { stream }
    }

    async fn send<P: Payload>(&mut self, payload: &P) {
        let mut frame = Vec::with_capacity(WIRE_HEADER_SIZE + P::SIZE);
        services_common::protocol::put_payload_frame(&mut frame, payload);
        self.stream.write_all(&frame).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Message {
        tokio::time::timeout(RECV_TIMEOUT, self.recv_inner())
            .await
            .expect("timed out waiting for a frame")
    }

    async fn recv_inner(&mut self) -> Message {
        let mut header = [0u8; WIRE_HEADER_SIZE];
        self.stream.read_exact(&mut header).await.unwrap();
        let size = usize::from(u16::from_be_bytes([header[1], header[2]]));
        let mut payload = vec![0u8; size];
        self.stream.read_exact(&mut payload).await.unwrap();
        let message_type = MessageType::from_u8(header[0]).expect("known type");
        assert_eq!(size, payload_size_for_type(message_type));
        Message::decode(header[0], &payload).unwrap()
    }

    /// True once the server has closed this session.
    async fn closed_by_server(&mut self) -> bool {
        let mut byte = [0u8; 1];
        matches!(
            tokio::time::timeout(RECV_TIMEOUT, self.stream.read(&mut byte)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }
}

fn gfd(request_id: u32, side: Side, price: i64, quantity: u32) -> InsertOrder {
    InsertOrder {
        client_request_id: request_id,
        side,
        price,
        quantity,
        lifespan: Lifespan::GoodForDay,
    }
}

#[tokio::test]
async fn test_connect_round_trip() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    client.send(&Connect {
        client_request_id: 1,
    })
    .await;
    match client.recv().await {
        Message::ConfirmConnected(confirm) => {
            assert!(confirm.timestamp.as_nanos() > 0);
        }
        other => panic!("expected ConfirmConnected, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_resting_insert_with_market_data() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    client.send(&Subscribe {
        client_request_id: 1,
    })
    .await;
    match client.recv().await {
        Message::OrderBookSnapshot(snapshot) => {
            assert_eq!(snapshot.bid_volumes, [0; 10]);
            assert_eq!(snapshot.ask_volumes, [0; 10]);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    client.send(&gfd(2, Side::Buy, 995, 10)).await;

    match client.recv().await {
        Message::ConfirmOrderInserted(confirm) => {
            assert_eq!(confirm.client_request_id, 2);
            assert_eq!(confirm.leaves_quantity, 10);
            assert_eq!(confirm.price, 995);
        }
        other => panic!("expected insert confirm, got {other:?}"),
    }
    match client.recv().await {
        Message::OrderInsertedEvent(event) => {
            assert_eq!(event.price, 995);
            assert_eq!(event.quantity, 10);
            assert_eq!(event.side, Side::Buy);
        }
        other => panic!("expected inserted event, got {other:?}"),
    }
    match client.recv().await {
        Message::PriceLevelUpdate(update) => {
            assert_eq!(update.side, Side::Buy);
            assert_eq!(update.price, 995);
            assert_eq!(update.total_volume, 10);
        }
        other => panic!("expected level update, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_cross_partial_rest_and_cancel() {
    let exchange = TestExchange::start().await;
    let mut maker = TestClient::connect(exchange.addr).await;
    let mut taker = TestClient::connect(exchange.addr).await;

    // Maker subscribes and rests 10 @ 995.
    maker.send(&Subscribe {
        client_request_id: 1,
    })
    .await;
    assert!(matches!(maker.recv().await, Message::OrderBookSnapshot(_)));
    maker.send(&gfd(2, Side::Buy, 995, 10)).await;
    let maker_order_id = match maker.recv().await {
        Message::ConfirmOrderInserted(confirm) => confirm.exchange_order_id,
        other => panic!("expected insert confirm, got {other:?}"),
    };
    assert!(matches!(maker.recv().await, Message::OrderInsertedEvent(_)));
    assert!(matches!(maker.recv().await, Message::PriceLevelUpdate(_)));

    // Scenario 2: sell 4 @ 990 trades at the maker price.
    taker.send(&gfd(3, Side::Sell, 990, 4)).await;
    match taker.recv().await {
        Message::PartialFill(fill) => {
            assert_eq!(fill.last_price, 995);
            assert_eq!(fill.last_quantity, 4);
            assert_eq!(fill.leaves_quantity, 0);
            assert_eq!(fill.cumulative_quantity, 4);
        }
        other => panic!("expected taker fill, got {other:?}"),
    }
    match maker.recv().await {
        Message::PartialFill(fill) => {
            assert_eq!(fill.exchange_order_id, maker_order_id);
            assert_eq!(fill.last_quantity, 4);
            assert_eq!(fill.leaves_quantity, 6);
        }
        other => panic!("expected maker fill, got {other:?}"),
    }
    match maker.recv().await {
        Message::TradeEvent(trade) => {
            assert_eq!(trade.price, 995);
            assert_eq!(trade.quantity, 4);
            assert_eq!(trade.taker_side, Side::Sell);
        }
        other => panic!("expected trade event, got {other:?}"),
    }
    match maker.recv().await {
        Message::PriceLevelUpdate(update) => {
            assert_eq!((update.side, update.price, update.total_volume), (Side::Buy, 995, 6));
        }
        other => panic!("expected level update, got {other:?}"),
    }

    // Scenario 3: sell 10 @ 990 fills the remaining 6 and rests 4.
    taker.send(&gfd(4, Side::Sell, 990, 10)).await;
    match taker.recv().await {
        Message::PartialFill(fill) => {
            assert_eq!(fill.last_price, 995);
            assert_eq!(fill.last_quantity, 6);
            assert_eq!(fill.leaves_quantity, 4);
        }
        other => panic!("expected taker fill, got {other:?}"),
    }
    let taker_order_id = match taker.recv().await {
        Message::ConfirmOrderInserted(confirm) => {
            assert_eq!(confirm.price, 990);
            assert_eq!(confirm.leaves_quantity, 4);
            confirm.exchange_order_id
        }
        other => panic!("expected rest confirm, got {other:?}"),
    };
    // Maker side: fill, trade, bid level emptied, then the new ask level.
    assert!(matches!(maker.recv().await, Message::PartialFill(_)));
    assert!(matches!(maker.recv().await, Message::TradeEvent(_)));
    match maker.recv().await {
        Message::PriceLevelUpdate(update) => {
            assert_eq!((update.side, update.price, update.total_volume), (Side::Buy, 995, 0));
        }
        other => panic!("expected bid level empty, got {other:?}"),
    }
    assert!(matches!(maker.recv().await, Message::OrderInsertedEvent(_)));
    match maker.recv().await {
        Message::PriceLevelUpdate(update) => {
            assert_eq!((update.side, update.price, update.total_volume), (Side::Sell, 990, 4));
        }
        other => panic!("expected ask level update, got {other:?}"),
    }

    // Scenario 4: cancel the resting sell.
    taker.send(&CancelOrder {
        client_request_id: 5,
        exchange_order_id: taker_order_id,
    })
    .await;
    match taker.recv().await {
        Message::ConfirmOrderCancelled(confirm) => {
            assert_eq!(confirm.exchange_order_id, taker_order_id);
            assert_eq!(confirm.leaves_quantity, 4);
        }
        other => panic!("expected cancel confirm, got {other:?}"),
    }
    assert!(matches!(maker.recv().await, Message::OrderCancelledEvent(_)));
    match maker.recv().await {
        Message::PriceLevelUpdate(update) => {
            assert_eq!((update.side, update.price, update.total_volume), (Side::Sell, 990, 0));
        }
        other => panic!("expected ask level empty, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_amend_down_then_reject_up() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    client.send(&gfd(1, Side::Buy, 980, 20)).await;
    let order_id = match client.recv().await {
        Message::ConfirmOrderInserted(confirm) => confirm.exchange_order_id,
        other => panic!("expected insert confirm, got {other:?}"),
    };

    client.send(&AmendOrder {
        client_request_id: 2,
        exchange_order_id: order_id,
        new_total_quantity: 12,
    })
    .await;
    match client.recv().await {
        Message::ConfirmOrderAmended(confirm) => {
            assert_eq!(confirm.old_total_quantity, 20);
            assert_eq!(confirm.new_total_quantity, 12);
            assert_eq!(confirm.leaves_quantity, 12);
        }
        other => panic!("expected amend confirm, got {other:?}"),
    }

    client.send(&AmendOrder {
        client_request_id: 3,
        exchange_order_id: order_id,
        new_total_quantity: 25,
    })
    .await;
    match client.recv().await {
        Message::ErrorMsg(error) => {
            assert_eq!(error.client_request_id, 3);
            assert_eq!(error.error_code(), Some(ErrorCode::InvalidVolume));
        }
        other => panic!("expected error, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_order_status_round_trip() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    client.send(&gfd(1, Side::Buy, 995, 10)).await;
    let order_id = match client.recv().await {
        Message::ConfirmOrderInserted(confirm) => confirm.exchange_order_id,
        other => panic!("expected insert confirm, got {other:?}"),
    };

    client.send(&OrderStatusRequest {
        client_request_id: 2,
        exchange_order_id: order_id,
    })
    .await;
    match client.recv().await {
        Message::OrderStatus(status) => {
            assert_eq!(status.exchange_order_id, order_id);
            assert_eq!(status.limit_price, 995);
            assert_eq!(status.leaves_quantity, 10);
            assert_eq!(status.filled_quantity, 0);
        }
        other => panic!("expected order status, got {other:?}"),
    }

    client.send(&OrderStatusRequest {
        client_request_id: 3,
        exchange_order_id: 4_242,
    })
    .await;
    match client.recv().await {
        Message::ErrorMsg(error) => {
            assert_eq!(error.error_code(), Some(ErrorCode::OrderNotFound));
        }
        other => panic!("expected error, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_foreign_cancel_unauthorised() {
    let exchange = TestExchange::start().await;
    let mut owner = TestClient::connect(exchange.addr).await;
    let mut intruder = TestClient::connect(exchange.addr).await;

    owner.send(&gfd(1, Side::Buy, 995, 10)).await;
    let order_id = match owner.recv().await {
        Message::ConfirmOrderInserted(confirm) => confirm.exchange_order_id,
        other => panic!("expected insert confirm, got {other:?}"),
    };

    intruder.send(&CancelOrder {
        client_request_id: 2,
        exchange_order_id: order_id,
    })
    .await;
    match intruder.recv().await {
        Message::ErrorMsg(error) => {
            assert_eq!(error.error_code(), Some(ErrorCode::Unauthorised));
        }
        other => panic!("expected error, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_validation_errors() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    client.send(&gfd(1, Side::Buy, 995, 0)).await;
    match client.recv().await {
        Message::ErrorMsg(error) => {
            assert_eq!(error.client_request_id, 1);
            assert_eq!(error.error_code(), Some(ErrorCode::InvalidVolume));
        }
        other => panic!("expected error, got {other:?}"),
    }

    client.send(&gfd(2, Side::Sell, 0, 5)).await;
    match client.recv().await {
        Message::ErrorMsg(error) => {
            assert_eq!(error.client_request_id, 2);
            assert_eq!(error.error_code(), Some(ErrorCode::InvalidPrice));
        }
        other => panic!("expected error, got {other:?}"),
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_reflects_book_and_sequence_is_monotonic() {
    let exchange = TestExchange::start().await;
    let mut trader = TestClient::connect(exchange.addr).await;

    trader.send(&gfd(1, Side::Buy, 998, 25)).await;
    assert!(matches!(trader.recv().await, Message::ConfirmOrderInserted(_)));
    trader.send(&gfd(2, Side::Sell, 1_002, 30)).await;
    assert!(matches!(trader.recv().await, Message::ConfirmOrderInserted(_)));

    let mut watcher = TestClient::connect(exchange.addr).await;
    watcher.send(&Subscribe {
        client_request_id: 3,
    })
    .await;
    match watcher.recv().await {
        Message::OrderBookSnapshot(snapshot) => {
            assert_eq!(snapshot.bid_prices[0], 998);
            assert_eq!(snapshot.bid_volumes[0], 25);
            assert_eq!(snapshot.ask_prices[0], 1_002);
            assert_eq!(snapshot.ask_volumes[0], 30);
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    // Live updates arrive in sequence-number order after the snapshot.
    trader.send(&gfd(4, Side::Buy, 997, 10)).await;
    trader.send(&gfd(5, Side::Sell, 1_003, 10)).await;

    let mut last_seq = None;
    for _ in 0..4 {
        let seq = match watcher.recv().await {
            Message::OrderInsertedEvent(event) => event.sequence_number,
            Message::PriceLevelUpdate(update) => update.sequence_number,
            other => panic!("unexpected market-data frame {other:?}"),
        };
        if let Some(prev) = last_seq {
            assert!(seq > prev, "sequence must be strictly increasing");
        }
        last_seq = Some(seq);
    }

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_disconnects() {
    let exchange = TestExchange::start().await;
    let mut client = TestClient::connect(exchange.addr).await;

    // Unknown type byte with a small declared size: the engine rejects it.
    client.stream.write_all(&[99, 0, 2, 1, 2]).await.unwrap();
    client.stream.flush().await.unwrap();

    assert!(client.closed_by_server().await);
    exchange.shutdown().await;
}

#[tokio::test]
async fn test_fill_and_kill_residual_acknowledged() {
    let exchange = TestExchange::start().await;
    let mut maker = TestClient::connect(exchange.addr).await;
    let mut taker = TestClient::connect(exchange.addr).await;

    maker.send(&gfd(1, Side::Buy, 995, 4)).await;
    assert!(matches!(maker.recv().await, Message::ConfirmOrderInserted(_)));

    taker.send(&InsertOrder {
        client_request_id: 2,
        side: Side::Sell,
        price: 990,
        quantity: 10,
        lifespan: Lifespan::FillAndKill,
    })
    .await;
    match taker.recv().await {
        Message::PartialFill(fill) => {
            assert_eq!(fill.last_quantity, 4);
        }
        other => panic!("expected fill, got {other:?}"),
    }
    match taker.recv().await {
        Message::ConfirmOrderInserted(confirm) => {
            assert_eq!(confirm.client_request_id, 2);
            assert_eq!(confirm.leaves_quantity, 0);
        }
        other => panic!("expected zero-leaves confirm, got {other:?}"),
    }

    exchange.shutdown().await;
}
