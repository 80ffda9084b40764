//! Independent sessions running in parallel tasks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use broadlink_protocol::core::packet::command;
use broadlink_protocol::protocol::session::Session;
use common::{session_config, spawn_udp_device, FakeTransport, Responder, MAC};
use std::net::SocketAddr;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_keep_separate_counters() {
    let sessions = 8usize;
    let requests = 50usize;

    let mut tasks = JoinSet::new();
    for i in 0..sessions {
        tasks.spawn(async move {
            let transport = FakeTransport::new(Responder::acking());
            let addr = SocketAddr::from(([10, 0, 0, i as u8 + 1], 80));
            let mut session =
                Session::with_transport(addr, 0x2737, MAC, Box::new(transport.clone()), &session_config());

            session.handshake().await.unwrap();
            for _ in 0..requests {
                session.request(command::CONTROL, &[i as u8]).await.unwrap();
            }

            let counters: Vec<u16> = transport.seen().iter().map(|h| h.counter).collect();
            assert_eq!(counters.len(), requests + 1);
            assert!(counters.windows(2).all(|w| w[1] == w[0] + 1));
            session.counter()
        });
    }

    while let Some(res) = tasks.join_next().await {
        assert_eq!(res.unwrap(), 0x8100 + 51);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_over_udp() {
    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        tasks.spawn(async move {
            let addr = spawn_udp_device(Responder::acking()).await;
            let config = broadlink_protocol::config::SessionConfig {
                local_address: Some("127.0.0.1:0".into()),
                ..session_config()
            };
            let mut session = Session::new(addr, 0x2737, MAC, &config).unwrap();
            session.handshake().await.unwrap();
            for _ in 0..10 {
                session.request(command::CONTROL, &[0xaa; 20]).await.unwrap();
            }
            session.counter()
        });
    }

    while let Some(res) = tasks.join_next().await {
        assert_eq!(res.unwrap(), 0x8100 + 11);
    }
}
