//! End-to-end sender/relay/receiver transfers over loopback TCP.

use ferry_core::{
    CancelToken, HeadlessUi, Receiver, ReceiverOptions, Sender, SenderOptions, TransferError,
};
use ferry_integration_tests::{CancelOnFirstChunk, DeclineOverwrites, spawn_relay, wait_until};
use ferry_relay::RegistryConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

fn sender_options(code: &str, relay: &SocketAddr) -> SenderOptions {
    SenderOptions {
        share_code: code.into(),
        relay: relay.to_string(),
        ..SenderOptions::default()
    }
}

fn receiver_options(code: &str, relay: &SocketAddr, out: &Path) -> ReceiverOptions {
    ReceiverOptions {
        share_code: code.into(),
        relay: relay.to_string(),
        out_path: out.to_path_buf(),
        assume_yes: true,
        ..ReceiverOptions::default()
    }
}

#[tokio::test]
async fn test_round_trip_reproduces_directory() {
    let (addr, registry) = spawn_relay(RegistryConfig::default()).await;

    let src = tempfile::tempdir().unwrap();
    let data = src.path().join("data");
    fs::create_dir_all(data.join("inner")).unwrap();
    fs::write(data.join("a.txt"), b"alpha").unwrap();
    // Several chunks' worth, to exercise the eof flag placement.
    fs::write(data.join("inner/b.bin"), vec![7u8; 100_000]).unwrap();
    fs::write(data.join("zero.bin"), b"").unwrap();

    let out = tempfile::tempdir().unwrap();

    let sender = Sender::new(
        sender_options("rt01-ab12", &addr),
        Arc::new(HeadlessUi { accept: true }),
        CancelToken::new(),
    );
    let paths = vec![data.clone()];
    let send_task = tokio::spawn(async move { sender.run(&paths).await });

    // The session must exist before the join.
    assert!(
        wait_until(|| {
            let registry = registry.clone();
            async move { registry.session_count().await == 1 }
        })
        .await
    );

    let receiver = Receiver::new(
        receiver_options("rt01-ab12", &addr, out.path()),
        Arc::new(HeadlessUi { accept: true }),
        CancelToken::new(),
    );
    receiver.run().await.unwrap();
    send_task.await.unwrap().unwrap();

    assert_eq!(
        fs::read(out.path().join("data/a.txt")).unwrap(),
        b"alpha".to_vec()
    );
    assert_eq!(
        fs::read(out.path().join("data/inner/b.bin")).unwrap(),
        vec![7u8; 100_000]
    );
    assert!(fs::read(out.path().join("data/zero.bin")).unwrap().is_empty());
}

#[tokio::test]
async fn test_overwrite_declined_on_only_file_finishes_both_sides() {
    let (addr, registry) = spawn_relay(RegistryConfig::default()).await;

    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("same.txt"), b"new content").unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(out.path().join("same.txt"), b"old content").unwrap();

    let sender = Sender::new(
        sender_options("sk01-ab12", &addr),
        Arc::new(HeadlessUi { accept: true }),
        CancelToken::new(),
    );
    let paths = vec![src.path().join("same.txt")];
    let send_task = tokio::spawn(async move { sender.run(&paths).await });

    assert!(
        wait_until(|| {
            let registry = registry.clone();
            async move { registry.session_count().await == 1 }
        })
        .await
    );

    let receiver = Receiver::new(
        ReceiverOptions {
            share_code: "sk01-ab12".into(),
            relay: addr.to_string(),
            out_path: out.path().to_path_buf(),
            assume_yes: false,
            ..ReceiverOptions::default()
        },
        Arc::new(DeclineOverwrites),
        CancelToken::new(),
    );
    receiver.run().await.unwrap();

    // Skipping the last file still ends the sender cleanly.
    send_task.await.unwrap().unwrap();
    assert_eq!(
        fs::read(out.path().join("same.txt")).unwrap(),
        b"old content".to_vec()
    );
}

#[tokio::test]
async fn test_interrupt_mid_transfer_notifies_peer_and_cleans_temp_zip() {
    let (addr, registry) = spawn_relay(RegistryConfig::default()).await;

    let src = tempfile::tempdir().unwrap();
    let bundle = src.path().join("ix-payload");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("f.txt"), b"zipped along").unwrap();
    // More than one chunk, so the cancellation lands mid-run.
    fs::write(src.path().join("big.bin"), vec![3u8; 200_000]).unwrap();
    let out = tempfile::tempdir().unwrap();

    let cancel = CancelToken::new();
    let sender = Sender::new(
        SenderOptions {
            share_code: "ix01-ab12".into(),
            relay: addr.to_string(),
            zip: true,
            ..SenderOptions::default()
        },
        Arc::new(CancelOnFirstChunk::new(cancel.clone())),
        cancel,
    );
    let paths = vec![bundle, src.path().join("big.bin")];
    let send_task = tokio::spawn(async move { sender.run(&paths).await });

    assert!(
        wait_until(|| {
            let registry = registry.clone();
            async move { registry.session_count().await == 1 }
        })
        .await
    );

    let receiver = Receiver::new(
        receiver_options("ix01-ab12", &addr, out.path()),
        Arc::new(HeadlessUi { accept: true }),
        CancelToken::new(),
    );
    // The peer is told about the interrupt and terminates on it.
    let received = receiver.run().await;
    assert!(matches!(received, Err(TransferError::Cancelled)));

    let sent = send_task.await.unwrap();
    assert!(matches!(sent, Err(TransferError::Interrupted)));

    // The temporary archive is removed on the interrupted exit path too.
    assert!(!std::env::temp_dir().join("ix-payload.zip").exists());
}

#[tokio::test]
async fn test_receiver_refusal_rejects_sender() {
    let (addr, registry) = spawn_relay(RegistryConfig::default()).await;

    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("secret.txt"), b"nope").unwrap();
    let out = tempfile::tempdir().unwrap();

    let sender = Sender::new(
        sender_options("rf01-ab12", &addr),
        Arc::new(HeadlessUi { accept: true }),
        CancelToken::new(),
    );
    let paths = vec![src.path().join("secret.txt")];
    let send_task = tokio::spawn(async move { sender.run(&paths).await });

    assert!(
        wait_until(|| {
            let registry = registry.clone();
            async move { registry.session_count().await == 1 }
        })
        .await
    );

    let receiver = Receiver::new(
        ReceiverOptions {
            share_code: "rf01-ab12".into(),
            relay: addr.to_string(),
            out_path: out.path().to_path_buf(),
            assume_yes: false,
            ..ReceiverOptions::default()
        },
        Arc::new(HeadlessUi { accept: false }),
        CancelToken::new(),
    );
    // Declining is a successful receiver run.
    receiver.run().await.unwrap();

    let sent = send_task.await.unwrap();
    assert!(matches!(sent, Err(TransferError::Refused)));
    assert!(!out.path().join("secret.txt").exists());
}
