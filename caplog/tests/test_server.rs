use caplog::config::{RunConfig, RunMode};
use caplog::domain::SourceId;
use caplog::run::Session;
use caplog_common::{encode_blob_frame, encode_text_frame, fragment_line};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn server_config(output_dir: &Path) -> RunConfig {
    RunConfig {
        mode: RunMode::Server,
        listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        output_dir: output_dir.to_path_buf(),
        ..RunConfig::default()
    }
}

/// Wait until a reader has created its raw dump, i.e. the connection was accepted.
async fn wait_for(path: &Path) {
    for _ in 0..500 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} never appeared", path.display());
}

#[tokio::test]
async fn test_two_connections_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::start(server_config(dir.path())).unwrap();
    let server = session.bind().await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.run(async {
        let _ = stop_rx.await;
    }));

    // first producer: scope with a long message, written in awkward chunks
    let prefix = "CAP_LOG : P=300 T=5 C=000 ";
    let mut first = Vec::new();
    first.extend(encode_text_frame("CAP_LOG : P=300 MAX-CHAR-SIZE=60"));
    first.extend(encode_text_frame(&format!("{prefix}:-F 1 [1]::[n.cpp]::[Net::Net()] 0xA")));
    for part in fragment_line(prefix, &format!(":-> 1 [2] LOG: {}", "z".repeat(90)), 60) {
        first.extend(encode_text_frame(part.trim_end()));
    }
    first.extend(encode_blob_frame("capture.pcap", &[1, 2, 3, 4]));
    first.extend(encode_text_frame(&format!("{prefix}:-L 1 [3]::[n.cpp]::[Net::Net()] 0xA")));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for chunk in first.chunks(7) {
        stream.write_all(chunk).await.unwrap();
    }
    stream.shutdown().await.unwrap();
    drop(stream);

    // second producer leaves a long line unfinished
    let mut second = TcpStream::connect(addr).await.unwrap();
    second
        .write_all(&encode_text_frame("CAP_LOG : P=400 T=1 C=000 |+ :-> 1 [9] LOG: cut"))
        .await
        .unwrap();
    second.shutdown().await.unwrap();
    drop(second);

    wait_for(&session.workdir().raw_dump(SourceId(0))).await;
    wait_for(&session.workdir().raw_dump(SourceId(1))).await;
    stop_tx.send(()).unwrap();
    let sources = serving.await.unwrap();
    let raw_dump = session.workdir().raw_dump(SourceId(0));
    let outcome = session.finish(sources).unwrap();

    assert_eq!(outcome.summary.sources.len(), 2);
    assert_eq!(outcome.summary.sources[0].bytes, first.len() as u64);
    assert_eq!(fs::read(raw_dump).unwrap(), first);

    let report = fs::read_to_string(outcome.workdir.join("report.log")).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 3, "{report}");
    // readers run concurrently, so dense process ids depend on arrival
    assert!(lines[1].ends_with(&format!(" T0   LOG: {}", "z".repeat(90))));
    assert!(lines[2].ends_with("::[n.cpp]::[Net::Net()] 0xA"));

    let validation = fs::read_to_string(outcome.workdir.join("validation.log")).unwrap();
    let unfinished = validation.lines().find(|l| l.starts_with("[ERROR] src=src1:1 Long line on")).unwrap();
    assert!(unfinished.contains("left unfinished: source closed"));

    assert_eq!(outcome.summary.blobs.written, 1);
    assert_eq!(fs::read(outcome.workdir.join("blobs").join("capture.pcap")).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(outcome.summary.pipeline.fragments.completed, 1);
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let first = Session::start(server_config(dir.path())).unwrap();
    let server = first.bind().await.unwrap();
    let taken = server.local_addr().unwrap();

    let second = Session::start(RunConfig { listen: taken, ..server_config(dir.path()) }).unwrap();
    let err = second.bind().await.err().unwrap();
    assert!(err.to_string().contains(&taken.to_string()));
}
