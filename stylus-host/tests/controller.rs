//! End-to-end runs against an in-process fake controller on localhost

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stylus_core::dispatch::FailureKind;
use stylus_host::config::{parse, LinkConfig, PlotterFile};
use stylus_host::pipeline::{dispatch_with, load_table, plan, request_stop, save_table};
use stylus_host::{HostError, McLink, StdClock};
use stylus_protocol::{
    le_words, words_to_dwords, Device, Frame, FrameParser, Request, Route,
};

/// Device memory and a log of every request
#[derive(Default)]
struct Controller {
    bits: HashMap<(u8, u32), bool>,
    words: HashMap<(u8, u32), u16>,
    requests: Vec<Request>,
}

impl Controller {
    fn with_enable(enabled: bool) -> Self {
        let mut c = Self::default();
        c.bits.insert(key(&Device::parse("M3").unwrap(), 0), enabled);
        c
    }

    fn handle(&mut self, request: &Request) -> Vec<u8> {
        let mut data = Vec::new();
        match request {
            Request::ReadBits { device, points } => {
                let bits: Vec<bool> = (0..*points as u32)
                    .map(|i| self.bits.get(&key(device, i)).copied().unwrap_or(false))
                    .collect();
                for pair in bits.chunks(2) {
                    let hi = (pair[0] as u8) << 4;
                    let lo = pair.get(1).map(|&b| b as u8).unwrap_or(0);
                    data.push(hi | lo);
                }
            }
            Request::ReadWords { device, points } => {
                for i in 0..*points as u32 {
                    let w = self.words.get(&key(device, i)).copied().unwrap_or(0);
                    data.extend_from_slice(&w.to_le_bytes());
                }
            }
            Request::WriteWords { device, words } => {
                for (i, w) in words.iter().enumerate() {
                    self.words.insert(key(device, i as u32), *w);
                }
            }
            Request::WriteBits { device, bits } => {
                for (i, b) in bits.iter().enumerate() {
                    self.bits.insert(key(device, i as u32), *b);
                }
            }
        }
        self.requests.push(request.clone());
        data
    }

    fn bit(&self, name: &str) -> bool {
        let device = Device::parse(name).unwrap();
        self.bits.get(&key(&device, 0)).copied().unwrap_or(false)
    }

    fn dwords(&self, name: &str, count: u32) -> Vec<i32> {
        let device = Device::parse(name).unwrap();
        let mut bytes = Vec::new();
        for i in 0..2 * count {
            let w = self.words.get(&key(&device, i)).copied().unwrap_or(0);
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        let words: Vec<u16> = le_words(&bytes).collect();
        words_to_dwords(&words).collect()
    }

    fn writes_to(&self, name: &str) -> usize {
        let device = Device::parse(name).unwrap();
        self.requests
            .iter()
            .filter(|r| {
                matches!(r, Request::WriteWords { .. } | Request::WriteBits { .. })
                    && r.device() == device
            })
            .count()
    }
}

fn key(device: &Device, offset: u32) -> (u8, u32) {
    (device.code.code(), device.number + offset)
}

/// Serve one connection until the client hangs up
fn spawn_controller(mut controller: Controller) -> (u16, JoinHandle<Controller>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut parser = FrameParser::for_requests();
        let mut buf = [0u8; 256];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let mut rest = &buf[..n];
            while !rest.is_empty() {
                let take = rest.len().min(parser.remaining());
                if let Some(frame) = parser.feed_bytes(&rest[..take]).unwrap() {
                    let (_, request) = frame.decode_request().unwrap();
                    let data = controller.handle(&request);
                    let reply = Frame::response(Route::default(), 0, &data).unwrap();
                    stream.write_all(&reply.encode_to_vec().unwrap()).unwrap();
                }
                rest = &rest[take..];
            }
        }
        controller
    });
    (port, handle)
}

fn fast_config() -> PlotterFile {
    parse(
        r#"
[robot.motion]
tick_ms = 2
draw_speed_mm_s = 100.0
lift_dwell_ms = 4
land_dwell_ms = 4

[robot.handshake]
poll_interval_ms = 5
enable_timeout_ms = 50

[[waypoint]]
x = 0.0
y = 300.0
pen = "down"

[[waypoint]]
x = 0.0
y = 309.5
pen = "up"
"#,
    )
    .unwrap()
}

fn connect(port: u16) -> McLink<std::net::TcpStream> {
    let config = LinkConfig {
        host: "127.0.0.1".to_string(),
        port,
        timeout_ms: 2000,
    };
    McLink::connect(&config).unwrap()
}

#[test]
fn test_stream_reaches_controller() {
    let file = fast_config();
    let table = plan(&file).unwrap().table;
    let last = *table.rows().last().unwrap();

    let (port, server) = spawn_controller(Controller::with_enable(true));
    let mut link = connect(port);
    let cancel = AtomicBool::new(false);
    let report = dispatch_with(
        &mut link,
        &mut StdClock::new(),
        &file.robot.handshake,
        &table,
        &cancel,
    )
    .unwrap();
    drop(link);
    let controller = server.join().unwrap();

    assert_eq!(report.rows_sent, table.len());
    assert_eq!(report.pen_toggles, 2);
    assert_eq!(controller.writes_to("D100"), table.len());
    // Two toggles plus the final pen-up
    assert_eq!(controller.writes_to("M4"), 3);
    assert!(!controller.bit("M4"));

    let block: Vec<i64> = last.position_block().to_vec();
    let written: Vec<i64> = controller.dwords("D100", 4).into_iter().map(i64::from).collect();
    assert_eq!(written, block);
}

#[test]
fn test_enable_timeout_lifts_pen() {
    let file = fast_config();
    let table = plan(&file).unwrap().table;

    let (port, server) = spawn_controller(Controller::with_enable(false));
    let mut link = connect(port);
    let cancel = AtomicBool::new(false);
    let err = dispatch_with(
        &mut link,
        &mut StdClock::new(),
        &file.robot.handshake,
        &table,
        &cancel,
    )
    .unwrap_err();
    drop(link);
    let controller = server.join().unwrap();

    match err {
        HostError::Dispatch(failure) => {
            assert!(matches!(failure.kind, FailureKind::HandshakeTimeout { .. }));
            assert!(failure.safe_state_written);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(controller.writes_to("D100"), 0);
    assert_eq!(controller.writes_to("M4"), 1);
}

#[test]
fn test_stop_request_lifts_pen() {
    let file = fast_config();
    let table = plan(&file).unwrap().table;
    let mut handshake = file.robot.handshake.clone();
    handshake.enable_timeout_ms = None;

    let (port, server) = spawn_controller(Controller::with_enable(false));
    let mut link = connect(port);
    let cancel = Arc::new(AtomicBool::new(false));
    let stopper = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            request_stop(&cancel)
        })
    };
    let err = dispatch_with(&mut link, &mut StdClock::new(), &handshake, &table, &cancel)
        .unwrap_err();
    drop(link);
    let controller = server.join().unwrap();

    assert!(stopper.join().unwrap());
    match err {
        HostError::Dispatch(failure) => {
            assert_eq!(failure.kind, FailureKind::Cancelled);
            assert!(failure.safe_state_written);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(controller.writes_to("D100"), 0);
    assert_eq!(controller.writes_to("M4"), 1);
    assert!(!controller.bit("M4"));
}

#[test]
fn test_saved_table_replays_identically() {
    let file = fast_config();
    let table = plan(&file).unwrap().table;

    let path = std::env::temp_dir().join(format!("stylus-table-{}.stylus", std::process::id()));
    save_table(&path, &table).unwrap();
    let loaded = load_table(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, table);
}

#[test]
fn test_load_rejects_foreign_file() {
    let path = std::env::temp_dir().join(format!("stylus-junk-{}.stylus", std::process::id()));
    std::fs::write(&path, b"not a table").unwrap();
    let err = load_table(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(err, HostError::Table(_)));
}
