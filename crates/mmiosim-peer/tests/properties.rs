use std::thread;

use mmiosim_frame::{Request, Response, STATUS_UNKNOWN_COMMAND};
use mmiosim_peer::{MmioClient, MmioServer, PeerError, ServerConfig, ShutdownHandle};

struct RunningServer {
    addr: String,
    handle: ShutdownHandle,
    thread: Option<thread::JoinHandle<mmiosim_peer::Result<()>>>,
}

impl RunningServer {
    fn start(region_capacity: usize) -> Self {
        let server = MmioServer::bind_with_config(ServerConfig {
            listen: "127.0.0.1:0".to_string(),
            region_capacity,
            ..ServerConfig::default()
        })
        .expect("server should bind");
        let addr = server.local_addr().to_string();
        let handle = server.shutdown_handle();
        let thread = thread::spawn(move || server.serve());
        Self {
            addr,
            handle,
            thread: Some(thread),
        }
    }

    fn client(&self) -> MmioClient {
        MmioClient::connect(&self.addr).expect("client should connect")
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn write_then_read_round_trips_every_length() {
    let server = RunningServer::start(0x1_0000);
    let mut client = server.client();

    for len in [0usize, 1, 3, 4, 5, 128, 4095, 4096, 4097] {
        let data = pattern(len);
        assert!(client.write_data(&data).unwrap(), "write of {len} bytes");
        let back = client.read_data(len).unwrap();
        assert_eq!(back.as_ref(), data.as_slice(), "read of {len} bytes");
    }
}

#[test]
fn handshake_is_idempotent_and_side_effect_free() {
    let server = RunningServer::start(64);
    let mut client = server.client();

    assert!(client.write_data(b"\x10\x20\x30\x40\x50\x60").unwrap());
    for _ in 0..5 {
        assert!(client.handshake().unwrap());
    }
    assert_eq!(
        client.read_data(6).unwrap().as_ref(),
        b"\x10\x20\x30\x40\x50\x60"
    );
}

#[test]
fn unknown_command_does_not_close_connection() {
    let server = RunningServer::start(64);
    let mut client = server.client();

    let response = client
        .request(&Request::Unknown {
            command: 99,
            length: 0,
        })
        .unwrap();
    assert_eq!(response, Response::Status(STATUS_UNKNOWN_COMMAND));
    assert!(client.handshake().unwrap());
}

#[test]
fn out_of_bounds_requests_are_rejected_without_mutation() {
    let server = RunningServer::start(16);
    let mut client = server.client();

    assert!(client.write_data(&pattern(16)).unwrap());
    assert!(!client.write_data(&[0xEE; 17]).unwrap());

    let err = client.read_data(17).unwrap_err();
    assert!(matches!(err, PeerError::OutOfBounds { requested: 17 }));

    // The connection survives and the region is untouched.
    assert_eq!(client.read_data(16).unwrap().as_ref(), pattern(16).as_slice());
}

#[test]
fn short_write_keeps_rest_of_first_word() {
    let server = RunningServer::start(64);
    let mut client = server.client();

    assert!(client.write_data(b"\xAA\xBB\xCC\xDD\xEE\xFF").unwrap());
    assert!(client.write_data(b"\x01\x02").unwrap());
    assert_eq!(
        client.read_data(6).unwrap().as_ref(),
        b"\x01\x02\xCC\xDD\xEE\xFF"
    );
}

#[test]
fn concurrent_clients_share_one_region() {
    let server = RunningServer::start(256);

    let workers: Vec<_> = (0..8u8)
        .map(|n| {
            let addr = server.addr.clone();
            thread::spawn(move || {
                let mut client = MmioClient::connect(&addr).unwrap();
                let data = [n; 4];
                for _ in 0..50 {
                    assert!(client.write_data(&data).unwrap());
                    // Every word read back must be some client's complete write.
                    let word = client.read_data(4).unwrap();
                    assert!(word.iter().all(|b| *b == word[0]), "torn word {word:?}");
                    assert!(word[0] < 8);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker should not panic");
    }

    let mut client = server.client();
    let word = client.read_data(4).unwrap();
    assert!(word.iter().all(|b| *b == word[0]));
}

#[test]
fn writes_are_visible_across_connections() {
    let server = RunningServer::start(64);

    let mut writer = server.client();
    assert!(writer.write_data(b"shared").unwrap());
    writer.close().unwrap();

    let mut reader = server.client();
    assert_eq!(reader.read_data(6).unwrap().as_ref(), b"shared");
}

#[test]
fn host_driver_scenario() {
    let server = MmioServer::bind("127.0.0.1:0").expect("server should bind");
    let addr = server.local_addr().to_string();
    let region = server.region();
    let handle = server.shutdown_handle();
    let serving = thread::spawn(move || server.serve());

    let mut client = MmioClient::connect(&addr).unwrap();
    assert!(client.handshake().unwrap());
    assert!(client.write_data(b"\x01\x02\x03\x04\x05").unwrap());
    assert_eq!(
        client.read_data(5).unwrap().as_ref(),
        b"\x01\x02\x03\x04\x05"
    );

    region.reset();
    assert_eq!(client.read_data(10).unwrap().as_ref(), &[0u8; 10]);

    handle.shutdown();
    serving.join().unwrap().unwrap();
}
