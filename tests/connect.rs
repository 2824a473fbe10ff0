//! Connection setup against a local listener acting as server

mod common;

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use pretty_assertions::assert_eq;
use zero_traindb::constant::SqlState;
use zero_traindb::error::Error;
use zero_traindb::handler::StatementResultHandler;
use zero_traindb::sync::{Conn, ConnectionFactory};
use zero_traindb::{HostSpec, Opts, Properties};

use common::init_tracing;

fn read_message(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 5];
    stream.read_exact(&mut header).expect("header");
    let len = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    let mut body = vec![0u8; len as usize - 4];
    stream.read_exact(&mut body).expect("body");
    (header[0], body)
}

fn message(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Accept one connection, check the startup message and answer one query with `SELECT 1`
fn serve_one(listener: TcpListener) -> thread::JoinHandle<serde_json::Value> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let (tag, body) = read_message(&mut stream);
        assert_eq!(tag, b'S');
        let startup: serde_json::Value = serde_json::from_slice(&body).expect("json");

        let (tag, body) = read_message(&mut stream);
        assert_eq!(tag, b'E');
        assert_eq!(body, b"SELECT 1");

        let mut reply = Vec::new();
        let mut desc = 1_i16.to_be_bytes().to_vec();
        desc.extend_from_slice(b"?column?\0");
        desc.extend_from_slice(&4_i32.to_be_bytes());
        desc.extend_from_slice(&(-1_i32).to_be_bytes());
        desc.extend_from_slice(&0_i16.to_be_bytes());
        reply.push(b'T');
        reply.extend(desc);
        let mut row = 1_i16.to_be_bytes().to_vec();
        row.extend_from_slice(&1_i32.to_be_bytes());
        row.push(b'1');
        reply.extend(message(b'D', &row));
        reply.extend(message(b'C', b"SELECT 1\0"));
        stream.write_all(&reply).expect("reply");
        startup
    })
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

#[test]
fn test_startup_message_and_first_query() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = serve_one(listener);

    let url = format!("jdbc:traindb://127.0.0.1:{port}/sales?password=pw");
    let mut info = Properties::new();
    info.insert("user".to_string(), "alice".to_string());
    let factory = ConnectionFactory::new();
    assert!(factory.accepts_url(&url));
    let mut executor = factory.connect(&url, &info).expect("connect");

    let mut handler = StatementResultHandler::new();
    executor.execute("SELECT 1", &mut handler).expect("execute");
    assert_eq!(handler.results().len(), 1);

    let startup = server.join().expect("server");
    assert_eq!(startup["url"], url.as_str());
    assert_eq!(startup["user"], "alice");
    assert_eq!(startup["password"], "pw");
}

#[test]
fn test_hosts_are_tried_in_order() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = serve_one(listener);

    let opts = Opts {
        hosts: vec![
            HostSpec::new("127.0.0.1", unused_port()),
            HostSpec::new("127.0.0.1", port),
        ],
        user: "bob".to_string(),
        tcp_keep_alive: true,
        receive_buffer_size: 0,
        send_buffer_size: 65536,
        ..Opts::default()
    };
    let mut conn = Conn::from_executor(ConnectionFactory::new().open(&opts).expect("open"));
    let mut rs = conn.query("SELECT 1").expect("query");
    assert!(rs.next());
    assert_eq!(rs.get::<i32>(1).expect("value"), Some(1));

    let startup = server.join().expect("server");
    assert_eq!(startup["user"], "bob");
}

#[test]
fn test_login_timeout_path() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = serve_one(listener);

    let mut conn = Conn::new(format!("jdbc:traindb://127.0.0.1:{port}?loginTimeout=5&user=carol"))
        .expect("connect");
    conn.query("SELECT 1").expect("query");
    assert_eq!(server.join().expect("server")["user"], "carol");
}

#[test]
fn test_unable_to_connect() {
    let opts = Opts {
        hosts: vec![HostSpec::new("127.0.0.1", unused_port())],
        ..Opts::default()
    };
    let err = ConnectionFactory::new().open(&opts).expect_err("refused");
    assert!(matches!(err, Error::ConnectionUnableToConnect(_)));
    assert_eq!(err.sql_state(), SqlState::CONNECTION_UNABLE_TO_CONNECT);
}

#[test]
fn test_rejects_foreign_url() {
    let factory = ConnectionFactory::new();
    assert!(!factory.accepts_url("jdbc:postgresql://localhost/db"));
    assert!(matches!(
        factory.connect("mysql://localhost", &Properties::new()),
        Err(Error::BadConfigError(_))
    ));
}
