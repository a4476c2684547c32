#![cfg(feature = "websocket")]

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stompws_frame::{decode_frame, encode_frame, header, Command, Frame};
use stompws_session::{connect, ConnectionEvent, SessionStatus};
use tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn spawn_broker() -> (SocketAddr, JoinHandle<Vec<Command>>) {
    spawn_broker_for(&[Duration::ZERO])
}

/// Minimal STOMP broker accepting one connection per entry of
/// `disconnect_delays`, each served on its own thread. The delay is how
/// long a connection is held open after DISCONNECT arrives.
///
/// Returns the commands seen, grouped in connection order.
fn spawn_broker_for(disconnect_delays: &[Duration]) -> (SocketAddr, JoinHandle<Vec<Command>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().unwrap();
    let delays = disconnect_delays.to_vec();

    let handle = thread::spawn(move || {
        let connections: Vec<JoinHandle<Vec<Command>>> = delays
            .into_iter()
            .map(|delay| {
                let (stream, _) = listener.accept().expect("broker should accept");
                thread::spawn(move || serve_connection(stream, delay))
            })
            .collect();
        connections
            .into_iter()
            .flat_map(|connection| connection.join().expect("connection thread should finish"))
            .collect()
    });

    (addr, handle)
}

/// Answers CONNECT, turns each SEND into a greeting on every subscription,
/// closes the socket on SEND to /app/shutdown and records the commands it saw.
fn serve_connection(stream: TcpStream, disconnect_delay: Duration) -> Vec<Command> {
    let Ok(mut ws) = tungstenite::accept(stream) else {
        panic!("broker handshake should succeed");
    };
    let mut seen = Vec::new();
    let mut subscriptions = Vec::new();

    loop {
        let text = match ws.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => continue,
            Ok(_) => continue,
            Err(_) => break,
        };
        let frame = decode_frame(&text).expect("client frames should decode");
        seen.push(frame.command());

        match frame.command() {
            Command::Connect => {
                let connected = Frame::new(Command::Connected)
                    .with_header(header::VERSION, "1.2")
                    .with_header(header::SERVER, "test-broker/1.0");
                ws.send(Message::Text(encode_frame(&connected))).unwrap();
            }
            Command::Subscribe => {
                subscriptions.push(frame.header(header::ID).unwrap().to_string());
            }
            Command::Send if frame.header(header::DESTINATION) == Some("/app/shutdown") => {
                let _ = ws.close(None);
            }
            Command::Send => {
                let body = frame.body().unwrap_or_default();
                for (n, id) in subscriptions.iter().enumerate() {
                    let message = Frame::new(Command::Message)
                        .with_header(header::DESTINATION, "/topic/greetings")
                        .with_header(header::MESSAGE_ID, n.to_string())
                        .with_header(header::SUBSCRIPTION, id.as_str())
                        .with_body(format!("Hello, {body}!"));
                    ws.send(Message::Text(encode_frame(&message))).unwrap();
                }
            }
            Command::Disconnect => {
                thread::sleep(disconnect_delay);
                let _ = ws.close(None);
            }
            _ => {}
        }
    }
    seen
}

#[test]
fn subscribe_send_and_receive_over_websocket() {
    let (addr, broker) = spawn_broker();

    let session = connect(&format!("ws://{addr}/stomp")).expect("session should connect");
    assert!(session.is_connected());
    assert_eq!(session.server_version().as_deref(), Some("1.2"));

    let (tx, rx) = mpsc::channel();
    session
        .subscribe("/topic/greetings", move |frame| {
            let _ = tx.send(frame.body().unwrap_or_default().to_string());
        })
        .unwrap();
    session.send("/app/hello", "Jack").unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "Hello, Jack!");

    session.disconnect().unwrap();
    assert_eq!(session.status(), SessionStatus::Disconnected);

    let seen = broker.join().expect("broker thread should finish");
    assert_eq!(
        seen,
        vec![
            Command::Connect,
            Command::Subscribe,
            Command::Send,
            Command::Disconnect
        ]
    );
}

#[test]
fn server_close_is_reported_to_listener() {
    let (addr, broker) = spawn_broker();

    let session = connect(&format!("ws://{addr}/stomp")).expect("session should connect");
    let (tx, rx) = mpsc::channel();
    session.set_connection_listener(move |event| {
        let _ = tx.send(event.clone());
    });
    session.send("/app/shutdown", "").unwrap();

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ConnectionEvent::Disconnected { by_server: true }
    );
    assert_eq!(session.status(), SessionStatus::Disconnected);
    assert!(matches!(
        session.send("/app/hello", "late"),
        Err(stompws_session::SessionError::NotConnected)
    ));

    let seen = broker.join().expect("broker thread should finish");
    assert_eq!(seen, vec![Command::Connect, Command::Send]);
}

#[test]
fn late_close_of_previous_socket_leaves_reconnected_session_up() {
    let (addr, broker) = spawn_broker_for(&[Duration::from_millis(700), Duration::ZERO]);

    let session = connect(&format!("ws://{addr}/stomp")).expect("session should connect");
    session.disconnect().unwrap();
    session.connect_and_wait().expect("session should reconnect");
    assert!(session.is_connected());

    // The first socket finishes closing while the second one is in use.
    thread::sleep(Duration::from_millis(1500));
    assert!(session.is_connected());
    assert!(session.transport().is_open());

    let (tx, rx) = mpsc::channel();
    session
        .subscribe("/topic/greetings", move |frame| {
            let _ = tx.send(frame.body().unwrap_or_default().to_string());
        })
        .unwrap();
    session.send("/app/hello", "again").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), "Hello, again!");

    session.disconnect().unwrap();
    let seen = broker.join().expect("broker thread should finish");
    assert_eq!(
        seen,
        vec![
            Command::Connect,
            Command::Disconnect,
            Command::Connect,
            Command::Subscribe,
            Command::Send,
            Command::Disconnect
        ]
    );
}
