/*!
TCP client for the message bus

One thread reads frames and forwards them to the dispatcher's event queue,
reconnecting until the dispatcher is gone. Senders share the connection's
write half, whose writes time out so that a stalled bus cannot hold up
the dispatcher.
*/

use ipc::{read_frame, BusMessage, Error, MessageBus};
use proxy::Event;

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

const RECONNECT_SECS: u64 = 5;
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A reconnecting message bus connection
#[derive(Debug)]
pub struct BusClient {
    addr: SocketAddr,
    writer: Mutex<Option<TcpStream>>,
}

impl BusClient {
    pub fn new(addr: SocketAddr) -> BusClient {
        BusClient {
            addr,
            writer: Mutex::new(None),
        }
    }

    fn writer(&self) -> MutexGuard<Option<TcpStream>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forwards frames until the connection fails.
    /// Returns Ok if the dispatcher hung up.
    fn forward(&self, stream: &mut TcpStream, tx: &Sender<Event>) -> io::Result<()> {
        loop {
            match read_frame(stream) {
                Ok(msg) => {
                    debug!("Received {:?} from the message bus", msg.typ());
                    if tx.send(Event::Bus(msg)).is_err() {
                        return Ok(());
                    }
                }
                Err(e @ Error::UnknownType(_)) | Err(e @ Error::BadBody(_)) => {
                    warn!("Skipping bus message: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        *self.writer() = Some(stream.try_clone()?);
        Ok(stream)
    }

    /// Connects to the bus and forwards every received message to `tx`.
    /// Returns when a received message finds the receiving side of `tx`
    /// dropped. While the bus is unreachable it keeps reconnecting.
    pub fn run(&self, tx: Sender<Event>) {
        let backoff = Duration::from_secs(RECONNECT_SECS);
        loop {
            match self.connect() {
                Ok(mut stream) => {
                    info!("Connected to the message bus at {}", self.addr);
                    let res = self.forward(&mut stream, &tx);
                    *self.writer() = None;
                    match res {
                        Ok(()) => {
                            debug!("Event queue closed, leaving the message bus");
                            return;
                        }
                        Err(e) => warn!("Lost the message bus connection: {}", e),
                    }
                }
                Err(e) => warn!("Cannot connect to the message bus at {}: {}", self.addr, e),
            }
            thread::sleep(backoff);
        }
    }
}

impl MessageBus for BusClient {
    fn send(&self, msg: BusMessage) {
        let mut writer = self.writer();
        let failed = match *writer {
            Some(ref mut stream) => match msg.serialize(stream) {
                Ok(()) => {
                    trace!("Sent {:?} to the message bus", msg);
                    false
                }
                Err(e) => {
                    warn!("Could not send {:?} to the message bus: {}", msg.typ(), e);
                    // make the reader reconnect
                    let _ = stream.shutdown(Shutdown::Both);
                    true
                }
            },
            None => {
                warn!("Message bus is disconnected, dropping {:?}", msg);
                false
            }
        };
        if failed {
            *writer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc::channel;
    use ipc::RouteMod;
    use std::sync::Arc;
    use std::time::Instant;
    use types::{Match, RouteModType};

    #[test]
    fn send_while_disconnected() {
        let client = BusClient::new("127.0.0.1:9".parse().unwrap());
        client.send(BusMessage::DatapathDown { ct_id: 0, dp_id: 1 });
        assert!(client.writer().is_none());
    }

    #[test]
    fn exchange_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = Arc::new(BusClient::new(listener.local_addr().unwrap()));
        let (tx, rx) = channel();
        let reader = client.clone();
        thread::spawn(move || reader.run(tx));

        let (mut server, _) = listener.accept().unwrap();
        let map = BusMessage::DataPlaneMap {
            ct_id: 0,
            dp_id: 1,
            dp_port: 3,
            vs_id: 9,
            vs_port: 5,
        };
        map.serialize(&mut server).unwrap();
        match rx.recv().unwrap() {
            Event::Bus(msg) => assert_eq!(map, msg),
            ev => panic!("unexpected event {:?}", ev),
        }

        let down = BusMessage::DatapathDown { ct_id: 0, dp_id: 1 };
        client.send(down.clone());
        assert_eq!(down, read_frame(&mut server).unwrap());
    }

    #[test]
    fn stops_without_dispatcher() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = BusClient::new(listener.local_addr().unwrap());
        let (tx, rx) = channel();
        let handle = thread::spawn(move || client.run(tx));

        let (mut server, _) = listener.accept().unwrap();
        drop(rx);
        BusMessage::DatapathDown { ct_id: 0, dp_id: 1 }
            .serialize(&mut server)
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn stalled_bus_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = Arc::new(BusClient::new(listener.local_addr().unwrap()));
        let (tx, rx) = channel();
        let reader = client.clone();
        thread::spawn(move || reader.run(tx));

        let (mut server, _) = listener.accept().unwrap();
        // once a message came through, the writer is in place
        let down = BusMessage::DatapathDown { ct_id: 0, dp_id: 1 };
        down.serialize(&mut server).unwrap();
        rx.recv().unwrap();
        assert!(client.writer().is_some());

        let route_mod = BusMessage::RouteMod(RouteMod {
            operation: RouteModType::Add,
            dp_id: 1,
            matches: vec![Match::Ethernet([0xff; 6]); 10000],
            actions: vec![],
            options: vec![],
        });
        // the server never reads, so the socket buffers fill up
        let start = Instant::now();
        for _ in 0..1000 {
            client.send(route_mod.clone());
            if client.writer().is_none() {
                break;
            }
        }
        assert!(client.writer().is_none());
        assert!(start.elapsed() < WRITE_TIMEOUT * 5);
    }
}
