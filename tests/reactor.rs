use linemill::framing::SentinelParser;
use linemill::net::{config::ListenerConfig, BufferedStream, Listener, Outbound, PeerAddr};
use linemill::{Handler, Reactor, ReactorConfig};
use std::{
    cell::RefCell,
    io::{Read, Write},
    net::{Ipv4Addr, Shutdown, SocketAddr, TcpStream},
    rc::Rc,
    time::{Duration, Instant},
};

type Records = Rc<RefCell<Vec<Vec<u8>>>>;

/// Every accepted connection gets its own record log, in accept order.
type Connections = Rc<RefCell<Vec<Records>>>;

fn reactor() -> Reactor {
    let config = ReactorConfig::builder()
        .poll_timeout(Some(Duration::from_millis(20)))
        .build();
    Reactor::new(config).unwrap()
}

fn recording_listener(connections: &Connections) -> Listener {
    let connections = connections.clone();
    Listener::ipv4(
        0,
        Ipv4Addr::LOCALHOST,
        ListenerConfig::default(),
        move |stream, _peer| {
            let records = Records::default();
            connections.borrow_mut().push(records.clone());
            let parser = SentinelParser::new(move |record: &[u8], _out: &mut Outbound| {
                records.borrow_mut().push(record.to_vec())
            });
            Some(Box::new(BufferedStream::new(stream, parser)) as Box<dyn Handler>)
        },
    )
    .unwrap()
}

fn reversing_listener() -> Listener {
    Listener::ipv4(
        0,
        Ipv4Addr::LOCALHOST,
        ListenerConfig::default(),
        |stream, peer| {
            assert!(matches!(peer, PeerAddr::Inet(_)));
            let parser = SentinelParser::new(|record: &[u8], out: &mut Outbound| {
                let mut line: Vec<u8> = record.iter().rev().copied().collect();
                line.push(b'\n');
                out.write(&line);
            });
            Some(Box::new(BufferedStream::new(stream, parser)) as Box<dyn Handler>)
        },
    )
    .unwrap()
}

/// Polls until `done` holds or a few seconds have passed.
fn pump_until(reactor: &mut Reactor, mut done: impl FnMut(&Reactor) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(reactor) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        reactor.poll(Some(Duration::from_millis(20)));
    }
}

fn client(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();
    stream
}

/// Reads from a blocking client while letting the reactor run.
fn read_reply(reactor: &mut Reactor, stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut reply = Vec::new();
    let mut buf = [0u8; 256];
    while reply.len() < len {
        assert!(Instant::now() < deadline, "reply not received in time");
        reactor.poll(Some(Duration::from_millis(20)));
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => reply.extend_from_slice(&buf[..n]),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => panic!("read failed: {e}"),
        }
    }
    reply
}

#[test]
fn test_three_connections_each_get_their_own_record() {
    let connections = Connections::default();
    let listener = recording_listener(&connections);
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut clients: Vec<TcpStream> = (0..3).map(|_| client(addr)).collect();
    for c in &mut clients {
        c.write_all(b"hello\n").unwrap();
    }

    pump_until(&mut reactor, |_| {
        let conns = connections.borrow();
        conns.len() == 3 && conns.iter().all(|r| !r.borrow().is_empty())
    });

    // let any stray bytes surface before checking for crossover
    for _ in 0..5 {
        reactor.poll(Some(Duration::from_millis(10)));
    }

    let conns = connections.borrow();
    assert_eq!(conns.len(), 3);
    for records in conns.iter() {
        assert_eq!(*records.borrow(), vec![b"hello".to_vec()]);
    }
    assert_eq!(reactor.handle_count(), 4);
}

#[test]
fn test_record_then_close_removes_connection() {
    let connections = Connections::default();
    let listener = recording_listener(&connections);
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    c.write_all(b"abc\n").unwrap();
    c.shutdown(Shutdown::Write).unwrap();

    pump_until(&mut reactor, |r| {
        connections.borrow().len() == 1 && r.handle_count() == 1
    });
    assert_eq!(*connections.borrow()[0].borrow(), vec![b"abc".to_vec()]);
}

#[test]
fn test_unterminated_line_is_discarded_on_close() {
    let connections = Connections::default();
    let listener = recording_listener(&connections);
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    c.write_all(b"abc").unwrap();
    c.shutdown(Shutdown::Write).unwrap();

    pump_until(&mut reactor, |r| {
        connections.borrow().len() == 1 && r.handle_count() == 1
    });
    assert!(connections.borrow()[0].borrow().is_empty());
}

#[test]
fn test_line_split_across_writes() {
    let connections = Connections::default();
    let listener = recording_listener(&connections);
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    for piece in [&b"hel"[..], b"lo wo", b"rld\nsecond", b" line\n"] {
        c.write_all(piece).unwrap();
        c.flush().unwrap();
        for _ in 0..3 {
            reactor.poll(Some(Duration::from_millis(10)));
        }
    }

    pump_until(&mut reactor, |_| {
        connections
            .borrow()
            .first()
            .is_some_and(|r| r.borrow().len() == 2)
    });
    assert_eq!(
        *connections.borrow()[0].borrow(),
        vec![b"hello world".to_vec(), b"second line".to_vec()]
    );
}

#[test]
fn test_replies_are_flushed_in_order() {
    let listener = reversing_listener();
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    c.write_all(b"abc\nxyz\n").unwrap();
    c.write_all(b"12345\n").unwrap();

    let reply = read_reply(&mut reactor, &mut c, 14);
    assert_eq!(reply, b"cba\nzyx\n54321\n");
}

#[test]
fn test_reply_flushed_after_peer_half_close() {
    let listener = reversing_listener();
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    c.write_all(b"last words\n").unwrap();
    c.shutdown(Shutdown::Write).unwrap();

    let reply = read_reply(&mut reactor, &mut c, 11);
    assert_eq!(reply, b"sdrow tsal\n");
    pump_until(&mut reactor, |r| r.handle_count() == 1);
}

#[test]
fn test_large_reply_survives_partial_writes() {
    let listener = Listener::ipv4(
        0,
        Ipv4Addr::LOCALHOST,
        ListenerConfig::default(),
        |stream, _peer| {
            let parser = SentinelParser::new(|record: &[u8], out: &mut Outbound| {
                for _ in 0..4096 {
                    out.write(record);
                    out.write(b"\n");
                }
            });
            Some(Box::new(BufferedStream::new(stream, parser)) as Box<dyn Handler>)
        },
    )
    .unwrap();
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    let line = b"0123456789abcdefghijklmnopqrstuvwxyz0123456789abcdefghijklmnopqrstuvwxyz";
    c.write_all(line).unwrap();
    c.write_all(b"\n").unwrap();

    let expected_len = (line.len() + 1) * 4096;
    let reply = read_reply(&mut reactor, &mut c, expected_len);
    assert_eq!(reply.len(), expected_len);
    for chunk in reply.chunks(line.len() + 1) {
        assert_eq!(&chunk[..line.len()], line);
        assert_eq!(chunk[line.len()], b'\n');
    }
}

#[test]
fn test_rejected_connections_do_not_register() {
    let listener = Listener::ipv4(0, Ipv4Addr::LOCALHOST, ListenerConfig::default(), |_, _| None)
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let mut reactor = reactor();
    reactor.add(listener).unwrap();

    let mut c = client(addr);
    let reply = read_reply(&mut reactor, &mut c, 1);
    assert!(reply.is_empty());
    assert_eq!(reactor.handle_count(), 1);
}
