//! Message round-trip and queue accounting
//!
//! Single-task messaging behavior: round trips, short reads, counts,
//! peeks and timeout edges.

use msgport::port::{self, PortError, PortFlags, SinkBuffer, SourceBuffer};

fn setup() {
    msgport::init();
}

#[test]
fn round_trip_preserves_code_and_bytes() {
    setup();
    let p = port::create(10, Some("rt basic")).unwrap();

    port::write(p, 666, b"abcd").unwrap();

    let mut buf = [0u8; 16];
    let (code, n) = port::read(p, &mut buf).unwrap();
    assert_eq!(code, 666);
    assert_eq!(n, 4);
    assert_eq!(&buf[..n], b"abcd");

    port::delete(p).unwrap();
}

#[test]
fn round_trip_at_maximum_message_size() {
    setup();
    let p = port::create(1, Some("rt max size")).unwrap();

    let src: Vec<u8> = (0..msgport::config::PORT_MAX_MESSAGE_SIZE)
        .map(|i| (i % 253) as u8)
        .collect();
    port::write(p, 9, &src).unwrap();

    let mut buf = vec![0u8; src.len() + 10];
    let (code, n) = port::read(p, &mut buf).unwrap();
    assert_eq!(code, 9);
    assert_eq!(n, src.len());
    assert_eq!(&buf[..n], &src[..]);

    port::delete(p).unwrap();
}

#[test]
fn byte_count_is_min_of_buffer_and_payload() {
    setup();
    let p = port::create(4, Some("rt truncation")).unwrap();

    // Short, exact and oversized receive buffers
    for (bufsize, expect) in [(3usize, 3usize), (4, 4), (5, 4)] {
        port::write(p, bufsize as i32, b"abcd").unwrap();
        let mut buf = vec![0u8; bufsize];
        let (_, n) = port::read(p, &mut buf).unwrap();
        assert_eq!(n, expect);
        assert_eq!(&buf[..n], &b"abcd"[..n]);
    }

    port::delete(p).unwrap();
}

#[test]
fn count_tracks_writes_across_ports() {
    setup();
    let p1 = port::create(1, Some("count port #1")).unwrap();
    let p2 = port::create(10, Some("count port #2")).unwrap();
    let p3 = port::create(1024, Some("count port #3")).unwrap();

    port::write(p1, 1, b"abcd").unwrap();
    port::write(p2, 666, b"abcd").unwrap();
    port::write(p3, 999, b"abcd").unwrap();

    assert_eq!(port::count(p1).unwrap(), 1);
    assert_eq!(port::count(p2).unwrap(), 1);
    assert_eq!(port::count(p3).unwrap(), 1);

    for p in [p1, p2, p3] {
        port::delete(p).unwrap();
    }
}

#[test]
fn empty_port_timed_read_consumes_nothing() {
    setup();
    let p = port::create(1024, Some("empty timed read")).unwrap();

    let mut buf = [0u8; 4];
    let res = port::read_etc(p, SinkBuffer::Kernel(&mut buf), PortFlags::TIMEOUT, 1_000_000);
    assert_eq!(res.map(|_| ()), Err(PortError::TimedOut));
    assert_eq!(port::count(p).unwrap(), 0);

    // The port still works afterwards
    port::write(p, 5, b"later").unwrap();
    let (code, n) = port::read(p, &mut buf).unwrap();
    assert_eq!(code, 5);
    assert_eq!(n, 4);

    port::delete(p).unwrap();
}

#[test]
fn full_port_timed_write_is_rejected() {
    setup();
    let p = port::create(1, Some("full timed write")).unwrap();

    port::write(p, 1, b"abcd").unwrap();
    let res = port::write_etc(
        p,
        2,
        SourceBuffer::Kernel(b"abcd"),
        PortFlags::TIMEOUT,
        1_000_000,
    );
    assert_eq!(res, Err(PortError::TimedOut));

    // Drain, then the next write goes through immediately
    let mut buf = [0u8; 8];
    let (code, _) = port::read(p, &mut buf).unwrap();
    assert_eq!(code, 1);
    port::write(p, 3, b"abcd").unwrap();

    port::delete(p).unwrap();
}

#[test]
fn buffer_size_reports_next_message_without_consuming() {
    setup();
    let p = port::create(8, Some("peek sizes")).unwrap();

    port::write(p, 1, b"abc").unwrap();
    port::write(p, 2, b"abcdef").unwrap();

    assert_eq!(port::buffer_size(p).unwrap(), 3);
    assert_eq!(port::count(p).unwrap(), 2);

    let mut buf = [0u8; 8];
    port::read(p, &mut buf).unwrap();
    assert_eq!(port::buffer_size(p).unwrap(), 6);

    port::delete(p).unwrap();
}

#[test]
fn zero_length_messages_carry_only_codes() {
    setup();
    let p = port::create(4, Some("zero length")).unwrap();

    for code in [10, 20, 30] {
        port::write(p, code, b"").unwrap();
    }
    let mut buf = [0u8; 1];
    for code in [10, 20, 30] {
        let (got, n) = port::read(p, &mut buf).unwrap();
        assert_eq!(got, code);
        assert_eq!(n, 0);
    }

    port::delete(p).unwrap();
}
