//! Port lifecycle: naming, close, delete, ownership and identity rules

use msgport::port::{self, PortError, PortFlags, SinkBuffer};
use msgport::task;
use std::collections::HashSet;

fn setup() {
    msgport::init();
}

#[test]
fn find_by_name() {
    setup();
    let p = port::create(1, Some("test port #1")).unwrap();

    assert_eq!(port::find("test port #1").unwrap(), p);
    assert_eq!(port::find("missing").map(|_| ()), Err(PortError::InvalidHandle));

    port::delete(p).unwrap();
}

#[test]
fn close_then_drain() {
    setup();
    let p = port::create(8, Some("close then drain")).unwrap();

    port::write(p, 4, b"queued before close").unwrap();
    port::close(p).unwrap();

    assert_eq!(port::write(p, 5, b"after close"), Err(PortError::Closed));

    // Reads still drain what was queued
    let mut buf = [0u8; 32];
    let (code, n) = port::read(p, &mut buf).unwrap();
    assert_eq!(code, 4);
    assert_eq!(&buf[..n], b"queued before close");

    // Empty and closed: an immediate read finds nothing
    assert_eq!(
        port::read_etc(p, SinkBuffer::Kernel(&mut buf), PortFlags::TIMEOUT, 0).map(|_| ()),
        Err(PortError::TimedOut)
    );

    port::delete(p).unwrap();
}

#[test]
fn ids_stay_unique_across_recycling() {
    setup();

    // Hammer create/delete; no live port may ever wear an id we have
    // already seen die.
    let mut dead: HashSet<i32> = HashSet::new();
    for round in 0..64 {
        let name = format!("recycle probe {round}");
        let p = port::create(1, Some(&name)).unwrap();
        assert!(!dead.contains(&p), "id {} was reissued", p);
        port::delete(p).unwrap();
        dead.insert(p);
    }
}

#[test]
fn delete_frees_queued_payloads() {
    setup();
    let p = port::create(16, Some("delete with backlog")).unwrap();

    for i in 0..16 {
        port::write(p, i, b"undelivered payload").unwrap();
    }
    // Deleting with a full queue must reclaim every chained buffer; the
    // stale handle is then rejected.
    port::delete(p).unwrap();
    assert_eq!(port::get_info(p).map(|_| ()), Err(PortError::InvalidHandle));
}

#[test]
fn owner_reaping_deletes_all_ports_of_task() {
    setup();

    let owner = 50_001;
    let a = port::create(1, Some("reaped A")).unwrap();
    let b = port::create(2, Some("reaped B")).unwrap();
    let c = port::create(3, Some("reaped C")).unwrap();
    for id in [a, b, c] {
        port::set_owner(id, owner).unwrap();
    }

    // Keep one port of another owner alive through the reap
    let survivor = port::create(1, Some("reap survivor")).unwrap();
    port::set_owner(survivor, 50_002).unwrap();

    assert_eq!(task::exit_cleanup(owner), 3);

    assert_eq!(port::find("reaped A").map(|_| ()), Err(PortError::InvalidHandle));
    for id in [a, b, c] {
        assert_eq!(port::get_info(id).map(|_| ()), Err(PortError::InvalidHandle));
    }
    assert_eq!(port::get_info(survivor).unwrap().owner, 50_002);

    port::delete(survivor).unwrap();
}

#[test]
fn get_next_info_walks_an_owners_ports() {
    setup();

    let owner = 50_003;
    let mut created = Vec::new();
    for i in 0..5 {
        let name = format!("walk port {i}");
        let p = port::create(4, Some(&name)).unwrap();
        port::set_owner(p, owner).unwrap();
        created.push(p);
    }

    let mut cookie = 0u32;
    let mut seen = Vec::new();
    loop {
        match port::get_next_info(owner, cookie) {
            Ok((info, next)) => {
                assert_eq!(info.owner, owner);
                seen.push(info.id);
                cookie = next;
            }
            Err(PortError::NotFound) => break,
            Err(e) => panic!("unexpected iteration error: {:?}", e),
        }
    }

    assert_eq!(seen.len(), created.len());
    for p in &created {
        assert!(seen.contains(p));
    }

    for p in created {
        port::delete(p).unwrap();
    }
}

#[test]
fn info_snapshot_reflects_port_state() {
    setup();
    let p = port::create(6, Some("snapshot port")).unwrap();
    port::write(p, 1, b"abc").unwrap();

    let info = port::get_info(p).unwrap();
    assert_eq!(info.id, p);
    assert_eq!(info.capacity, 6);
    assert_eq!(info.queue_count, 1);
    assert_eq!(info.total_count, 1);
    assert_eq!(info.name_str(), "snapshot port");
    assert_eq!(info.owner, task::current_task_id());

    port::delete(p).unwrap();
}
