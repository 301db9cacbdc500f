extern crate objsync;

use objsync::monitor::ObjectMonitor;
use objsync::util::options::Options;
use objsync::util::test_util::fake_process::FakeProcess;
use objsync::util::{Address, ObjectReference};
use objsync::ObjectSynchronizer;

fn attach(fake: FakeProcess) -> ObjectSynchronizer<FakeProcess> {
    let sync = ObjectSynchronizer::with_options(fake, Options::builtin());
    assert!(sync.on_layout_available());
    sync
}

fn addresses(sync: &ObjectSynchronizer<FakeProcess>) -> Vec<Address> {
    sync.object_monitor_iterator()
        .expect("monitors are observable")
        .map(|m| m.map(|m: ObjectMonitor| m.address()))
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn one_block_yields_slots_in_descending_order() {
    let mut fake = FakeProcess::builder().block_size(4).build();
    let b0 = fake.add_block();
    let mut records = vec![];
    for index in 1..4 {
        let obj = fake.add_object(0);
        records.push(fake.set_monitor(b0, index, fake.unlocked_mark(index), obj, Address::ZERO, 0));
    }
    let sync = attach(fake);

    let mut iter = sync.object_monitor_iterator().unwrap();
    for expected in records.iter().rev() {
        assert_eq!(iter.has_next(), Ok(true));
        assert_eq!(iter.next().unwrap().unwrap().address(), *expected);
    }
    assert_eq!(iter.has_next(), Ok(false));
    assert!(iter.next().is_none());
}

#[test]
fn two_linked_blocks() {
    let mut fake = FakeProcess::builder().block_size(4).build();
    let b0 = fake.add_block();
    let b1 = fake.add_block();
    let stride = fake.monitor_layout().stride;
    let sync = attach(fake);

    let expected: Vec<Address> = [b0, b1]
        .iter()
        .flat_map(|base| (1..4).rev().map(move |i| *base + i * stride))
        .collect();
    assert_eq!(addresses(&sync), expected);
    assert_eq!(sync.monitor_count(), Ok(6));
}

#[test]
fn yields_every_record_slot() {
    for (blocks, block_size) in [(1, 2), (3, 5), (7, 128)] {
        let mut fake = FakeProcess::builder().block_size(block_size).build();
        let bases: Vec<Address> = (0..blocks).map(|_| fake.add_block()).collect();
        let stride = fake.monitor_layout().stride;
        let sync = attach(fake);

        let walked = addresses(&sync);
        assert_eq!(walked.len(), blocks * (block_size - 1));
        for (n, base) in bases.iter().enumerate() {
            let chunk = &walked[n * (block_size - 1)..(n + 1) * (block_size - 1)];
            for (k, addr) in chunk.iter().enumerate() {
                assert_eq!(*addr, *base + (block_size - 1 - k) * stride);
            }
        }
    }
}

#[test]
fn stride_is_cache_line_aligned() {
    for line in [32, 64, 128, 256] {
        let fake = FakeProcess::builder().cache_line_size(line).build();
        let size = fake.monitor_type_size();
        let sync = attach(fake);
        let stride = sync.directory().unwrap().record_stride().unwrap();
        assert_eq!(stride % line, 0);
        assert!(stride >= size);
    }
}

#[test]
fn missing_symbols_hide_monitors() {
    let symbols = [
        "ObjectMonitor",
        "ObjectSynchronizer",
        "ObjectSynchronizer::_BLOCKSIZE",
        "DEFAULT_CACHE_LINE_SIZE",
    ];
    for symbol in symbols {
        let mut fake = FakeProcess::builder().build();
        let b0 = fake.add_block();
        let obj = fake.add_object(0);
        fake.set_monitor(b0, 1, fake.unlocked_mark(1), obj, Address::ZERO, 0);
        fake.remove_symbol(symbol);
        let sync = attach(fake);

        assert!(sync.object_monitor_iterator().is_none(), "{} missing", symbol);
        assert_eq!(sync.live_monitors(), Ok(vec![]));
        assert_eq!(sync.monitor_count(), Ok(0));
    }
}

#[test]
fn live_monitor_snapshots() {
    let mut fake = FakeProcess::builder().block_size(3).build();
    let b0 = fake.add_block();
    let b1 = fake.add_block();
    let a = fake.add_object(0);
    let b = fake.add_object(0);
    let owner = Address::from_usize(0x7fff_0000);
    let ma = fake.set_monitor(b0, 1, fake.unlocked_mark(0xa), a, owner, 2);
    let mb = fake.set_monitor(b1, 2, fake.unlocked_mark(0xb), b, Address::ZERO, 0);
    fake.set_monitor_counters(ma, 1, 0);
    fake.set_monitor_counters(mb, 0, 3);
    // A freed slot keeps its stale header but no object.
    fake.set_monitor(b1, 1, fake.unlocked_mark(0xc), ObjectReference::NULL, Address::ZERO, 0);
    let sync = attach(fake);

    let live = sync.live_monitors().unwrap();
    let summary: Vec<_> = live
        .iter()
        .map(|r| {
            (
                r.monitor.address(),
                r.object,
                r.is_owned(),
                r.recursions,
                r.contentions,
                r.waiters,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (ma, a, true, 2, Some(1), Some(0)),
            (mb, b, false, 0, Some(0), Some(3)),
        ]
    );
    assert!(live.iter().all(|r| r.is_live));
    assert_eq!(live[0].header.hash(), Ok(0xa));
}
