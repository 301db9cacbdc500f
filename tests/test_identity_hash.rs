extern crate objsync;

use objsync::monitor::{MarkState, MarkWord, MarkWordLayout};
use objsync::util::options::{InspectionMode, Options};
use objsync::util::test_util::fake_process::FakeProcess;
use objsync::util::Address;
use objsync::{InspectError, ObjectSynchronizer};

fn attach(fake: FakeProcess, mode: InspectionMode) -> ObjectSynchronizer<FakeProcess> {
    let mut options = Options::builtin();
    options.inspection_mode = mode;
    let sync = ObjectSynchronizer::with_options(fake, options);
    sync.on_layout_available();
    sync
}

#[test]
fn unlocked_hash_needs_no_monitor() {
    let mut fake = FakeProcess::builder().build();
    let obj = fake.add_object(fake.unlocked_mark(0xABCD));
    let sync = attach(fake, InspectionMode::Auto);

    let before = sync.process().reads();
    assert_eq!(sync.identity_hash_value_for(obj), Ok(0xABCD));
    assert_eq!(sync.process().reads() - before, 1);
}

#[test]
fn inflated_lock_reports_saved_hash() {
    let mut fake = FakeProcess::builder().build();
    let block = fake.add_block();
    let obj = fake.add_object(0);
    let owner = Address::from_usize(0x6000);
    let monitor = fake.set_monitor(block, 5, fake.unlocked_mark(0x1234), obj, owner, 0);
    fake.set_mark(obj, fake.monitor_mark(monitor));
    let sync = attach(fake, InspectionMode::Auto);

    assert_eq!(sync.identity_hash_value_for(obj), Ok(0x1234));
}

#[test]
fn hash_survives_inflation() {
    let mut fake = FakeProcess::builder().build();
    let block = fake.add_block();
    let unlocked = fake.unlocked_mark(0x2bad);
    let obj = fake.add_object(unlocked);
    let lock = fake.add_stack_lock(unlocked);
    let monitor = fake.set_monitor(block, 1, unlocked, obj, Address::ZERO, 0);

    // Unlocked, then lightweight-locked, then inflated. Each state is read
    // from a fresh attach, as a debugger would see successive snapshots.
    let marks = [unlocked, fake.displaced_mark(lock), fake.monitor_mark(monitor)];
    let mut fake = fake;
    for mark in marks {
        fake.set_mark(obj, mark);
        let sync = attach(fake, InspectionMode::Debugging);
        for _ in 0..3 {
            assert_eq!(sync.identity_hash_value_for(obj), Ok(0x2bad), "{:#x}", mark);
        }
        fake = sync.into_process();
    }
}

#[test]
fn displaced_header_depends_on_mode() {
    for (mode, debugging_target, expected) in [
        (InspectionMode::Auto, true, 0x77usize),
        (InspectionMode::Auto, false, 0),
        (InspectionMode::Debugging, false, 0x77),
        (InspectionMode::InProcess, true, 0),
    ] {
        let mut fake = FakeProcess::builder().debugging(debugging_target).build();
        let lock = fake.add_stack_lock(fake.unlocked_mark(0x77));
        let obj = fake.add_object(fake.displaced_mark(lock));
        let sync = attach(fake, mode);
        assert_eq!(sync.identity_hash_value_for(obj), Ok(expected), "{:?}", mode);
    }
}

#[test]
fn degraded_directory_still_decodes_unlocked_headers() {
    let mut fake = FakeProcess::builder().build();
    fake.remove_symbol("ObjectMonitor");
    let plain = fake.add_object(fake.unlocked_mark(0x99));
    let inflated = fake.add_object(fake.monitor_mark(Address::from_usize(0x4000)));
    let sync = attach(fake, InspectionMode::Auto);

    assert_eq!(sync.identity_hash_value_for(plain), Ok(0x99));
    assert!(matches!(
        sync.identity_hash_value_for(inflated),
        Err(InspectError::LayoutUnavailable(_))
    ));
}

#[test]
fn decode_states() {
    let layout = MarkWordLayout::LP64;
    let decode = |value: usize| MarkWord::new(value, layout).decode();

    assert_eq!(decode((0x42 << 8) | 0b001), Ok(MarkState::Unlocked { hash: 0x42 }));
    assert!(matches!(
        decode(0x7000 | 0b10),
        Ok(MarkState::Monitor(m)) if m.address() == Address::from_usize(0x7000)
    ));
    assert_eq!(decode(0x7008), Ok(MarkState::Displaced(Address::from_usize(0x7008))));
    assert!(matches!(decode(0x7000 | 0b101), Err(InspectError::UndecodableMark { .. })));
    assert!(matches!(decode(0x7000 | 0b11), Err(InspectError::UndecodableMark { .. })));
}
