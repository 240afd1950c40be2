mod common;

use std::{
    ops::ControlFlow,
    panic::{AssertUnwindSafe, catch_unwind},
};

use kwalk_core::{
    FieldExtractor, MemoryPort as _, OffsetTable, OsFamily, Traversal, TraversalState,
    TranslationMechanism, Va, WalkCore, WalkError,
};

use self::common::{MockDriver, link_list};

const HEAD: u64 = 0x10000;
const NODE_A: u64 = 0x20000;
const NODE_B: u64 = 0x30000;
const NODE_C: u64 = 0x38000;

/// Records are `{ next: *node @ 0x0, name: [u8; 16] @ 0x10, pid: u32 @ 0x18 }`.
fn offsets() -> OffsetTable {
    OffsetTable::new(
        OsFamily::Linux,
        [("next", 0x0), ("name", 0x10), ("pid", 0x18)],
    )
}

fn write_record(driver: &MockDriver, node: u64, name: &str, pid: u32) {
    driver.write_cstring(node + 0x10, name);
    driver.write_u32(node + 0x18, pid);
}

fn target() -> WalkCore<MockDriver> {
    let driver = MockDriver::new();
    link_list(&driver, HEAD, &[NODE_A, NODE_B, NODE_C], 0x0);
    write_record(&driver, NODE_A, "A", 7);
    write_record(&driver, NODE_B, "B", 42);
    write_record(&driver, NODE_C, "C", 99);
    WalkCore::new(driver)
}

fn two_node_target() -> WalkCore<MockDriver> {
    let driver = MockDriver::new();
    link_list(&driver, HEAD, &[NODE_A, NODE_B], 0x0);
    write_record(&driver, NODE_A, "A", 7);
    write_record(&driver, NODE_B, "B", 42);
    WalkCore::new(driver)
}

#[test]
fn collects_pid_and_name_of_every_record() -> Result<(), WalkError> {
    let core = two_node_target();
    let offsets = offsets();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let records = traversal.run(|space| {
        let fields = FieldExtractor::new(space, &offsets);

        traversal
            .walk(Va(HEAD), 0x0, 0x0)?
            .map(|record| -> Result<(u32, String), WalkError> {
                let record = record?;
                Ok((
                    fields.read_u32(record, "pid")?,
                    fields.read_cstring(record, "name", 16)?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(records, [(7, String::from("A")), (42, String::from("B"))]);
    assert_eq!(core.driver().pauses.get(), 1);
    assert_eq!(core.driver().resumes.get(), 1);
    Ok(())
}

#[test]
fn find_by_pid_short_circuits() -> Result<(), WalkError> {
    let core = target();
    let offsets = offsets();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);
    let mut visited = Vec::new();

    let found = traversal.for_each_record(Va(HEAD), 0x0, 0x0, |space, record| {
        visited.push(record);

        let fields = FieldExtractor::new(space, &offsets);
        if fields.read_u32(record, "pid")? == 42 {
            return Ok(ControlFlow::Break((42, fields.read_cstring(record, "name", 16)?)));
        }

        Ok(ControlFlow::Continue(()))
    })?;

    assert_eq!(found, Some((42, String::from("B"))));
    assert_eq!(visited, [Va(NODE_A), Va(NODE_B)]);
    assert!(core.driver().balanced());
    assert_eq!(core.driver().resumes.get(), 1);
    Ok(())
}

#[test]
fn find_record_returns_none_when_absent() -> Result<(), WalkError> {
    let core = target();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let found = traversal.find_record(Va(HEAD), 0x0, 0x0, |space, record| {
        Ok(space.read_u32(record + 0x18)? == 1234)
    })?;

    assert_eq!(found, None);
    assert_eq!(core.driver().pauses.get(), 1);
    assert_eq!(core.driver().resumes.get(), 1);
    Ok(())
}

#[test]
fn read_error_mid_walk_still_resumes() {
    let core = target();
    core.driver().write_u64(NODE_B, 0xdead0000);
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let result = traversal.for_each_record(Va(HEAD), 0x0, 0x0, |_, _| {
        Ok(ControlFlow::<()>::Continue(()))
    });

    assert!(result.is_err_and(|err| err.is_read_error()));
    assert_eq!(core.driver().pauses.get(), 1);
    assert_eq!(core.driver().resumes.get(), 1);
    assert_eq!(traversal.state(), TraversalState::Unpaused);
}

#[test]
fn pause_failure_never_walks_or_resumes() {
    let core = target();
    core.driver().fail_pause.set(true);
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);
    let mut visits = 0;

    let result = traversal.for_each_record(Va(HEAD), 0x0, 0x0, |_, _| {
        visits += 1;
        Ok(ControlFlow::<()>::Continue(()))
    });

    assert!(matches!(result, Err(WalkError::Pause(_))));
    assert_eq!(visits, 0);
    assert_eq!(core.driver().resumes.get(), 0);
    assert_eq!(traversal.state(), TraversalState::Unpaused);
}

#[test]
fn resume_failure_does_not_fail_the_scan() -> Result<(), WalkError> {
    let core = target();
    core.driver().fail_resume.set(true);
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let found = traversal.find_record(Va(HEAD), 0x0, 0x0, |space, record| {
        Ok(space.read_u32(record + 0x18)? == 99)
    })?;

    assert_eq!(found, Some(Va(NODE_C)));
    assert_eq!(core.driver().resumes.get(), 1);
    Ok(())
}

#[test]
fn panicking_scan_still_resumes() {
    let core = target();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let result = catch_unwind(AssertUnwindSafe(|| {
        traversal.run(|_| -> Result<(), WalkError> { panic!("scan failed") })
    }));

    assert!(result.is_err());
    assert_eq!(core.driver().pauses.get(), 1);
    assert_eq!(core.driver().resumes.get(), 1);
    assert_eq!(traversal.state(), TraversalState::Unpaused);
}

#[test]
fn state_is_scanning_inside_the_window() -> Result<(), WalkError> {
    let core = target();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    assert_eq!(traversal.state(), TraversalState::Unpaused);
    let inside = traversal.run(|_| Ok(traversal.state()))?;

    assert_eq!(inside, TraversalState::Scanning);
    assert_eq!(traversal.state(), TraversalState::Unpaused);
    Ok(())
}

#[test]
fn nested_run_is_rejected() -> Result<(), WalkError> {
    let core = target();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);

    let nested = traversal.run(|_| Ok(traversal.run(|_| Ok(())).is_err()))?;

    assert!(nested);
    assert_eq!(core.driver().pauses.get(), 1);
    assert!(core.driver().balanced());
    Ok(())
}

#[test]
fn memory_is_reread_after_resume() -> Result<(), WalkError> {
    let core = target();
    let traversal = Traversal::new(&core, TranslationMechanism::Direct);
    let pid = |space: kwalk_core::AddressSpace<'_, MockDriver>| space.read_u32(Va(NODE_A + 0x18));

    assert_eq!(traversal.run(pid)?, 7);
    core.driver().write_u32(NODE_A + 0x18, 8);
    assert_eq!(traversal.run(pid)?, 8);
    Ok(())
}

#[test]
fn walk_cap_applies_inside_traversal() {
    let core = target();
    core.driver().write_u64(NODE_C, NODE_A);
    let traversal = Traversal::new(&core, TranslationMechanism::Direct).with_limit(5);

    let result = traversal.for_each_record(Va(HEAD), 0x0, 0x0, |_, _| {
        Ok(ControlFlow::<()>::Continue(()))
    });

    assert!(matches!(
        result,
        Err(WalkError::WalkOverrun { limit: 5, .. })
    ));
    assert!(core.driver().balanced());
}
