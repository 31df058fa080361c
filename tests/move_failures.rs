use part_move::device::memory::{FaultPoint, MemoryDisk};
use part_move::{
    CancelToken, DriveLayout, MoveOutcome, MoveProgress, MoveRequest, Mover, PartMoveError,
    PartitionStyle, Result,
};

const SRC: u64 = 8192;
const DST: u64 = 2048;
const SIZE: u64 = 4096;

fn setup() -> (MemoryDisk, DriveLayout) {
    let layout = DriveLayout::from_extents(PartitionStyle::Gpt, &[(SRC, SIZE)]).unwrap();
    let disk = MemoryDisk::new(32 * 1024, layout.clone());
    disk.write_at(SRC, &[0xAB; SIZE as usize]);
    (disk, layout)
}

fn request(volume: Option<&str>) -> MoveRequest {
    MoveRequest {
        disk_number: 0,
        volume: volume.map(str::to_string),
        source_offset: SRC,
        destination_offset: DST,
        size: SIZE,
    }
}

fn run(disk: &MemoryDisk, req: &MoveRequest) -> Result<MoveOutcome> {
    Mover::new(disk.clone())
        .with_chunk_size(1024)
        .unwrap()
        .run(req, &mut |_p: MoveProgress| {}, &CancelToken::new())
}

fn assert_released(disk: &MemoryDisk) {
    assert!(!disk.is_locked("G:"));
    assert_eq!(disk.open_handles(), 0);
}

#[test]
fn lock_failure_is_access_error_and_still_attempts_unlock() {
    let (disk, layout) = setup();
    disk.fail(FaultPoint::Lock);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Access { .. }), "{err}");
    assert_eq!(disk.writes(), 0);
    assert_eq!(disk.unlock_calls(), 1);
    assert_eq!(disk.layout().as_bytes(), layout.as_bytes());
    assert_released(&disk);
}

#[test]
fn dismount_failure_unlocks_the_volume() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::Dismount);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Access { .. }));
    assert_eq!(disk.writes(), 0);
    assert_eq!(disk.unlock_calls(), 1);
    assert_released(&disk);
}

#[test]
fn volume_open_failure_touches_nothing() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::OpenVolume);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Access { .. }));
    assert_eq!(disk.unlock_calls(), 0);
    assert_eq!(disk.writes(), 0);
    assert_released(&disk);
}

#[test]
fn disk_open_failure_releases_volume() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::OpenDisk);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Access { .. }));
    assert!(disk.was_dismounted("G:"));
    assert_eq!(disk.unlock_calls(), 1);
    assert_released(&disk);
}

#[test]
fn unknown_disk_number_fails_before_copy() {
    let (disk, _) = setup();
    let mut req = request(None);
    req.disk_number = 7;
    assert!(run(&disk, &req).is_err());
    assert_eq!(disk.writes(), 0);
}

#[test]
fn read_failure_mid_copy_aborts_without_commit() {
    let (disk, layout) = setup();
    disk.fail_after(FaultPoint::Read, 2);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { .. }));
    assert_eq!(disk.writes(), 2);
    assert_eq!(disk.layout_commits(), 0);
    assert_eq!(disk.layout().as_bytes(), layout.as_bytes());
    assert_released(&disk);
}

#[test]
fn write_failure_aborts_without_commit() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::Write);
    let err = run(&disk, &request(None)).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { .. }));
    assert_eq!(err.code(), 11);
    assert_eq!(disk.layout_commits(), 0);
    assert_eq!(disk.open_handles(), 0);
}

#[test]
fn layout_read_failure_is_io_error() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::GetLayout);
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { .. }));
    assert_eq!(disk.layout_commits(), 0);
    assert_released(&disk);
}

#[test]
fn layout_write_failure_is_io_error() {
    let (disk, layout) = setup();
    disk.fail(FaultPoint::SetLayout);
    let err = run(&disk, &request(None)).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { .. }));
    assert_eq!(disk.layout().as_bytes(), layout.as_bytes());
}

#[test]
fn stale_snapshot_is_layout_mismatch() {
    let (disk, _) = setup();
    let changed = DriveLayout::from_extents(PartitionStyle::Gpt, &[(SRC + 512, SIZE)]).unwrap();
    disk.replace_layout(changed.clone());
    let err = run(&disk, &request(Some("G:"))).unwrap_err();
    assert!(matches!(err, PartMoveError::LayoutMismatch { offset: SRC }));
    assert!(disk.writes() > 0);
    assert_eq!(disk.layout_commits(), 0);
    assert_eq!(disk.layout().as_bytes(), changed.as_bytes());
    assert_released(&disk);
}

#[test]
fn unlock_failure_is_swallowed() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::Unlock);
    let outcome = run(&disk, &request(Some("G:"))).unwrap();
    assert_eq!(outcome, MoveOutcome::Done);
    assert_eq!(disk.unlock_calls(), 1);
    assert_eq!(disk.layout().read_start_offset(0).unwrap(), DST as i64);
    assert_eq!(disk.open_handles(), 0);
}

#[test]
fn failure_surfaces_through_spawned_worker() {
    let (disk, _) = setup();
    disk.fail(FaultPoint::Write);
    let handle = Mover::new(disk.clone())
        .spawn(request(None), |_p: MoveProgress| {}, CancelToken::new())
        .unwrap();
    assert!(matches!(handle.join(), Err(PartMoveError::Io { .. })));
}
