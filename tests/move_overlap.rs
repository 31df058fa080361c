use part_move::device::memory::MemoryDisk;
use part_move::{CancelToken, DriveLayout, MoveOutcome, MoveProgress, MoveRequest, Mover, PartitionStyle};

const DISK: usize = 64 * 1024;
const SIZE: u64 = 10_000;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ ((i / 251) as u8)).collect()
}

fn disk_with_partition(start: u64) -> MemoryDisk {
    let layout = DriveLayout::from_extents(PartitionStyle::Gpt, &[(512, 1024), (start, SIZE)]).unwrap();
    let disk = MemoryDisk::new(DISK, layout);
    disk.write_at(start, &pattern(SIZE as usize));
    disk
}

fn request(from: u64, to: u64, volume: Option<&str>) -> MoveRequest {
    MoveRequest {
        disk_number: 0,
        volume: volume.map(str::to_string),
        source_offset: from,
        destination_offset: to,
        size: SIZE,
    }
}

fn run(disk: &MemoryDisk, req: &MoveRequest) -> (MoveOutcome, Vec<MoveProgress>) {
    let mut seen = Vec::new();
    let outcome = Mover::new(disk.clone())
        .with_chunk_size(1024)
        .unwrap()
        .run(req, &mut |p: MoveProgress| seen.push(p), &CancelToken::new())
        .unwrap();
    (outcome, seen)
}

#[test]
fn overlapping_move_toward_lower_offsets() {
    let disk = disk_with_partition(16384);
    let (outcome, _) = run(&disk, &request(16384, 12288, None));
    assert_eq!(outcome, MoveOutcome::Done);
    assert_eq!(disk.bytes(12288..12288 + SIZE), pattern(SIZE as usize));
    let layout = disk.layout();
    assert_eq!(layout.read_start_offset(1).unwrap(), 12288);
    assert!(layout.is_dirty(1).unwrap());
    assert_eq!(layout.read_start_offset(0).unwrap(), 512);
    assert_eq!(disk.layout_commits(), 1);
}

#[test]
fn overlapping_move_toward_higher_offsets() {
    let disk = disk_with_partition(12288);
    let (outcome, _) = run(&disk, &request(12288, 16384, None));
    assert_eq!(outcome, MoveOutcome::Done);
    assert_eq!(disk.bytes(16384..16384 + SIZE), pattern(SIZE as usize));
    assert_eq!(disk.layout().read_start_offset(1).unwrap(), 16384);
}

#[test]
fn one_sector_shift_in_both_directions() {
    let disk = disk_with_partition(20480);
    run(&disk, &request(20480, 20992, None));
    assert_eq!(disk.bytes(20992..20992 + SIZE), pattern(SIZE as usize));
    run(&disk, &request(20992, 20480, None));
    assert_eq!(disk.bytes(20480..20480 + SIZE), pattern(SIZE as usize));
    assert_eq!(disk.layout().read_start_offset(1).unwrap(), 20480);
    assert_eq!(disk.layout_commits(), 2);
}

#[test]
fn progress_is_monotonic_and_ends_at_total() {
    let disk = disk_with_partition(16384);
    let (_, seen) = run(&disk, &request(16384, 40960, None));
    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[0].bytes_copied < w[1].bytes_copied));
    assert!(seen.iter().all(|p| p.total_bytes == SIZE && p.bytes_copied <= SIZE));
    assert_eq!(seen.last().unwrap().bytes_copied, SIZE);
    for p in &seen {
        assert!(
            p.bytes_per_second.is_finite() && p.bytes_per_second >= 0.0,
            "bad rate {}",
            p.bytes_per_second
        );
    }
}

#[test]
fn volume_is_dismounted_during_move_and_released_after() {
    let disk = disk_with_partition(16384);
    let probe = disk.clone();
    let mut locked_during_copy = Vec::new();
    let outcome = Mover::new(disk.clone())
        .with_chunk_size(4096)
        .unwrap()
        .run(
            &request(16384, 32768, Some("E:")),
            &mut |_p: MoveProgress| locked_during_copy.push(probe.is_locked("E:")),
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Done);
    assert!(locked_during_copy.iter().all(|&l| l));
    assert!(disk.was_dismounted("E:"));
    assert!(!disk.is_locked("E:"));
    assert_eq!(disk.unlock_calls(), 1);
    assert_eq!(disk.open_handles(), 0);
}

#[test]
fn equal_offsets_rewrite_in_place() {
    let disk = disk_with_partition(16384);
    let (outcome, _) = run(&disk, &request(16384, 16384, None));
    assert_eq!(outcome, MoveOutcome::Done);
    assert_eq!(disk.bytes(16384..16384 + SIZE), pattern(SIZE as usize));
    assert_eq!(disk.layout().read_start_offset(1).unwrap(), 16384);
}

#[test]
fn spawned_move_completes() {
    let disk = disk_with_partition(16384);
    let handle = Mover::new(disk.clone())
        .with_chunk_size(2048)
        .unwrap()
        .spawn(request(16384, 4096, None), |_p: MoveProgress| {}, CancelToken::new())
        .unwrap();
    assert_eq!(handle.join().unwrap(), MoveOutcome::Done);
    assert_eq!(disk.bytes(4096..4096 + SIZE), pattern(SIZE as usize));
    assert_eq!(disk.open_handles(), 0);
}
