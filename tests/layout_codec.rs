use part_move::layout::{
    ENTRY_SIZE, ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA, FetchAttempt, HEADER_SIZE, MAX_ENTRIES,
    next_capacity, required_len,
};
use part_move::{DriveLayout, PartMoveError, PartitionStyle};

fn sample() -> DriveLayout {
    DriveLayout::from_extents(
        PartitionStyle::Gpt,
        &[(1 << 20, 100 << 20), (200 << 20, 50 << 20), (512 << 20, 1 << 30)],
    )
    .unwrap()
}

#[test]
fn header_fields_decode() {
    let layout = sample();
    assert_eq!(layout.len(), required_len(3));
    assert_eq!(layout.partition_style().unwrap(), PartitionStyle::Gpt);
    assert_eq!(layout.entry_count().unwrap(), 3);
    assert_eq!(layout.read_start_offset(1).unwrap(), 200 << 20);
    assert_eq!(layout.read_length(2).unwrap(), 1 << 30);
    assert_eq!(layout.read_partition_number(2).unwrap(), 3);
}

#[test]
fn fields_sit_at_abi_offsets() {
    let layout = sample();
    let b = layout.as_bytes();
    let entry1 = HEADER_SIZE + ENTRY_SIZE;
    assert_eq!(&b[0..4], &1u32.to_le_bytes());
    assert_eq!(&b[4..8], &3u32.to_le_bytes());
    assert_eq!(&b[entry1 + 8..entry1 + 16], &(200i64 << 20).to_le_bytes());
    assert_eq!(&b[entry1 + 16..entry1 + 24], &(50i64 << 20).to_le_bytes());
    assert_eq!(&b[entry1 + 24..entry1 + 28], &2u32.to_le_bytes());
}

#[test]
fn write_then_read_returns_written_value() {
    let mut layout = sample();
    layout.write_start_offset(2, 7 << 30).unwrap();
    assert_eq!(layout.read_start_offset(2).unwrap(), 7 << 30);
    layout.write_start_offset(0, -1).unwrap();
    assert_eq!(layout.read_start_offset(0).unwrap(), -1);
}

#[test]
fn mark_dirty_sets_exactly_one() {
    let mut layout = sample();
    layout.mark_dirty(1).unwrap();
    let flag = HEADER_SIZE + ENTRY_SIZE + 28;
    assert_eq!(layout.as_bytes()[flag], 1);
    assert!(layout.is_dirty(1).unwrap());
    assert!(!layout.is_dirty(0).unwrap());
}

#[test]
fn reads_leave_buffer_untouched() {
    let layout = sample();
    let before = layout.as_bytes().to_vec();
    for i in 0..layout.entry_count().unwrap() {
        layout.read_start_offset(i).unwrap();
        layout.read_length(i).unwrap();
        layout.is_dirty(i).unwrap();
    }
    assert_eq!(layout.find_by_start_offset(512 << 20).unwrap(), Some(2));
    assert_eq!(layout.as_bytes(), &before[..]);
}

#[test]
fn patching_one_entry_keeps_others_identical() {
    let mut layout = sample();
    let before = layout.as_bytes().to_vec();
    layout.write_start_offset(1, 300 << 20).unwrap();
    layout.mark_dirty(1).unwrap();
    let after = layout.as_bytes();
    let (lo, hi) = (HEADER_SIZE + ENTRY_SIZE, HEADER_SIZE + 2 * ENTRY_SIZE);
    assert_eq!(after[..lo], before[..lo]);
    assert_eq!(after[hi..], before[hi..]);
}

#[test]
fn out_of_range_index_is_buffer_too_small() {
    let mut layout = sample();
    let err = layout.read_start_offset(3).unwrap_err();
    assert!(matches!(err, PartMoveError::BufferTooSmall { index: 3, .. }));
    assert!(layout.write_start_offset(10, 0).is_err());
    assert!(layout.mark_dirty(3).is_err());
}

#[test]
fn truncated_header_is_buffer_too_small() {
    let layout = DriveLayout::from_bytes(vec![0u8; 6]);
    assert!(matches!(
        layout.entry_count(),
        Err(PartMoveError::BufferTooSmall { .. })
    ));
    assert!(DriveLayout::from_bytes(Vec::new()).partition_style().is_err());
}

#[test]
fn find_ignores_offsets_beyond_signed_range() {
    let layout = sample();
    assert_eq!(layout.find_by_start_offset(u64::MAX).unwrap(), None);
    assert_eq!(layout.find_by_start_offset(3).unwrap(), None);
}

#[test]
fn extents_beyond_i64_are_rejected() {
    let err = DriveLayout::from_extents(PartitionStyle::Gpt, &[(u64::MAX, 512)]).unwrap_err();
    assert!(matches!(err, PartMoveError::InvalidRequest(_)));
    let err = DriveLayout::from_extents(PartitionStyle::Gpt, &[(0, 1 << 63)]).unwrap_err();
    assert!(matches!(err, PartMoveError::InvalidRequest(_)));
}

#[test]
fn too_many_extents_are_rejected() {
    let extents = vec![(0u64, 512u64); MAX_ENTRIES + 1];
    assert!(DriveLayout::from_extents(PartitionStyle::Gpt, &extents).is_err());
}

fn failed(code: i32) -> FetchAttempt {
    FetchAttempt::Failed { os_code: Some(code) }
}

#[test]
fn layout_fetch_stops_when_everything_fits() {
    assert_eq!(next_capacity(128, FetchAttempt::Fetched { count: 4 }).unwrap(), None);
    assert_eq!(next_capacity(128, FetchAttempt::Fetched { count: 128 }).unwrap(), None);
}

#[test]
fn layout_fetch_doubles_on_small_buffer() {
    assert_eq!(next_capacity(128, failed(ERROR_INSUFFICIENT_BUFFER)).unwrap(), Some(256));
    assert_eq!(next_capacity(256, failed(ERROR_MORE_DATA)).unwrap(), Some(512));
    assert_eq!(next_capacity(3000, failed(ERROR_MORE_DATA)).unwrap(), Some(MAX_ENTRIES));
}

#[test]
fn layout_fetch_grows_to_reported_count() {
    assert_eq!(next_capacity(128, FetchAttempt::Fetched { count: 300 }).unwrap(), Some(300));
    assert_eq!(
        next_capacity(128, FetchAttempt::Fetched { count: MAX_ENTRIES }).unwrap(),
        Some(MAX_ENTRIES)
    );
}

#[test]
fn layout_fetch_gives_up_past_the_cap() {
    let err = next_capacity(MAX_ENTRIES, failed(ERROR_INSUFFICIENT_BUFFER)).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { code: Some(122), .. }));
    let err = next_capacity(128, FetchAttempt::Fetched { count: MAX_ENTRIES + 1 }).unwrap_err();
    assert!(matches!(err, PartMoveError::Io { .. }));
}

#[test]
fn layout_fetch_other_errors_are_not_retried() {
    let err = next_capacity(128, failed(5)).unwrap_err();
    assert_eq!(err.os_code(), Some(5));
    assert!(next_capacity(128, FetchAttempt::Failed { os_code: None }).is_err());
}
