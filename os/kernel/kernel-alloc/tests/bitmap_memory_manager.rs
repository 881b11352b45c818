use kernel_alloc::{AllocError, BitmapMemoryManager, FrameId, MapLine};

fn restricted(lines: usize, begin: usize, end: usize) -> BitmapMemoryManager<Vec<MapLine>> {
    let mut m = BitmapMemoryManager::new(vec![0; lines]);
    m.set_memory_range(FrameId::new(begin), FrameId::new(end))
        .expect("range within capacity");
    m
}

#[test]
fn first_allocation_starts_at_range_begin() {
    for num_frames in 1..=90 {
        let mut m = restricted(4, 37, 127);
        assert_eq!(m.allocate(num_frames), Ok(FrameId::new(37)), "{num_frames} frames");
    }
}

#[test]
fn allocate_free_allocate_reuses_the_same_run() {
    let mut m = restricted(4, 5, 200);
    let _head = m.allocate(3).expect("space");
    let run = m.allocate(17).expect("space");
    let _tail = m.allocate(2).expect("space");

    m.free(run, 17);
    assert_eq!(m.allocate(17), Ok(run));
}

#[test]
fn marked_frames_are_never_handed_out() {
    let mut m = restricted(2, 0, 128);
    m.mark_allocated(FrameId::new(10), 20);

    let mut handed_out = Vec::new();
    while let Ok(frame) = m.allocate(1) {
        handed_out.push(frame.id());
    }
    assert_eq!(handed_out.len(), 108);
    assert!(handed_out.iter().all(|f| !(10..30).contains(f)));

    m.free(FrameId::new(10), 20);
    assert_eq!(m.allocate(20), Ok(FrameId::new(10)));
}

#[test]
fn oversized_request_fails_without_touching_the_bitmap() {
    let mut m = restricted(2, 8, 72);
    m.mark_allocated(FrameId::new(30), 1);
    m.mark_allocated(FrameId::new(50), 1);

    let before: Vec<bool> = (0..128).map(|f| m.is_allocated(FrameId::new(f))).collect();
    let free_before = m.free_frame_count();

    assert_eq!(
        m.allocate(23),
        Err(AllocError::NoEnoughMemory { requested: 23 })
    );
    assert_eq!(
        m.allocate(65),
        Err(AllocError::NoEnoughMemory { requested: 65 })
    );

    let after: Vec<bool> = (0..128).map(|f| m.is_allocated(FrameId::new(f))).collect();
    assert_eq!(before, after);
    assert_eq!(m.free_frame_count(), free_before);

    assert_eq!(m.allocate(22), Ok(FrameId::new(8)));
    assert_eq!(m.allocate(19), Ok(FrameId::new(31)));
}

#[test]
fn allocations_stay_inside_the_range() {
    let mut m = restricted(2, 64, 96);
    let mut frames = Vec::new();
    while let Ok(frame) = m.allocate(3) {
        frames.push(frame.id());
    }
    assert_eq!(frames, (0..10).map(|i| 64 + 3 * i).collect::<Vec<_>>());
    assert_eq!(m.free_frame_count(), 2);
    assert!(!m.is_allocated(FrameId::new(63)));
    assert!(!m.is_allocated(FrameId::new(96)));
}

#[test]
fn static_sized_storage_works() {
    let mut storage = [MapLine::MAX; 16];
    let mut m = BitmapMemoryManager::new(&mut storage);
    assert_eq!(m.capacity(), 1024);
    assert_eq!(m.allocate(1000), Ok(FrameId::new(0)));
    assert_eq!(m.free_frame_count(), 24);
}
