use super::*;

#[test]
fn test_retire_with_nothing_in_flight_is_immediate() {
    let mut queue: RetireQueue<&str> = RetireQueue::new(2);

    assert_eq!(queue.retire("vertices"), Some("vertices"));
    assert!(queue.is_empty());
}

#[test]
fn test_retire_waits_for_in_flight_slot() {
    let mut queue = RetireQueue::new(2);
    queue.submitted(0);

    assert_eq!(queue.retire("vertices"), None);
    assert_eq!(queue.len(), 1);

    // Slot 1 never held the resource's frame
    assert!(queue.signaled(1).is_empty());
    assert_eq!(queue.signaled(0), vec!["vertices"]);
    assert!(queue.is_empty());
}

#[test]
fn test_retire_waits_for_every_earlier_submission() {
    let mut queue = RetireQueue::new(2);
    queue.submitted(0);
    queue.submitted(1);
    assert_eq!(queue.retire("indices"), None);

    assert!(queue.signaled(0).is_empty());
    assert_eq!(queue.signaled(1), vec!["indices"]);
}

#[test]
fn test_later_submissions_do_not_hold_older_retirements() {
    let mut queue = RetireQueue::new(2);
    queue.submitted(0);
    assert_eq!(queue.retire("old"), None);

    // Slot 1 is submitted after the free and cannot reference "old"
    queue.submitted(1);
    assert_eq!(queue.retire("new"), None);

    assert_eq!(queue.signaled(0), vec!["old"]);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.signaled(1), vec!["new"]);
}

#[test]
fn test_idle_releases_everything() {
    let mut queue = RetireQueue::new(3);
    queue.submitted(0);
    queue.submitted(1);
    queue.retire(1u32);
    queue.retire(2u32);
    assert_eq!(queue.pending().copied().sum::<u32>(), 3);

    assert_eq!(queue.idle(), vec![1, 2]);
    assert!(!queue.frames_in_flight());
    assert_eq!(queue.retire(3), Some(3));
}

#[test]
fn test_out_of_range_slot_is_ignored() {
    let mut queue: RetireQueue<u8> = RetireQueue::new(1);
    queue.submitted(4);
    assert!(!queue.frames_in_flight());
    assert!(queue.signaled(4).is_empty());
}
