//! Queue invariants under concurrent claims.

use proptest::prelude::*;
use std::sync::Arc;

use timetable_pipeline::db::repository::QueueRepository;
use timetable_pipeline::db::LocalRepository;
use timetable_pipeline::models::{
    ClaimOutcome, DraftId, NewQueueEntry, QueueStatus, SchoolId, TimetableId, UserId,
};

fn new_entry(n: usize) -> NewQueueEntry {
    NewQueueEntry {
        school_id: SchoolId::new(1),
        timetable_id: TimetableId::new(1 + (n % 3) as i64),
        draft_id: DraftId::new(1),
        submitted_by: UserId::new("admin"),
        input_artifact: format!("1/1/input/t{}.fet", n),
        input_checksum: "00".to_string(),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However many workers race, at most one entry is ever in progress, and entries
    /// are handed out oldest first.
    #[test]
    fn at_most_one_entry_in_progress(entries in 1usize..8, claimers in 2usize..8, rounds in 1usize..6) {
        let rt = runtime();
        let result: Result<(), TestCaseError> = rt.block_on(async {
            let repo = Arc::new(LocalRepository::new());
            let mut ids = Vec::new();
            for n in 0..entries {
                ids.push(repo.enqueue(new_entry(n)).await.unwrap().id);
            }

            let mut claimed_order = Vec::new();
            for _ in 0..rounds {
                let handles: Vec<_> = (0..claimers)
                    .map(|_| {
                        let repo = repo.clone();
                        tokio::spawn(async move { repo.claim_next().await.unwrap() })
                    })
                    .collect();

                let mut claimed = Vec::new();
                for handle in handles {
                    if let ClaimOutcome::Claimed(entry) = handle.await.unwrap() {
                        claimed.push(entry.id);
                    }
                }
                prop_assert!(claimed.len() <= 1);
                prop_assert!(repo.in_progress_count() <= 1);

                if let Some(running) = repo.in_progress().await.unwrap() {
                    repo.complete(running.id).await.unwrap();
                }
                claimed_order.extend(claimed);
            }

            prop_assert_eq!(&claimed_order[..], &ids[..claimed_order.len()]);
            Ok(())
        });
        result?;
    }
}

#[tokio::test]
async fn test_terminal_entries_cannot_transition_again() {
    let repo = LocalRepository::new();
    let entry = repo.enqueue(new_entry(0)).await.unwrap();

    // Not claimed yet.
    assert!(repo.complete(entry.id).await.is_err());

    repo.claim_next().await.unwrap();
    let failed = repo.fail(entry.id, "exit 2".to_string()).await.unwrap();
    assert_eq!(failed.status, QueueStatus::Failed);
    assert_eq!(failed.diagnostics.as_deref(), Some("exit 2"));

    assert!(repo.complete(entry.id).await.is_err());
    assert!(repo.fail(entry.id, "again".to_string()).await.is_err());
    assert_eq!(repo.claim_next().await.unwrap(), ClaimOutcome::Empty);
}

#[tokio::test]
async fn test_queue_listing_is_per_timetable_and_ordered() {
    let repo = LocalRepository::new();
    for n in 0..6 {
        repo.enqueue(new_entry(n)).await.unwrap();
    }
    let listed = repo.list_queue_entries(TimetableId::new(1)).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].submitted_at <= listed[1].submitted_at);
    assert!(listed[0].id < listed[1].id);
}
