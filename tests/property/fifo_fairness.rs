//! Property-based matchmaking tests.
//!
//! Uses proptest to verify:
//! 1. Sequential requests pair the k-th and (k+1)-th arrivals for odd k,
//!    leaving at most the last arrival waiting.
//! 2. Concurrent bursts never put one session in two rooms.
//! 3. Cleanup is idempotent for any mix of queued and unknown sessions.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use pairchat_proto::room::{RoomId, SessionId};
use pairchat_relay::groups::GroupRegistry;
use pairchat_relay::matchmaker::{Matchmaker, PairingOutcome};
use pairchat_relay::relay::Relay;
use pairchat_relay::store::{MemoryStore, SharedStore};

const QUEUE: &str = "waiting_users";

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("runtime should build")
}

fn matchmaker(store: &Arc<MemoryStore>) -> Arc<Matchmaker<MemoryStore>> {
    let groups = Arc::new(GroupRegistry::new());
    let relay = Relay::new(Arc::clone(store), Arc::clone(&groups), "chat_channel");
    Arc::new(Matchmaker::new(Arc::clone(store), groups, relay, QUEUE))
}

fn sessions(n: usize) -> Vec<SessionId> {
    (0..n).map(|i| SessionId::new(format!("session-{i:04}"))).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sequential_requests_pair_in_arrival_order(n in 0usize..40) {
        let rt = runtime();
        let store = Arc::new(MemoryStore::new());
        let matchmaker = matchmaker(&store);
        let ids = sessions(n);

        let outcomes: Vec<PairingOutcome> = rt.block_on(async {
            let mut outcomes = Vec::new();
            for id in &ids {
                outcomes.push(matchmaker.request_pairing(id).await.expect("store is up"));
            }
            outcomes
        });

        for (k, outcome) in outcomes.iter().enumerate() {
            if k % 2 == 0 {
                prop_assert_eq!(outcome, &PairingOutcome::Waiting);
            } else {
                prop_assert_eq!(
                    outcome,
                    &PairingOutcome::Paired {
                        room: RoomId::for_pair(&ids[k], &ids[k - 1]),
                        peer: ids[k - 1].clone(),
                    }
                );
            }
        }

        let queued = rt.block_on(store.snapshot(QUEUE));
        if n % 2 == 1 {
            prop_assert_eq!(queued, vec![ids[n - 1].to_string()]);
        } else {
            prop_assert!(queued.is_empty());
        }
    }

    #[test]
    fn concurrent_burst_never_double_matches(m in 1usize..60) {
        let rt = runtime();
        let store = Arc::new(MemoryStore::new());
        let matchmaker = matchmaker(&store);
        let ids = sessions(m);

        let outcomes = rt.block_on(async {
            let mut handles = Vec::new();
            for id in ids.clone() {
                let matchmaker = Arc::clone(&matchmaker);
                handles.push(tokio::spawn(async move {
                    let outcome = matchmaker.request_pairing(&id).await.expect("store is up");
                    (id, outcome)
                }));
            }
            let mut outcomes = Vec::new();
            for handle in handles {
                outcomes.push(handle.await.expect("task should not panic"));
            }
            outcomes
        });

        let mut matched = HashSet::new();
        for (id, outcome) in &outcomes {
            if let PairingOutcome::Paired { peer, .. } = outcome {
                prop_assert!(matched.insert(id.clone()), "{} matched twice", id);
                prop_assert!(matched.insert(peer.clone()), "{} matched twice", peer);
            }
        }

        let queued = rt.block_on(store.snapshot(QUEUE));
        prop_assert!(queued.len() <= 1, "more than one session left waiting: {:?}", queued);
        for id in &queued {
            prop_assert!(!matched.contains(&SessionId::new(id.clone())));
        }
        prop_assert_eq!(matched.len() + queued.len(), m);
    }

    #[test]
    fn cleanup_is_idempotent(queued in 0usize..10, extra_calls in 1usize..4) {
        let rt = runtime();
        let store = Arc::new(MemoryStore::new());
        let matchmaker = matchmaker(&store);
        let ids = sessions(queued);

        rt.block_on(async {
            for id in &ids {
                store.push_back(QUEUE, id.as_str()).await.expect("store is up");
            }
            for _ in 0..extra_calls {
                for id in &ids {
                    matchmaker.cleanup(id).await.expect("store is up");
                }
                matchmaker.cleanup(&SessionId::new("never-queued")).await.expect("store is up");
            }
        });

        prop_assert_eq!(rt.block_on(store.len(QUEUE)), 0);
    }
}

