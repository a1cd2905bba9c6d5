//! Property tests for the run group.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dual_listener::lifecycle::Group;
use proptest::prelude::*;
use tokio::sync::oneshot;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Actor that fails with `name` after `delay_ms`, or returns cleanly when
/// interrupted first.
fn add_timed(group: &mut Group<String>, name: String, delay_ms: u64, interrupts: Arc<AtomicUsize>) {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    group.add_named(
        name.clone(),
        move || async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => Err(name),
                _ = stop_rx => Ok(()),
            }
        },
        move |_| {
            interrupts.fetch_add(1, Ordering::SeqCst);
            drop(stop_tx);
        },
    );
}

proptest! {
    #[test]
    fn fastest_actor_decides_regardless_of_registration_order(
        delays in proptest::collection::hash_set(1u64..1_000, 3),
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
    ) {
        let delays: Vec<u64> = delays.into_iter().collect();
        let fastest = (0..3).min_by_key(|&i| delays[i]).unwrap();
        let interrupts = Arc::new(AtomicUsize::new(0));

        let result = paused_runtime().block_on(async {
            let mut group = Group::new();
            for &i in &order {
                add_timed(&mut group, format!("actor-{i}"), delays[i], interrupts.clone());
            }
            group.run().await
        });

        prop_assert_eq!(result, Err(format!("actor-{fastest}")));
        prop_assert_eq!(interrupts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn every_actor_is_interrupted_exactly_once(blocked in 0usize..10) {
        let interrupts = Arc::new(AtomicUsize::new(0));

        let result = paused_runtime().block_on(async {
            let mut group = Group::new();
            for i in 0..blocked {
                // Far beyond the finisher, so they only stop when interrupted.
                add_timed(&mut group, format!("blocked-{i}"), 3_600_000, interrupts.clone());
            }
            add_timed(&mut group, "finisher".to_string(), 1, interrupts.clone());
            group.run().await
        });

        prop_assert_eq!(result, Err("finisher".to_string()));
        prop_assert_eq!(interrupts.load(Ordering::SeqCst), blocked + 1);
    }
}

#[test]
fn same_actors_in_every_order_agree() {
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let delays = [30, 10, 20];

    for order in orders {
        let interrupts = Arc::new(AtomicUsize::new(0));
        let result = paused_runtime().block_on(async {
            let mut group = Group::new();
            for i in order {
                add_timed(&mut group, format!("actor-{i}"), delays[i], interrupts.clone());
            }
            group.run().await
        });
        assert_eq!(result, Err("actor-1".to_string()), "order {order:?}");
    }
}
