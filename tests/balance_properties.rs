// tests/balance_properties.rs

use proptest::prelude::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use borgsnap::archive::ArchiveInvoker;
use borgsnap::engine::{Orchestrator, Phase};
use borgsnap::exec::CommandEnv;
use borgsnap_test_utils::builders::BackupConfigBuilder;
use borgsnap_test_utils::fakes::{ArchiveBehaviour, FakeMounter, FakeRunner, FakeSnapshots};

/// What can go wrong for one source/mountpoint pair.
#[derive(Debug, Clone)]
struct PairPlan {
    live: bool,
    fail_create: bool,
    fail_latest: bool,
    fail_mount: bool,
    fail_destroy: bool,
}

fn pair_strategy() -> impl Strategy<Value = PairPlan> {
    (
        prop::bool::weighted(0.2),
        prop::bool::weighted(0.15),
        prop::bool::weighted(0.1),
        prop::bool::weighted(0.15),
        prop::bool::weighted(0.15),
    )
        .prop_map(|(live, fail_create, fail_latest, fail_mount, fail_destroy)| PairPlan {
            live,
            fail_create,
            fail_latest,
            fail_mount,
            fail_destroy,
        })
}

fn run_strategy() -> impl Strategy<Value = (Vec<PairPlan>, i32)> {
    (
        proptest::collection::vec(pair_strategy(), 1..=4),
        prop_oneof![3 => Just(0), 1 => Just(1), 1 => Just(2)],
    )
}

struct Observed {
    created: Vec<String>,
    destroyed: Vec<String>,
    mounted: Vec<String>,
    unmounted: Vec<String>,
    still_mounted: usize,
    final_phase: Phase,
}

fn execute(plan: &[PairPlan], archive_exit: i32) -> Observed {
    let dir = TempDir::new().unwrap();
    let mut builder = BackupConfigBuilder::new(dir.path());
    let mut snapshots = FakeSnapshots::new();
    let mut mounter = FakeMounter::new();

    for (i, pair) in plan.iter().enumerate() {
        let source = format!("/src/{i}");
        let mountpoint = if pair.live {
            source.clone()
        } else {
            format!("/mnt/{i}")
        };
        if pair.fail_create {
            snapshots = snapshots.failing_create(&source);
        }
        if pair.fail_latest {
            snapshots = snapshots.failing_latest(&source);
        }
        if pair.fail_destroy {
            snapshots = snapshots.failing_destroy(&source);
        }
        if pair.fail_mount {
            mounter = mounter.failing_mount(&mountpoint);
        }
        builder = builder.pair(&source, &mountpoint);
    }

    let cfg = builder.build();
    let runner = FakeRunner::new(ArchiveBehaviour::Exit(archive_exit));
    let archiver = ArchiveInvoker::new(runner, "borg", CommandEnv::default(), false);
    let mut orch = Orchestrator::new(cfg, snapshots.clone(), mounter.clone(), archiver)
        .with_hostname("prop");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _ = rt.block_on(orch.run(CancellationToken::new()));

    let mut created = snapshots.created();
    created.sort();
    let mut destroyed = snapshots.destroyed();
    destroyed.sort();

    Observed {
        created,
        destroyed,
        mounted: mounter.successful_mounts(),
        unmounted: mounter.unmount_attempts(),
        still_mounted: mounter.mounted().len(),
        final_phase: orch.phase(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_acquired_resource_is_released_once((plan, archive_exit) in run_strategy()) {
        let observed = execute(&plan, archive_exit);

        // Unmounts mirror successful mounts, in the same order.
        prop_assert_eq!(&observed.mounted, &observed.unmounted);
        prop_assert_eq!(observed.still_mounted, 0);

        // Each snapshot this run created is destroyed exactly once, and
        // nothing else is.
        prop_assert_eq!(&observed.created, &observed.destroyed);

        prop_assert!(matches!(observed.final_phase, Phase::Done | Phase::Aborted));
    }

    #[test]
    fn clean_runs_end_done((n, archive_ok) in (1usize..=4, any::<bool>())) {
        let plan: Vec<PairPlan> = (0..n)
            .map(|_| PairPlan {
                live: false,
                fail_create: false,
                fail_latest: false,
                fail_mount: false,
                fail_destroy: false,
            })
            .collect();
        let observed = execute(&plan, if archive_ok { 0 } else { 1 });

        prop_assert_eq!(observed.created.len(), n);
        prop_assert_eq!(observed.unmounted.len(), n);
        let expected = if archive_ok { Phase::Done } else { Phase::Aborted };
        prop_assert_eq!(observed.final_phase, expected);
    }
}
