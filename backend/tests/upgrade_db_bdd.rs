//! Behaviour tests for numbered database upgrades.

use std::cell::RefCell;

use cap_std::{ambient_authority, fs::Dir};
use futures::executor::block_on;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use wiking::domain::ports::RecordingMigrationRunner;
use wiking::domain::{MigrationScript, UpgradePlan};

const FAILURE_MARKER: &str = "-- fail";

struct UpgradeWorld {
    scripts: TempDir,
    runner: RefCell<RecordingMigrationRunner>,
    outcome: RefCell<Option<Result<u32, String>>>,
}

impl UpgradeWorld {
    fn upgrade(&self, source: u32, target: Option<u32>) {
        let dir = Dir::open_ambient_dir(self.scripts.path(), ambient_authority())
            .expect("open script directory");
        let runner = self.runner.borrow();
        let outcome = UpgradePlan::load(&dir, source, target)
            .and_then(|plan| block_on(plan.run(&*runner)))
            .map_err(|error| error.to_string());
        *self.outcome.borrow_mut() = Some(outcome);
    }

    fn applied(&self) -> Vec<u32> {
        self.runner.borrow().applied().expect("applied versions")
    }

    fn error(&self) -> String {
        let outcome = self.outcome.borrow();
        match outcome.as_ref().expect("upgrade attempted") {
            Ok(version) => panic!("upgrade unexpectedly reached version {version}"),
            Err(message) => message.clone(),
        }
    }
}

fn versions(list: &str) -> Vec<u32> {
    list.replace(" and ", ", ")
        .split(',')
        .map(|item| item.trim().parse().expect("numeric version"))
        .collect()
}

#[fixture]
fn world() -> UpgradeWorld {
    UpgradeWorld {
        scripts: tempfile::tempdir().expect("temp dir"),
        runner: RefCell::new(RecordingMigrationRunner::default()),
        outcome: RefCell::new(None),
    }
}

#[given("upgrade scripts for versions {list}")]
fn upgrade_scripts_for_versions(world: &UpgradeWorld, list: String) {
    for version in versions(&list) {
        std::fs::write(
            world.scripts.path().join(MigrationScript::file_name(version)),
            format!("ALTER TABLE users ADD COLUMN c{version} int;\n"),
        )
        .expect("write script");
    }
}

#[given("script {version:u32} fails")]
fn script_fails(world: &UpgradeWorld, version: u32) {
    std::fs::write(
        world.scripts.path().join(MigrationScript::file_name(version)),
        format!("{FAILURE_MARKER}\nSELECT broken;\n"),
    )
    .expect("write script");
    *world.runner.borrow_mut() = RecordingMigrationRunner::failing_on(FAILURE_MARKER);
}

#[when("the database is upgraded from version {source:u32}")]
fn upgraded_from(world: &UpgradeWorld, source: u32) {
    world.upgrade(source, None);
}

#[when("the database is upgraded from version {source:u32} to version {target:u32}")]
fn upgraded_from_to(world: &UpgradeWorld, source: u32, target: u32) {
    world.upgrade(source, Some(target));
}

#[then("versions {list} are applied")]
fn versions_are_applied(world: &UpgradeWorld, list: String) {
    assert_eq!(world.applied(), versions(&list));
}

#[then("the database reports version {version:u32}")]
fn the_database_reports_version(world: &UpgradeWorld, version: u32) {
    let outcome = world.outcome.borrow();
    assert_eq!(outcome.as_ref().expect("upgrade attempted"), &Ok(version));
}

#[then("the upgrade fails")]
fn the_upgrade_fails(world: &UpgradeWorld) {
    assert!(!world.error().is_empty());
}

#[then("the upgrade fails mentioning \"{text}\"")]
fn the_upgrade_fails_mentioning(world: &UpgradeWorld, text: String) {
    let error = world.error();
    assert!(error.contains(&text), "unexpected error: {error}");
}

#[then("no version is applied")]
fn no_version_is_applied(world: &UpgradeWorld) {
    assert!(world.applied().is_empty());
}

#[scenario(
    path = "tests/features/upgrade_db.feature",
    name = "Scripts up to the highest version are applied in order"
)]
fn scripts_up_to_the_highest_version_are_applied(world: UpgradeWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/upgrade_db.feature",
    name = "An explicit target stops early"
)]
fn an_explicit_target_stops_early(world: UpgradeWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/upgrade_db.feature",
    name = "A failing script leaves the database untouched"
)]
fn a_failing_script_leaves_the_database_untouched(world: UpgradeWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/upgrade_db.feature",
    name = "A gap in the sequence is refused"
)]
fn a_gap_in_the_sequence_is_refused(world: UpgradeWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/upgrade_db.feature",
    name = "The source must be below the target"
)]
fn the_source_must_be_below_the_target(world: UpgradeWorld) {
    drop(world);
}
