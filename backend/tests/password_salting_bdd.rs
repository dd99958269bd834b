//! Behaviour tests for salting legacy password records.

use std::cell::RefCell;

use futures::executor::block_on;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use wiking::domain::ports::InMemoryCredentialRepository;
use wiking::domain::{
    PasswordStorage, Pbkdf2PasswordStorage, RehashSummary, UniversalPasswordStorage, UserId,
    salt_passwords,
};

const CHEAP: Pbkdf2PasswordStorage = Pbkdf2PasswordStorage::with_iterations(10);

struct SaltingWorld {
    users: RefCell<Vec<(String, String)>>,
    repository: RefCell<Option<InMemoryCredentialRepository>>,
    summary: RefCell<Option<RehashSummary>>,
}

impl SaltingWorld {
    fn repository(&self) -> std::cell::RefMut<'_, Option<InMemoryCredentialRepository>> {
        let mut repository = self.repository.borrow_mut();
        if repository.is_none() {
            let passwords = self
                .users
                .borrow()
                .iter()
                .enumerate()
                .map(|(index, (_, stored))| {
                    let uid = i64::try_from(index).expect("small index") + 1;
                    (UserId::new(uid), stored.clone())
                })
                .collect();
            *repository = Some(InMemoryCredentialRepository::new(passwords));
        }
        repository
    }

    fn salt(&self) {
        let repository = self.repository();
        let repository = repository.as_ref().expect("repository");
        let summary = block_on(salt_passwords(repository, &CHEAP)).expect("salting succeeds");
        *self.summary.borrow_mut() = Some(summary);
    }

    fn stored_password(&self, login: &str) -> String {
        let index = self
            .users
            .borrow()
            .iter()
            .position(|(name, _)| name == login)
            .expect("known user");
        let repository = self.repository();
        let snapshot = repository
            .as_ref()
            .expect("repository")
            .snapshot()
            .expect("snapshot");
        snapshot[index].1.clone()
    }
}

#[fixture]
fn world() -> SaltingWorld {
    SaltingWorld {
        users: RefCell::new(Vec::new()),
        repository: RefCell::new(None),
        summary: RefCell::new(None),
    }
}

#[given("a user \"{login}\" stored as \"{stored}\"")]
fn a_user_stored_as(world: &SaltingWorld, login: String, stored: String) {
    world.users.borrow_mut().push((login, stored));
}

#[given("a user \"{login}\" with an already salted password \"{password}\"")]
fn a_user_with_a_salted_password(world: &SaltingWorld, login: String, password: String) {
    let stored = UniversalPasswordStorage::new(CHEAP).stored_password(&password);
    world.users.borrow_mut().push((login, stored));
}

#[when("the passwords are salted")]
fn the_passwords_are_salted(world: &SaltingWorld) {
    world.salt();
}

#[when("the passwords are salted again")]
fn the_passwords_are_salted_again(world: &SaltingWorld) {
    world.salt();
}

#[then("the summary reads \"{text}\"")]
fn the_summary_reads(world: &SaltingWorld, text: String) {
    let summary = world.summary.borrow();
    assert_eq!(summary.as_ref().expect("summary").to_string(), text);
}

#[then("every stored password is salted")]
fn every_stored_password_is_salted(world: &SaltingWorld) {
    let repository = world.repository();
    let snapshot = repository
        .as_ref()
        .expect("repository")
        .snapshot()
        .expect("snapshot");
    for (uid, stored) in snapshot {
        assert!(
            stored.starts_with("pbkdf2:") || stored.starts_with("pbkdf2/md5:"),
            "user {uid:?} still has {stored}"
        );
    }
}

#[then("\"{login}\" still logs in with \"{password}\"")]
fn still_logs_in_with(world: &SaltingWorld, login: String, password: String) {
    let stored = world.stored_password(&login);
    assert!(
        UniversalPasswordStorage::new(CHEAP).check_password(&password, &stored),
        "{login} cannot log in with {password}"
    );
}

#[scenario(
    path = "tests/features/password_salting.feature",
    name = "Plain and md5 records are salted"
)]
fn plain_and_md5_records_are_salted(world: SaltingWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/password_salting.feature",
    name = "Salting twice changes nothing"
)]
fn salting_twice_changes_nothing(world: SaltingWorld) {
    drop(world);
}
