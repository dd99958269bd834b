//! Incremental database upgrades from numbered SQL scripts.
//!
//! Scripts are named `upgrade.NN.sql` (two digit minimum, zero padded) and
//! live in one directory. Upgrading from version `k` to `n` applies scripts
//! `k + 1` up to `n` in increasing order, all inside one transaction.

use std::io;

use cap_std::fs::Dir;
use thiserror::Error;
use tracing::info;

use super::ports::{MigrationRunner, MigrationRunnerError};

const SCRIPT_PREFIX: &str = "upgrade.";
const SCRIPT_SUFFIX: &str = ".sql";

/// One upgrade script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Version the database is at after this script.
    pub version: u32,
    /// SQL text.
    pub sql: String,
}

impl MigrationScript {
    /// File name of the script upgrading to `version`.
    ///
    /// # Examples
    /// ```
    /// use wiking::domain::MigrationScript;
    ///
    /// assert_eq!(MigrationScript::file_name(7), "upgrade.07.sql");
    /// assert_eq!(MigrationScript::file_name(112), "upgrade.112.sql");
    /// ```
    #[must_use]
    pub fn file_name(version: u32) -> String {
        format!("{SCRIPT_PREFIX}{version:02}{SCRIPT_SUFFIX}")
    }

    /// Version encoded in `file_name`, if it names an upgrade script.
    #[must_use]
    pub fn parse_file_name(file_name: &str) -> Option<u32> {
        let digits = file_name
            .strip_prefix(SCRIPT_PREFIX)?
            .strip_suffix(SCRIPT_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Why an upgrade could not be planned or applied.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// The requested target is not above the current version.
    #[error("The target version must be higher than the source version ({source_version} >= {target_version}).")]
    TargetNotHigher {
        /// Current version.
        source_version: u32,
        /// Requested version.
        target_version: u32,
    },
    /// The directory holds no upgrade scripts at all.
    #[error("No upgrade scripts found.")]
    NoScripts,
    /// A script of the sequence is absent.
    #[error("Missing upgrade script {file_name}.")]
    MissingScript {
        /// Expected file name.
        file_name: String,
    },
    /// The script directory could not be read.
    #[error("Unable to read upgrade scripts: {0}")]
    Io(#[from] io::Error),
    /// Applying the scripts failed; nothing was committed.
    #[error(transparent)]
    Runner(#[from] MigrationRunnerError),
}

/// Ordered scripts taking the database from one version to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradePlan {
    source: u32,
    target: u32,
    scripts: Vec<MigrationScript>,
}

impl UpgradePlan {
    /// Plan the upgrade from `source` to `target` using the scripts in
    /// `dir`. Without a target the highest script present is used.
    ///
    /// # Errors
    /// [`UpgradeError::TargetNotHigher`] when there is nothing to do,
    /// [`UpgradeError::MissingScript`] when the sequence has a gap and
    /// [`UpgradeError::Io`] when the directory cannot be read.
    pub fn load(dir: &Dir, source: u32, target: Option<u32>) -> Result<Self, UpgradeError> {
        let target = match target {
            Some(target) => target,
            None => highest_version(dir)?.ok_or(UpgradeError::NoScripts)?,
        };
        if source >= target {
            return Err(UpgradeError::TargetNotHigher {
                source_version: source,
                target_version: target,
            });
        }
        let scripts = (source + 1..=target)
            .map(|version| {
                let file_name = MigrationScript::file_name(version);
                match dir.read_to_string(&file_name) {
                    Ok(sql) => Ok(MigrationScript { version, sql }),
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {
                        Err(UpgradeError::MissingScript { file_name })
                    }
                    Err(error) => Err(UpgradeError::Io(error)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            target,
            scripts,
        })
    }

    /// Version before the upgrade.
    #[must_use]
    pub fn source(&self) -> u32 {
        self.source
    }

    /// Version after the upgrade.
    #[must_use]
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Scripts in application order.
    #[must_use]
    pub fn scripts(&self) -> &[MigrationScript] {
        &self.scripts
    }

    /// Apply the plan through `runner`; returns the new version.
    ///
    /// # Errors
    /// [`UpgradeError::Runner`] when a script fails; the runner rolls back.
    pub async fn run(&self, runner: &dyn MigrationRunner) -> Result<u32, UpgradeError> {
        for script in &self.scripts {
            info!(
                script = %MigrationScript::file_name(script.version),
                "applying upgrade script"
            );
        }
        runner.apply(&self.scripts).await?;
        Ok(self.target)
    }
}

/// Highest script version found in `dir`.
///
/// # Errors
/// Propagates directory listing failures.
pub fn highest_version(dir: &Dir) -> io::Result<Option<u32>> {
    let mut highest = None;
    for entry in dir.entries()? {
        let name = entry?.file_name();
        if let Some(version) = name.to_str().and_then(MigrationScript::parse_file_name) {
            highest = highest.max(Some(version));
        }
    }
    Ok(highest)
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{MockMigrationRunner, RecordingMigrationRunner};
    use cap_std::ambient_authority;
    use rstest::rstest;
    use tempfile::TempDir;

    fn scripts_dir(versions: &[u32]) -> (TempDir, Dir) {
        let temp = tempfile::tempdir().expect("temp dir");
        for version in versions {
            std::fs::write(
                temp.path().join(MigrationScript::file_name(*version)),
                format!("-- upgrade {version}\n"),
            )
            .expect("write script");
        }
        let dir = Dir::open_ambient_dir(temp.path(), ambient_authority()).expect("open dir");
        (temp, dir)
    }

    #[rstest]
    #[case("upgrade.01.sql", Some(1))]
    #[case("upgrade.120.sql", Some(120))]
    #[case("upgrade.x.sql", None)]
    #[case("upgrade..sql", None)]
    #[case("downgrade.01.sql", None)]
    fn file_names_are_parsed(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(MigrationScript::parse_file_name(name), expected);
    }

    #[rstest]
    fn target_defaults_to_the_highest_script() {
        let (_temp, dir) = scripts_dir(&[1, 2, 3, 4]);
        let plan = UpgradePlan::load(&dir, 2, None).expect("plan");
        assert_eq!(plan.target(), 4);
        let versions: Vec<u32> = plan.scripts().iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![3, 4]);
    }

    #[rstest]
    #[case(3, Some(3))]
    #[case(4, Some(2))]
    fn source_must_be_below_target(#[case] source: u32, #[case] target: Option<u32>) {
        let (_temp, dir) = scripts_dir(&[1, 2, 3]);
        let err = UpgradePlan::load(&dir, source, target).expect_err("nothing to do");
        assert!(matches!(err, UpgradeError::TargetNotHigher { .. }));
    }

    #[rstest]
    fn gaps_in_the_sequence_are_reported() {
        let (_temp, dir) = scripts_dir(&[1, 3]);
        let err = UpgradePlan::load(&dir, 1, Some(3)).expect_err("gap");
        assert_eq!(err.to_string(), "Missing upgrade script upgrade.02.sql.");
    }

    #[tokio::test]
    async fn run_hands_all_scripts_to_the_runner_at_once() {
        let (_temp, dir) = scripts_dir(&[1, 2, 3]);
        let plan = UpgradePlan::load(&dir, 0, None).expect("plan");
        let mut runner = MockMigrationRunner::new();
        runner
            .expect_apply()
            .withf(|scripts| scripts.iter().map(|s| s.version).eq([1, 2, 3]))
            .times(1)
            .return_once(|_| Ok(()));
        assert_eq!(plan.run(&runner).await.expect("upgrade"), 3);
    }

    #[tokio::test]
    async fn failing_script_leaves_nothing_applied() {
        let (_temp, dir) = scripts_dir(&[1, 2]);
        let plan = UpgradePlan::load(&dir, 0, None).expect("plan");
        let runner = RecordingMigrationRunner::failing_on("upgrade 2");
        let err = plan.run(&runner).await.expect_err("second script fails");
        assert!(matches!(
            err,
            UpgradeError::Runner(MigrationRunnerError::Script { version: 2, .. })
        ));
        assert!(runner.applied().expect("log").is_empty());
    }
}
