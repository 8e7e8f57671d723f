// Copyright 2024 Saorsa Labs
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recovery Supervisor: decides what to do with an operation that was interrupted
//! mid-flight, based solely on what the catalogue recorded before the crash.
//!
//! This module only defines the decision tree. Executing a decision — replaying an upload
//! or download, or tearing down a declined one's remote footprint — belongs to
//! [`crate::dispersion::DispersionEngine`], which is the only thing that holds remote
//! adapters.

use async_trait::async_trait;

use crate::catalogue::{Catalogue, OperationState};

/// External confirmation prompts. A CLI implementation asks the user; tests script fixed
/// answers.
#[async_trait]
pub trait Interaction: Send + Sync {
    async fn confirm_reupload(&self, file_name: &str) -> bool;
    async fn confirm_redownload(&self, file_name: &str) -> bool;
    /// Asked by a fresh (non-resume) upload when `file_name` is already catalogued.
    async fn confirm_overwrite(&self, file_name: &str) -> bool;
}

/// An [`Interaction`] that always answers the same way, useful for tests and headless runs.
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Interaction for FixedAnswer {
    async fn confirm_reupload(&self, _file_name: &str) -> bool {
        self.0
    }

    async fn confirm_redownload(&self, _file_name: &str) -> bool {
        self.0
    }

    async fn confirm_overwrite(&self, _file_name: &str) -> bool {
        self.0
    }
}

/// What the supervisor decided to do about an interrupted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// The caller should resume the named operation, skipping already-`check`ed shards.
    Resume { file_name: String, state: OperationState },
    /// The user declined to continue; the caller should tear down the partial operation.
    Abort { file_name: String, state: OperationState },
}

/// Inspects the catalogue for an interrupted operation and decides resume vs. abort.
///
/// `state=rm` always resumes — delete semantics are idempotent and the file is already
/// partially gone, so there is nothing sensible to ask the user.
pub struct RecoverySupervisor<'a> {
    catalogue: &'a Catalogue,
    interaction: &'a dyn Interaction,
}

impl<'a> RecoverySupervisor<'a> {
    pub fn new(catalogue: &'a Catalogue, interaction: &'a dyn Interaction) -> Self {
        Self {
            catalogue,
            interaction,
        }
    }

    /// Returns `None` if nothing was interrupted.
    pub async fn decide(&self) -> Option<RecoveryDecision> {
        let (file_name, state) = self.catalogue.in_progress()?;

        match state {
            OperationState::Idle => None,
            OperationState::Upload => {
                if self.interaction.confirm_reupload(&file_name).await {
                    Some(RecoveryDecision::Resume { file_name, state })
                } else {
                    Some(RecoveryDecision::Abort { file_name, state })
                }
            }
            OperationState::Download => {
                if self.interaction.confirm_redownload(&file_name).await {
                    Some(RecoveryDecision::Resume { file_name, state })
                } else {
                    Some(RecoveryDecision::Abort { file_name, state })
                }
            }
            OperationState::Rm => Some(RecoveryDecision::Resume { file_name, state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{FileRecord, ShardRecord};
    use tempfile::tempdir;

    fn make_record(state: OperationState, checks: &[bool]) -> FileRecord {
        FileRecord {
            file_name: "f".into(),
            file_size: 10,
            shard_size: 2,
            padding: 0,
            checksum: "abc".into(),
            k: checks.len(),
            parity: 0,
            flag: true,
            state,
            shards: checks
                .iter()
                .enumerate()
                .map(|(i, &check)| ShardRecord {
                    name: format!("f.{i}"),
                    index: i,
                    checksum: "x".into(),
                    remote: None,
                    check,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn clean_catalogue_decides_nothing() {
        let dir = tempdir().unwrap();
        let cat = Catalogue::open(dir.path().join("datamap.json"), false).unwrap();
        let interaction = FixedAnswer(true);
        let sup = RecoverySupervisor::new(&cat, &interaction);
        assert_eq!(sup.decide().await, None);
    }

    #[tokio::test]
    async fn upload_resumes_on_confirmation() {
        let dir = tempdir().unwrap();
        let cat = Catalogue::open(dir.path().join("datamap.json"), false).unwrap();
        cat.upsert(make_record(OperationState::Upload, &[true, false])).unwrap();
        let interaction = FixedAnswer(true);
        let sup = RecoverySupervisor::new(&cat, &interaction);
        assert_eq!(
            sup.decide().await,
            Some(RecoveryDecision::Resume {
                file_name: "f".into(),
                state: OperationState::Upload
            })
        );
    }

    #[tokio::test]
    async fn upload_aborts_on_decline() {
        let dir = tempdir().unwrap();
        let cat = Catalogue::open(dir.path().join("datamap.json"), false).unwrap();
        cat.upsert(make_record(OperationState::Upload, &[true, false])).unwrap();
        let interaction = FixedAnswer(false);
        let sup = RecoverySupervisor::new(&cat, &interaction);
        assert_eq!(
            sup.decide().await,
            Some(RecoveryDecision::Abort {
                file_name: "f".into(),
                state: OperationState::Upload
            })
        );
        // Deciding never mutates the catalogue; that's the caller's job once it acts.
        assert!(cat.exists("f"));
    }

    #[tokio::test]
    async fn download_aborts_on_decline() {
        let dir = tempdir().unwrap();
        let cat = Catalogue::open(dir.path().join("datamap.json"), false).unwrap();
        cat.upsert(make_record(OperationState::Download, &[true, false])).unwrap();
        let interaction = FixedAnswer(false);
        let sup = RecoverySupervisor::new(&cat, &interaction);
        assert_eq!(
            sup.decide().await,
            Some(RecoveryDecision::Abort {
                file_name: "f".into(),
                state: OperationState::Download
            })
        );
    }

    #[tokio::test]
    async fn removal_always_resumes() {
        let dir = tempdir().unwrap();
        let cat = Catalogue::open(dir.path().join("datamap.json"), false).unwrap();
        cat.upsert(make_record(OperationState::Rm, &[false])).unwrap();
        let interaction = FixedAnswer(false);
        let sup = RecoverySupervisor::new(&cat, &interaction);
        assert_eq!(
            sup.decide().await,
            Some(RecoveryDecision::Resume {
                file_name: "f".into(),
                state: OperationState::Rm
            })
        );
    }
}
