//! Learning module pipeline
//!
//! Brings the offline copy of an HTML learning module up to date:
//!
//! ```text
//! FetchMetadata -> CheckFreshness -> DownloadArchive -> ExtractArchive
//!               -> InstallContent -> PersistRecord -> Cleanup
//! ```
//!
//! Stages run in order and the first failure aborts the run. Once the
//! download started, `Cleanup` runs on every exit path and removes the
//! per-object temporary directory.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::ObjectStore;
use crate::data::{LearningModule, LearningModuleRepository, RemoteObject};
use crate::error::AppError;
use crate::remote::{FileDownloader, LearningModuleApi, LearningModuleData, LinkBuilder};
use crate::storage::{ArchiveExtractor, FileStorage, OfflineStorage, StoragePaths};

const PROGRESS_METADATA: f64 = 0.2;
const PROGRESS_DOWNLOADED: f64 = 0.6;
const PROGRESS_EXTRACTED: f64 = 0.9;

/// Receives progress of one pipeline run
///
/// `finish` is called exactly once per run, whatever the outcome.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressReporter: Send + Sync {
    /// Fraction of work done, between 0 and 1
    fn set(&self, fraction: f64);

    fn finish(&self);
}

/// Reporter that drops every update
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set(&self, _fraction: f64) {}

    fn finish(&self) {}
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    FetchMetadata,
    CheckFreshness,
    DownloadArchive,
    ExtractArchive,
    InstallContent,
    PersistRecord,
    Cleanup,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::FetchMetadata => "fetch_metadata",
            PipelineStage::CheckFreshness => "check_freshness",
            PipelineStage::DownloadArchive => "download_archive",
            PipelineStage::ExtractArchive => "extract_archive",
            PipelineStage::InstallContent => "install_content",
            PipelineStage::PersistRecord => "persist_record",
            PipelineStage::Cleanup => "cleanup",
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Local copy was already current; nothing was downloaded
    UpToDate { start_file: String, timestamp: i64 },
    /// A new copy was downloaded and installed
    Installed { start_file: String, timestamp: i64 },
}

impl LoadOutcome {
    pub fn start_file(&self) -> &str {
        match self {
            LoadOutcome::UpToDate { start_file, .. } | LoadOutcome::Installed { start_file, .. } => {
                start_file
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LoadOutcome::UpToDate { .. } => "up_to_date",
            LoadOutcome::Installed { .. } => "installed",
        }
    }
}

/// I/O collaborators of the pipeline
pub struct PipelineCollaborators {
    pub api: Arc<dyn LearningModuleApi>,
    pub links: Arc<dyn LinkBuilder>,
    pub downloader: Arc<dyn FileDownloader>,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub files: Arc<dyn FileStorage>,
    pub offline: Arc<dyn OfflineStorage>,
}

/// Downloads and installs learning modules for offline use
pub struct LearningModuleLoader {
    objects: Arc<ObjectStore>,
    modules: Arc<dyn LearningModuleRepository>,
    paths: StoragePaths,
    io: PipelineCollaborators,
}

impl LearningModuleLoader {
    pub fn new(
        objects: Arc<ObjectStore>,
        modules: Arc<dyn LearningModuleRepository>,
        paths: StoragePaths,
        io: PipelineCollaborators,
    ) -> Self {
        Self {
            objects,
            modules,
            paths,
            io,
        }
    }

    /// Local path of the entry file of an installed module
    pub fn start_file_path(&self, user_id: i64, obj_id: i64, start_file: &str) -> PathBuf {
        self.paths
            .learning_module_dir(user_id, obj_id)
            .join(start_file)
    }

    /// Bring the module `obj_id` of `user_id` up to date
    ///
    /// # Returns
    /// `UpToDate` if the stored copy is at least as new as the remote
    /// content, `Installed` after a fresh download
    ///
    /// # Errors
    /// The error of the first failing stage, unchanged. The temporary
    /// directory is removed anyway and nothing is persisted.
    pub async fn load(
        &self,
        user_id: i64,
        obj_id: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<LoadOutcome, AppError> {
        use crate::metrics::LEARNING_MODULE_LOADS_TOTAL;

        let started = Instant::now();
        let result = self.run(user_id, obj_id, progress).await;
        progress.finish();

        match &result {
            Ok(outcome) => {
                LEARNING_MODULE_LOADS_TOTAL
                    .with_label_values(&[outcome.label()])
                    .inc();
                tracing::info!(
                    user_id,
                    obj_id,
                    outcome = outcome.label(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Learning module loaded"
                );
            }
            Err(e) => {
                LEARNING_MODULE_LOADS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                tracing::error!(user_id, obj_id, error = %e, "Learning module load failed");
            }
        }

        result.map_err(|e| e.record("load_learning_module"))
    }

    async fn run(
        &self,
        user_id: i64,
        obj_id: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<LoadOutcome, AppError> {
        let (object, metadata) = timed(
            PipelineStage::FetchMetadata,
            self.fetch_metadata(user_id, obj_id),
        )
        .await?;
        progress.set(PROGRESS_METADATA);

        let record = timed(
            PipelineStage::CheckFreshness,
            self.modules.find_by_obj_id_and_user_id(obj_id, user_id),
        )
        .await?;
        if record.id.is_some() && record.timestamp >= metadata.timestamp {
            tracing::debug!(
                obj_id,
                local = record.timestamp,
                remote = metadata.timestamp,
                "Learning module is up to date"
            );
            return Ok(LoadOutcome::UpToDate {
                start_file: record.relative_start_file,
                timestamp: record.timestamp,
            });
        }

        let tmp_dir = self.paths.learning_module_tmp_dir(user_id, obj_id);
        let installed = self
            .install(&object, &metadata, record, &tmp_dir, progress)
            .await;

        if let Err(e) = timed(PipelineStage::Cleanup, self.io.files.remove_dir_if_exists(&tmp_dir)).await
        {
            tracing::warn!(tmp_dir = %tmp_dir.display(), error = %e, "Could not remove temporary directory");
        }

        let record = installed?;
        Ok(LoadOutcome::Installed {
            start_file: record.relative_start_file,
            timestamp: record.timestamp,
        })
    }

    async fn fetch_metadata(
        &self,
        user_id: i64,
        obj_id: i64,
    ) -> Result<(Arc<RemoteObject>, LearningModuleData), AppError> {
        let object = self
            .objects
            .find_by_obj_id_and_user_id(obj_id, user_id)
            .await?;
        if !object.is_saved() {
            return Err(AppError::NotFound);
        }

        let metadata = self.io.api.learning_module_data(object.ref_id).await?;
        validate_dir_name(&metadata.zip_dir_name)?;
        Ok((object, metadata))
    }

    async fn install(
        &self,
        object: &RemoteObject,
        metadata: &LearningModuleData,
        mut record: LearningModule,
        tmp_dir: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<LearningModule, AppError> {
        let archive = tmp_dir.join(StoragePaths::archive_file_name(object.obj_id));

        let bytes = timed(PipelineStage::DownloadArchive, async {
            let url = self.io.links.resource_url(&metadata.zip_file)?;
            self.io.files.create_dir_all(tmp_dir).await?;
            self.io.downloader.download(&url, &archive).await
        })
        .await?;
        tracing::debug!(obj_id = object.obj_id, bytes, "Archive downloaded");
        progress.set(PROGRESS_DOWNLOADED);

        timed(
            PipelineStage::ExtractArchive,
            self.io.extractor.unzip(&archive, tmp_dir),
        )
        .await?;
        progress.set(PROGRESS_EXTRACTED);

        let target = self
            .paths
            .learning_module_dir(object.user_id, object.obj_id);
        timed(PipelineStage::InstallContent, async {
            self.io.offline.remove_object(object).await?;
            self.io
                .files
                .move_and_replace_dir(&tmp_dir.join(&metadata.zip_dir_name), &target)
                .await?;
            self.io.files.remove_file_if_exists(&archive).await?;
            Ok(())
        })
        .await?;

        record.relative_start_file = metadata.start_file.clone();
        record.timestamp = metadata.timestamp;
        timed(
            PipelineStage::PersistRecord,
            self.modules.save_learning_module(&record),
        )
        .await
    }
}

/// Run one stage, logging and exporting its duration
async fn timed<T, F>(stage: PipelineStage, future: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let started = Instant::now();
    let result = future.await;
    let elapsed = started.elapsed();

    let status = if result.is_ok() { "ok" } else { "error" };
    crate::metrics::observe_stage(stage.as_str(), status, elapsed);
    tracing::debug!(
        stage = stage.as_str(),
        status,
        elapsed_ms = elapsed.as_millis() as u64,
        "Pipeline stage finished"
    );

    result
}

/// The extracted directory must stay inside the temporary directory
fn validate_dir_name(name: &str) -> Result<(), AppError> {
    let path = Path::new(name);
    let plain = path.components().count() > 0
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
        return Err(AppError::Remote(format!(
            "invalid archive directory name: {name:?}"
        )));
    }
    Ok(())
}
