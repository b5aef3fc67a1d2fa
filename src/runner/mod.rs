pub mod report;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::patch::{PatchDescriptor, WriteMode, apply_file};

pub use report::{FileReport, FileStatus, RunCounts, RunReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub fail_fast: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Runner {
    root: PathBuf,
    options: RunOptions,
}

impl Runner {
    pub fn new(root: impl Into<PathBuf>, options: RunOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    pub fn run(&self, descriptors: &[PatchDescriptor]) -> RunReport {
        self.run_with(descriptors, |_| {})
    }

    // on_file sees each file as soon as it settles.
    pub fn run_with(
        &self,
        descriptors: &[PatchDescriptor],
        mut on_file: impl FnMut(&FileReport),
    ) -> RunReport {
        let mode = if self.options.dry_run {
            WriteMode::DryRun
        } else {
            WriteMode::Write
        };
        let mut files = Vec::with_capacity(descriptors.len());
        let mut aborted = false;

        for (idx, descriptor) in descriptors.iter().enumerate() {
            let status = match apply_file(&self.root, descriptor, mode) {
                Ok(patch) => FileStatus::Done(patch),
                Err(err) => {
                    warn!(file = %descriptor.file_path().display(), code = err.code(), "{err}");
                    FileStatus::Failed(err)
                }
            };
            let report = FileReport {
                file: descriptor.file_path().to_path_buf(),
                label: descriptor.label().map(ToOwned::to_owned),
                status,
                dry_run: self.options.dry_run,
            };
            info!(file = %report.file.display(), status = report.status_name(), "descriptor processed");
            on_file(&report);

            let unsatisfied = report.is_unsatisfied() || report.error().is_some();
            files.push(report);
            if self.options.fail_fast && unsatisfied && idx + 1 < descriptors.len() {
                warn!(remaining = descriptors.len() - idx - 1, "fail-fast: stopping run");
                aborted = true;
                break;
            }
        }

        RunReport {
            root: self.root.clone(),
            files,
            fail_fast: self.options.fail_fast,
            dry_run: self.options.dry_run,
            aborted,
            total: descriptors.len(),
        }
    }
}
