//! Dataset file handling shared by the commands.

use crate::config::PgmConfig;
use anyhow::{Context, Result};
use pgm_core::{DatasetMeta, DatasetType, PowerGridMetaData};
use pgm_dataset::{
    dataset_to_native, load_native_dataset, native_to_dataset, save_native_dataset, Dataset,
    ExtraInfo,
};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Configuration and registry every command works against.
pub struct Session {
    pub config: PgmConfig,
    pub meta: PowerGridMetaData,
}

impl Session {
    pub fn new(config: PgmConfig, meta_override: Option<&Path>) -> Result<Self> {
        let meta = config
            .meta_data(meta_override)
            .context("loading meta data registry")?;
        Ok(Self { config, meta })
    }

    pub fn dataset_meta(&self, dataset_type: DatasetType) -> Result<&DatasetMeta> {
        Ok(self.meta.dataset(dataset_type)?)
    }

    /// Read a native JSON dataset into record arrays.
    pub fn load(&self, path: &Path, dataset_type: DatasetType) -> Result<(Dataset, ExtraInfo)> {
        let native = load_native_dataset(path)
            .with_context(|| format!("reading dataset '{}'", path.display()))?;
        let (dataset, extra) = native_to_dataset(
            &native,
            self.dataset_meta(dataset_type)?,
            self.config.native.extra,
        )
        .with_context(|| format!("converting '{}' as {dataset_type}", path.display()))?;
        debug!(
            path = %path.display(),
            components = dataset.len(),
            extra_records = extra.len(),
            "loaded dataset"
        );
        Ok((dataset, extra))
    }

    /// Write a dataset back out as native JSON.
    pub fn save(
        &self,
        path: &Path,
        dataset: &Dataset,
        dataset_type: DatasetType,
        extra: &ExtraInfo,
    ) -> Result<()> {
        let native = dataset_to_native(dataset, self.dataset_meta(dataset_type)?, Some(extra))?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating '{}'", parent.display()))?;
        }
        save_native_dataset(path, &native)
            .with_context(|| format!("writing dataset '{}'", path.display()))?;
        info!(path = %path.display(), "wrote dataset");
        Ok(())
    }
}
