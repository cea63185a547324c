use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::loader::BlockLoader;
use crate::report::LoadReport;
use crate::volume::Volume;

/// 一个 bob 时间步目录，作为体数据文件导入
pub struct BobVolumeFile {
    path: PathBuf,
}

impl BobVolumeFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 设置体数据的维度与体素类型，然后加载全部 block
    pub fn import_volume<V: Volume + ?Sized>(
        &self,
        volume: &mut V,
        config: LoaderConfig,
    ) -> Result<LoadReport> {
        let loader = BlockLoader::new(&self.path, config)?;

        volume.set_vec3i("dimensions", loader.config().grid.volume_dims());
        volume.set_string("voxelType", "uchar");

        let t0 = Instant::now();
        let report = loader.load(volume);
        info!(
            "done loading {}, needed {:.3} seconds",
            self.path.display(),
            t0.elapsed().as_secs_f64()
        );
        report
    }
}
