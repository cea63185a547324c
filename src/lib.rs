//! bob 时间序列体数据加载器
//!
//! 读取一个时间步的 8×8×15 个原始 u8 block（可选 gzip 压缩），
//! 多线程并行读取，并通过宿主提供的 region 上传接口串行写入目标体数据。

pub mod block;
pub mod config;
pub mod error;
pub mod grid;
pub mod import;
pub mod loader;
pub mod range;
pub mod report;
pub mod timestep;
pub mod volume;

pub use config::{LoaderConfig, NO_GZIP_ENV};
pub use error::{LoadError, Result};
pub use grid::{BlockGrid, BlockId};
pub use import::BobVolumeFile;
pub use loader::{BlockLoader, load_timestep};
pub use range::{VoxelRange, VoxelRangeTable, voxel_range_of};
pub use report::{BlockFailure, BlockRecord, LoadReport};
pub use volume::{DenseVolume, Volume, VolumeHandle};
