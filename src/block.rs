use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{LoadError, Result};
use crate::grid::BlockId;
use crate::range::VoxelRange;

/// 单个 block 的体素缓冲区
/// 每个 worker 分配一次，在它处理的所有 block 之间复用
pub struct Block {
    voxels: Vec<u8>,
}

impl Block {
    pub fn new(voxel_count: usize) -> Self {
        Self {
            voxels: vec![0; voxel_count],
        }
    }

    pub fn voxels(&self) -> &[u8] {
        &self.voxels
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// 当前内容的局部最小/最大值
    pub fn value_range(&self) -> VoxelRange {
        VoxelRange::from_bytes(&self.voxels)
    }

    /// 从文件读取恰好 len() 字节；gzip 为 true 时在进程内解压
    /// 多个 gzip member 拼接的文件按顺序全部解压
    pub fn load(&mut self, path: &Path, gzip: bool) -> Result<()> {
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if gzip {
            self.fill_from(MultiGzDecoder::new(BufReader::new(file)), path)
        } else {
            self.fill_from(file, path)
        }
    }

    fn fill_from<R: Read>(&mut self, mut reader: R, path: &Path) -> Result<()> {
        let expected = self.voxels.len();
        let mut filled = 0;
        while filled < expected {
            match reader.read(&mut self.voxels[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(LoadError::Read {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        if filled != expected {
            return Err(LoadError::ShortRead {
                path: path.to_path_buf(),
                expected,
                actual: filled,
            });
        }
        Ok(())
    }
}

/// block 文件路径: <dir>/d_<时间步:04>_<block:04>[.gz]
pub fn block_path(dir: &Path, timestep: u32, id: BlockId, gzip: bool) -> PathBuf {
    let mut name = format!("d_{:04}_{:04}", timestep, id.0);
    if gzip {
        name.push_str(".gz");
    }
    dir.join(name)
}
