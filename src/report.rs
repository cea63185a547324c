use serde::Serialize;

use crate::grid::BlockId;
use crate::range::VoxelRange;

/// 单个 block 的加载记录
#[derive(Debug, Clone, Serialize)]
pub struct BlockRecord {
    pub block: BlockId,
    /// 网格坐标 (I, J, K)
    pub coords: [usize; 3],
    pub origin: [i32; 3],
    /// 处理该 block 的 worker 序号
    pub worker: usize,
    /// worker 领取到的绑定序号
    pub pin_slot: usize,
    /// worker 绑定的核心，未绑定时为 None
    pub core: Option<usize>,
    /// 读取（含解压）耗时，毫秒
    pub load_ms: f64,
    /// 等锁 + 上传耗时，毫秒
    pub upload_ms: f64,
    pub range: VoxelRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockFailure {
    pub block: BlockId,
    pub worker: usize,
    pub error: String,
}

/// 一次加载的汇总
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub timestep: u32,
    pub threads: usize,
    pub elapsed_ms: f64,
    pub voxel_range: VoxelRange,
    /// 按 block 处理完成的顺序排列
    pub blocks: Vec<BlockRecord>,
    pub failures: Vec<BlockFailure>,
    /// 所有 worker 退出后仍未被领取的 block
    pub unclaimed: Vec<BlockId>,
}

impl LoadReport {
    pub fn uploaded_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.blocks.iter().map(|record| record.block).collect();
        ids.sort();
        ids
    }

    pub fn failed_ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.failures.iter().map(|failure| failure.block).collect();
        ids.sort();
        ids
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.unclaimed.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "时间步 {}: 上传 {} 个 block, 失败 {} 个, 未处理 {} 个",
            self.timestep,
            self.blocks.len(),
            self.failures.len(),
            self.unclaimed.len()
        )
    }
}
