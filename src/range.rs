use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::Serialize;

use crate::volume::VolumeHandle;

/// 体素值范围 [min, max]，用于下游传输函数归一化
/// 初始为 (+inf, -inf)，任何一次真实观测都会收窄它
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoxelRange {
    pub min: f32,
    pub max: f32,
}

impl VoxelRange {
    pub const EMPTY: VoxelRange = VoxelRange {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// 扫描整段字节，得到局部范围；空切片返回 EMPTY
    pub fn from_bytes(voxels: &[u8]) -> Self {
        let Some((&first, rest)) = voxels.split_first() else {
            return Self::EMPTY;
        };
        let (lo, hi) = rest
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self::new(lo as f32, hi as f32)
    }

    pub fn extend(&mut self, value: f32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: VoxelRange) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl Default for VoxelRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// 体数据句柄 -> 体素范围 的映射表
/// 加载完成后由 loader 写入，宿主在加载结束后查询
pub struct VoxelRangeTable {
    ranges: RwLock<HashMap<VolumeHandle, VoxelRange>>,
}

impl VoxelRangeTable {
    pub fn new() -> Self {
        Self {
            ranges: RwLock::new(HashMap::new()),
        }
    }

    /// 进程级共享的映射表
    pub fn global() -> &'static VoxelRangeTable {
        static TABLE: OnceLock<VoxelRangeTable> = OnceLock::new();
        TABLE.get_or_init(VoxelRangeTable::new)
    }

    /// 写入（覆盖）某个体数据的范围
    pub fn publish(&self, handle: VolumeHandle, range: VoxelRange) {
        self.ranges.write().insert(handle, range);
    }

    pub fn get(&self, handle: VolumeHandle) -> Option<VoxelRange> {
        self.ranges.read().get(&handle).copied()
    }

    pub fn remove(&self, handle: VolumeHandle) -> Option<VoxelRange> {
        self.ranges.write().remove(&handle)
    }

    pub fn clear_all(&self) {
        self.ranges.write().clear();
    }

    pub fn len(&self) -> usize {
        self.ranges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.read().is_empty()
    }
}

impl Default for VoxelRangeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// 查询全局映射表中某个体数据的范围
pub fn voxel_range_of(handle: VolumeHandle) -> Option<VoxelRange> {
    VoxelRangeTable::global().get(handle)
}
