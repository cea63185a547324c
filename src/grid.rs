use serde::Serialize;

/// 单个 block 的体素维度 [x, y, z]
pub const BLOCK_DIMS: [usize; 3] = [256, 256, 128];

/// block 网格维度 [I, J, K]
pub const GRID_DIMS: [usize; 3] = [8, 8, 15];

/// 单个 block 的字节数（u8 体素）
pub const BLOCK_VOXELS: usize = BLOCK_DIMS[0] * BLOCK_DIMS[1] * BLOCK_DIMS[2];

/// 一个时间步中的 block 总数
pub const NUM_BLOCKS: usize = GRID_DIMS[0] * GRID_DIMS[1] * GRID_DIMS[2];

/// block 编号，取值范围 [0, block_count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// block 网格布局
/// 体数据被切分为 grid_dims 个 block，每个 block 的大小为 block_dims
/// 编号顺序：I 变化最快，J 其次，K 最慢 (id = K * gx * gy + J * gx + I)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    pub grid_dims: [usize; 3],
    pub block_dims: [usize; 3],
}

impl BlockGrid {
    /// 创建自定义布局，任何维度都不能为 0
    /// 体数据每个轴的总长度必须能用 i32 表示，体素与 block 总数不能溢出 usize
    pub fn new(grid_dims: [usize; 3], block_dims: [usize; 3]) -> Result<Self, String> {
        if grid_dims.contains(&0) || block_dims.contains(&0) {
            return Err(format!(
                "网格维度无效: grid {:?}, block {:?}",
                grid_dims, block_dims
            ));
        }

        for axis in 0..3 {
            let fits = grid_dims[axis]
                .checked_mul(block_dims[axis])
                .is_some_and(|len| i32::try_from(len).is_ok());
            if !fits {
                return Err(format!(
                    "网格过大: 第 {} 轴 {} × {} 超出 i32 范围",
                    axis, grid_dims[axis], block_dims[axis]
                ));
            }
        }

        let product = |dims: [usize; 3]| {
            dims[0]
                .checked_mul(dims[1])
                .and_then(|v| v.checked_mul(dims[2]))
        };
        if product(grid_dims).is_none() || product(block_dims).is_none() {
            return Err(format!(
                "网格过大: grid {:?}, block {:?} 的元素总数溢出",
                grid_dims, block_dims
            ));
        }

        Ok(Self {
            grid_dims,
            block_dims,
        })
    }

    /// bob 时间序列的固定布局：8×8×15 个 256×256×128 的 block
    pub const fn bob() -> Self {
        Self {
            grid_dims: GRID_DIMS,
            block_dims: BLOCK_DIMS,
        }
    }

    pub fn block_count(&self) -> usize {
        self.grid_dims[0] * self.grid_dims[1] * self.grid_dims[2]
    }

    pub fn block_voxels(&self) -> usize {
        self.block_dims[0] * self.block_dims[1] * self.block_dims[2]
    }

    pub fn contains(&self, id: BlockId) -> bool {
        id.0 < self.block_count()
    }

    /// 分解 block 编号为网格坐标 (I, J, K)
    pub fn coords(&self, id: BlockId) -> [usize; 3] {
        let [gx, gy, _] = self.grid_dims;
        [id.0 % gx, (id.0 / gx) % gy, id.0 / (gx * gy)]
    }

    /// block 在整个体数据中的起点（体素单位）
    pub fn origin(&self, id: BlockId) -> [i32; 3] {
        let [i, j, k] = self.coords(id);
        [
            (i * self.block_dims[0]) as i32,
            (j * self.block_dims[1]) as i32,
            (k * self.block_dims[2]) as i32,
        ]
    }

    /// 每次上传的区域大小，所有 block 相同
    pub fn extent(&self) -> [i32; 3] {
        self.block_dims.map(|d| d as i32)
    }

    /// 整个体数据的维度，bob 为 (2048, 2048, 1920)
    pub fn volume_dims(&self) -> [i32; 3] {
        [
            (self.grid_dims[0] * self.block_dims[0]) as i32,
            (self.grid_dims[1] * self.block_dims[1]) as i32,
            (self.grid_dims[2] * self.block_dims[2]) as i32,
        ]
    }

    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.block_count()).map(BlockId)
    }
}

impl Default for BlockGrid {
    fn default() -> Self {
        Self::bob()
    }
}
