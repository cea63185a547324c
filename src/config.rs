use crate::grid::BlockGrid;

/// 设置（任意值）后关闭 gzip 解压，直接读取原始 block 文件
pub const NO_GZIP_ENV: &str = "OSPRAY_RM_NO_GZIP";

/// loader 配置
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// worker 线程数，0 按 1 处理
    pub num_threads: usize,
    /// 读取 .gz 文件并在进程内解压
    pub use_gzip: bool,
    /// 是否把 worker 绑定到 CPU 核心
    pub pin_threads: bool,
    /// 加载结束后把体素范围写入全局映射表
    pub publish_voxel_range: bool,
    pub grid: BlockGrid,
}

impl LoaderConfig {
    /// 默认配置：线程数取逻辑 CPU 数，gzip 由环境变量决定
    pub fn from_env() -> Self {
        Self {
            num_threads: num_cpus::get(),
            use_gzip: std::env::var_os(NO_GZIP_ENV).is_none(),
            pin_threads: true,
            publish_voxel_range: true,
            grid: BlockGrid::bob(),
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_gzip(mut self, use_gzip: bool) -> Self {
        self.use_gzip = use_gzip;
        self
    }

    pub fn with_pinning(mut self, pin_threads: bool) -> Self {
        self.pin_threads = pin_threads;
        self
    }

    pub fn with_voxel_range_publishing(mut self, publish: bool) -> Self {
        self.publish_voxel_range = publish;
        self
    }

    pub fn with_grid(mut self, grid: BlockGrid) -> Self {
        self.grid = grid;
        self
    }

    /// 实际启动的 worker 数
    pub fn worker_count(&self) -> usize {
        self.num_threads.max(1)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
