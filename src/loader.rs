use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use core_affinity::CoreId;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::block::{Block, block_path};
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::grid::BlockId;
use crate::range::{VoxelRange, VoxelRangeTable};
use crate::report::{BlockFailure, BlockRecord, LoadReport};
use crate::timestep::parse_timestep;
use crate::volume::Volume;

/// worker 之间共享的可变状态，全部由同一把锁保护
/// 目标体数据也在锁内，保证同一时刻最多只有一次上传
struct LoaderState<'v, V: ?Sized> {
    /// 下一个未领取的 block 编号，只增不减
    next_block: usize,
    /// 下一个 CPU 绑定序号
    next_pin: usize,
    voxel_range: VoxelRange,
    volume: &'v mut V,
    records: Vec<BlockRecord>,
    failures: Vec<BlockFailure>,
}

impl<V: ?Sized> LoaderState<'_, V> {
    fn claim_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    fn claim_pin(&mut self) -> usize {
        let index = self.next_pin;
        self.next_pin += 1;
        index
    }
}

/// 按时间步并行加载 bob block 网格
///
/// 构造时只解析时间步；load 启动固定数量的 worker，
/// 每个 worker 反复领取 block 编号、读取文件、在锁内上传到目标体数据，
/// 直到所有编号被领取完毕。load 返回前所有 worker 都已结束。
pub struct BlockLoader {
    dir: PathBuf,
    timestep: u32,
    config: LoaderConfig,
}

impl BlockLoader {
    /// 目录名必须形如 bob042.bob，否则返回 LoadError::Format，不会启动任何线程
    pub fn new(dir: impl Into<PathBuf>, config: LoaderConfig) -> Result<Self> {
        let dir = dir.into();
        let timestep = parse_timestep(&dir)?;
        Ok(Self {
            dir,
            timestep,
            config,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// 加载整个 block 网格到 volume，阻塞直到所有 worker 结束
    ///
    /// 单个 block 读取或上传失败只会终止处理它的 worker，其余 worker 继续领取编号。
    /// 只要有失败，返回 LoadError::Incomplete，其中带有完整的加载报告。
    pub fn load<V: Volume + ?Sized>(&self, volume: &mut V) -> Result<LoadReport> {
        let start = Instant::now();
        let workers = self.config.worker_count();
        let grid = self.config.grid;
        let handle = volume.handle();

        // 先确认可用核心，序号超出范围的 worker 不绑定
        let cores = if self.config.pin_threads {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        info!(
            "[加载] 开始加载 {} (时间步 {}), {} 个 block, {} 个 worker, gzip: {}",
            self.dir.display(),
            self.timestep,
            grid.block_count(),
            workers,
            self.config.use_gzip
        );

        let state = Mutex::new(LoaderState {
            next_block: 0,
            next_pin: 0,
            voxel_range: VoxelRange::EMPTY,
            volume,
            records: Vec::with_capacity(grid.block_count()),
            failures: Vec::new(),
        });

        thread::scope(|scope| {
            for worker in 0..workers {
                let state = &state;
                let cores = cores.as_slice();
                scope.spawn(move || self.run_worker(worker, state, cores));
            }
        });

        let state = state.into_inner();
        let first_unclaimed = state.next_block.min(grid.block_count());
        let report = LoadReport {
            timestep: self.timestep,
            threads: workers,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            voxel_range: state.voxel_range,
            blocks: state.records,
            failures: state.failures,
            unclaimed: (first_unclaimed..grid.block_count()).map(BlockId).collect(),
        };

        if self.config.publish_voxel_range {
            VoxelRangeTable::global().publish(handle, report.voxel_range);
        }

        info!(
            "[加载] {}, 体素范围 [{}, {}], 耗时 {:.2}ms",
            report, report.voxel_range.min, report.voxel_range.max, report.elapsed_ms
        );

        if report.is_complete() {
            Ok(report)
        } else {
            Err(LoadError::Incomplete(Box::new(report)))
        }
    }

    fn run_worker<V: Volume + ?Sized>(
        &self,
        worker: usize,
        state: &Mutex<LoaderState<'_, V>>,
        cores: &[CoreId],
    ) {
        let pin_index = state.lock().claim_pin();
        let core = self.pin_current_thread(worker, pin_index, cores);

        let grid = &self.config.grid;
        let gzip = self.config.use_gzip;
        let mut block = Block::new(grid.block_voxels());

        loop {
            let id = state.lock().claim_block();
            if !grid.contains(id) {
                break;
            }

            let coords = grid.coords(id);
            let origin = grid.origin(id);
            debug!("{}", block_tag(id, coords, core));

            let path = block_path(&self.dir, self.timestep, id, gzip);
            let load_start = Instant::now();
            if let Err(e) = block.load(&path, gzip) {
                Self::record_failure(state, worker, id, e);
                break;
            }
            let load_ms = load_start.elapsed().as_secs_f64() * 1000.0;

            let upload_start = Instant::now();
            let uploaded = state
                .lock()
                .volume
                .set_region(block.voxels(), origin, grid.extent());
            if let Err(message) = uploaded {
                Self::record_failure(state, worker, id, LoadError::Upload { block: id, message });
                break;
            }
            let upload_ms = upload_start.elapsed().as_secs_f64() * 1000.0;

            // 局部范围在锁外计算
            let range = block.value_range();

            let mut shared = state.lock();
            shared.voxel_range.merge(range);
            shared.records.push(BlockRecord {
                block: id,
                coords,
                origin,
                worker,
                pin_slot: pin_index,
                core,
                load_ms,
                upload_ms,
                range,
            });
        }
    }

    fn pin_current_thread(
        &self,
        worker: usize,
        pin_index: usize,
        cores: &[CoreId],
    ) -> Option<usize> {
        if !self.config.pin_threads {
            return None;
        }

        let Some(&core) = cores.get(pin_index) else {
            warn!(
                "[加载] worker {} 的绑定序号 {} 超出可用核心数 {}，跳过绑定",
                worker,
                pin_index,
                cores.len()
            );
            return None;
        };

        if core_affinity::set_for_current(core) {
            Some(core.id)
        } else {
            warn!("[加载] worker {} 绑定核心 {} 失败，跳过绑定", worker, core.id);
            None
        }
    }

    fn record_failure<V: ?Sized>(
        state: &Mutex<LoaderState<'_, V>>,
        worker: usize,
        block: BlockId,
        err: LoadError,
    ) {
        error!("[加载] worker {} 处理 block {} 失败，worker 退出: {}", worker, block, err);
        state.lock().failures.push(BlockFailure {
            block,
            worker,
            error: err.to_string(),
        });
    }
}

/// 每个 block 的日志标签: [b<编号>:<I>,<J>,<K>,(<核心>)]，未绑定时核心为 -1
fn block_tag(id: BlockId, coords: [usize; 3], core: Option<usize>) -> String {
    let core = core.map_or(-1, |core| core as i64);
    format!("[b{}:{},{},{},({})]", id, coords[0], coords[1], coords[2], core)
}

/// 解析时间步并加载，等价于 BlockLoader::new + load
pub fn load_timestep<V: Volume + ?Sized>(
    volume: &mut V,
    dir: impl Into<PathBuf>,
    config: LoaderConfig,
) -> Result<LoadReport> {
    BlockLoader::new(dir, config)?.load(volume)
}
