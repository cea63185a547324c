//! 并行 block 加载的集成测试

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bob_loader::block::block_path;
use bob_loader::{
    BlockGrid, BlockId, BlockLoader, LoadError, LoadReport, LoaderConfig, Volume, VolumeHandle,
    VoxelRange, load_timestep, voxel_range_of,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// 记录每次 region 上传的宿主体数据替身
struct RecordingVolume {
    handle: VolumeHandle,
    in_flight: AtomicBool,
    overlaps: usize,
    uploads: Vec<Upload>,
    hold: Duration,
}

struct Upload {
    origin: [i32; 3],
    extent: [i32; 3],
    len: usize,
    first: u8,
    started: Instant,
    finished: Instant,
}

impl RecordingVolume {
    fn new(handle: u64) -> Self {
        Self {
            handle: VolumeHandle(handle),
            in_flight: AtomicBool::new(false),
            overlaps: 0,
            uploads: Vec::new(),
            hold: Duration::ZERO,
        }
    }

    fn holding_each_upload(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    fn origins(&self) -> HashSet<[i32; 3]> {
        self.uploads.iter().map(|upload| upload.origin).collect()
    }
}

impl Volume for RecordingVolume {
    fn handle(&self) -> VolumeHandle {
        self.handle
    }

    fn set_vec3i(&mut self, _name: &str, _value: [i32; 3]) {}

    fn set_string(&mut self, _name: &str, _value: &str) {}

    fn set_region(
        &mut self,
        data: &[u8],
        origin: [i32; 3],
        extent: [i32; 3],
    ) -> Result<(), String> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps += 1;
        }
        let started = Instant::now();
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        self.uploads.push(Upload {
            origin,
            extent,
            len: data.len(),
            first: data[0],
            started,
            finished: Instant::now(),
        });
        self.in_flight.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn timestep_dir(root: &TempDir, timestep: u32) -> PathBuf {
    let dir = root.path().join(format!("bob{:03}.bob", timestep));
    std::fs::create_dir(&dir).unwrap();
    dir
}

/// 每个 block 用自己的编号填充，上传的数据即可识别是哪个 block
fn write_raw_blocks(dir: &Path, timestep: u32, grid: &BlockGrid) {
    for id in grid.ids() {
        let voxels = vec![id.0 as u8; grid.block_voxels()];
        std::fs::write(block_path(dir, timestep, id, false), voxels).unwrap();
    }
}

fn gzip(voxels: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(voxels).unwrap();
    encoder.finish().unwrap()
}

fn incomplete(err: LoadError) -> Box<LoadReport> {
    match err {
        LoadError::Incomplete(report) => report,
        other => panic!("expected an incomplete load, got {other}"),
    }
}

fn small_grid() -> BlockGrid {
    BlockGrid::new([4, 4, 3], [8, 4, 2]).unwrap()
}

fn small_config(threads: usize) -> LoaderConfig {
    LoaderConfig::from_env()
        .with_threads(threads)
        .with_gzip(false)
        .with_pinning(false)
        .with_voxel_range_publishing(false)
        .with_grid(small_grid())
}

fn expected_origin(grid: &BlockGrid, id: usize) -> [i32; 3] {
    let [gx, gy, _] = grid.grid_dims;
    let [bx, by, bz] = grid.block_dims;
    [
        ((id % gx) * bx) as i32,
        (((id / gx) % gy) * by) as i32,
        ((id / (gx * gy)) * bz) as i32,
    ]
}

#[test]
fn test_every_block_uploaded_exactly_once() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 12);
    let grid = small_grid();
    write_raw_blocks(&dir, 12, &grid);

    let mut volume = RecordingVolume::new(1);
    let report = load_timestep(&mut volume, &dir, small_config(8)).unwrap();

    assert_eq!(volume.uploads.len(), grid.block_count());
    let ids: HashSet<usize> = volume.uploads.iter().map(|u| u.first as usize).collect();
    assert_eq!(ids, (0..grid.block_count()).collect());

    let expected: Vec<BlockId> = grid.ids().collect();
    assert_eq!(report.uploaded_ids(), expected);
    assert!(report.is_complete());
    assert_eq!(report.threads, 8);
}

#[test]
fn test_origin_and_extent_match_block_id() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 3);
    let grid = small_grid();
    write_raw_blocks(&dir, 3, &grid);

    let mut volume = RecordingVolume::new(2);
    let report = load_timestep(&mut volume, &dir, small_config(5)).unwrap();

    for upload in &volume.uploads {
        let id = upload.first as usize;
        assert_eq!(upload.extent, [8, 4, 2]);
        assert_eq!(upload.len, grid.block_voxels());
        assert_eq!(upload.origin, expected_origin(&grid, id));
    }
    for record in &report.blocks {
        assert_eq!(record.origin, expected_origin(&grid, record.block.0));
        assert_eq!(record.range, VoxelRange::new(record.block.0 as f32, record.block.0 as f32));
    }
}

#[test]
fn test_uploads_never_overlap() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 4);
    let grid = small_grid();
    write_raw_blocks(&dir, 4, &grid);

    let mut volume = RecordingVolume::new(3).holding_each_upload(Duration::from_millis(2));
    load_timestep(&mut volume, &dir, small_config(8)).unwrap();

    assert_eq!(volume.overlaps, 0);
    let mut spans: Vec<(Instant, Instant)> = volume
        .uploads
        .iter()
        .map(|u| (u.started, u.finished))
        .collect();
    spans.sort();
    for pair in spans.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "uploads overlapped in time");
    }
}

#[test]
fn test_full_grid_voxel_range_from_gzip_blocks() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 7);
    let grid = BlockGrid::bob();

    let zeros = vec![0u8; grid.block_voxels()];
    let plain = gzip(&zeros);
    let mut marked = zeros;
    marked[12_345] = 200;
    let marked = gzip(&marked);

    for id in grid.ids() {
        let bytes = if id.0 == 500 { &marked } else { &plain };
        std::fs::write(block_path(&dir, 7, id, true), bytes).unwrap();
    }

    let config = LoaderConfig::from_env().with_gzip(true);
    let mut volume = RecordingVolume::new(7_000_001);
    let report = BlockLoader::new(&dir, config).unwrap().load(&mut volume).unwrap();

    assert_eq!(report.voxel_range, VoxelRange::new(0.0, 200.0));
    assert_eq!(voxel_range_of(VolumeHandle(7_000_001)), Some(VoxelRange::new(0.0, 200.0)));

    assert_eq!(volume.uploads.len(), 960);
    let expected: HashSet<[i32; 3]> = (0..960).map(|id| expected_origin(&grid, id)).collect();
    assert_eq!(volume.origins(), expected);
    assert!(volume.uploads.iter().all(|u| u.extent == [256, 256, 128]));

    let marked = report.blocks.iter().find(|r| r.block == BlockId(500)).unwrap();
    assert_eq!(marked.coords, [4, 6, 7]);
    assert_eq!(marked.range, VoxelRange::new(0.0, 200.0));
}

#[test]
fn test_missing_block_fails_only_that_block() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 9);
    let grid = small_grid();
    write_raw_blocks(&dir, 9, &grid);
    std::fs::remove_file(block_path(&dir, 9, BlockId(17), false)).unwrap();

    let mut volume = RecordingVolume::new(4);
    let err = load_timestep(&mut volume, &dir, small_config(4)).unwrap_err();
    let report = incomplete(err);

    // 失败的 worker 退出，其余 worker 领取剩下的所有 block
    assert_eq!(report.failed_ids(), vec![BlockId(17)]);
    assert!(report.unclaimed.is_empty());
    assert_eq!(report.blocks.len(), grid.block_count() - 1);
    assert_eq!(volume.uploads.len(), grid.block_count() - 1);
    assert!(!volume.origins().contains(&expected_origin(&grid, 17)));
    assert!(report.failures[0].error.contains("d_0009_0017"));
}

#[test]
fn test_missing_block_with_single_worker_truncates() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 9);
    let grid = small_grid();
    write_raw_blocks(&dir, 9, &grid);
    std::fs::remove_file(block_path(&dir, 9, BlockId(17), false)).unwrap();

    let mut volume = RecordingVolume::new(5);
    let err = load_timestep(&mut volume, &dir, small_config(1)).unwrap_err();
    let report = incomplete(err);

    assert_eq!(volume.uploads.len(), 17);
    assert_eq!(report.failed_ids(), vec![BlockId(17)]);
    let unclaimed: Vec<BlockId> = (18..grid.block_count()).map(BlockId).collect();
    assert_eq!(report.unclaimed, unclaimed);
}

#[test]
fn test_partial_load_still_publishes_range() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 2);
    let grid = small_grid();
    write_raw_blocks(&dir, 2, &grid);
    std::fs::remove_file(block_path(&dir, 2, BlockId(47), false)).unwrap();

    let config = small_config(3).with_voxel_range_publishing(true);
    let mut volume = RecordingVolume::new(6_000_002);
    assert!(load_timestep(&mut volume, &dir, config).is_err());

    assert_eq!(
        voxel_range_of(VolumeHandle(6_000_002)),
        Some(VoxelRange::new(0.0, 46.0))
    );
}

#[test]
fn test_bad_directory_name_starts_no_workers() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("bob12.bob");
    std::fs::create_dir(&dir).unwrap();

    let mut volume = RecordingVolume::new(8);
    let err = load_timestep(&mut volume, &dir, small_config(4)).unwrap_err();
    assert!(matches!(err, LoadError::Format { .. }));
    assert!(volume.uploads.is_empty());
}

#[test]
fn test_pinning_more_workers_than_cores() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 1);
    let grid = small_grid();
    write_raw_blocks(&dir, 1, &grid);

    let cores = core_affinity::get_core_ids().unwrap_or_default();
    let workers = cores.len().max(num_cpus::get()) + 2;
    let config = small_config(workers).with_pinning(true);
    let mut volume = RecordingVolume::new(9);
    let report = load_timestep(&mut volume, &dir, config).unwrap();

    assert_eq!(report.blocks.len(), grid.block_count());
    for record in &report.blocks {
        assert!(record.pin_slot < workers);
        if record.pin_slot >= cores.len() {
            // 超出可用核心的序号不绑定
            assert_eq!(record.core, None, "slot {} was pinned", record.pin_slot);
        } else {
            assert_eq!(record.core, Some(cores[record.pin_slot].id));
        }
    }
}

#[test]
fn test_single_worker_is_pinned_to_first_core() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 1);
    let grid = small_grid();
    write_raw_blocks(&dir, 1, &grid);

    let config = small_config(1).with_pinning(true);
    let mut volume = RecordingVolume::new(10);
    let report = load_timestep(&mut volume, &dir, config).unwrap();

    let expected = core_affinity::get_core_ids()
        .unwrap_or_default()
        .first()
        .map(|core| core.id);
    assert_eq!(report.blocks.len(), grid.block_count());
    assert!(report.blocks.iter().all(|r| r.pin_slot == 0 && r.core == expected));
    if expected.is_some() {
        assert!(report.blocks.iter().any(|r| r.core.is_some()));
    }
}

#[test]
fn test_unpinned_workers_record_no_core() {
    let root = tempfile::tempdir().unwrap();
    let dir = timestep_dir(&root, 1);
    let grid = small_grid();
    write_raw_blocks(&dir, 1, &grid);

    let mut volume = RecordingVolume::new(11);
    let report = load_timestep(&mut volume, &dir, small_config(3)).unwrap();
    assert!(report.blocks.iter().all(|r| r.core.is_none()));
}
