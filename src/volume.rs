use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 宿主体数据对象的标识，用于关联体素范围等进程级信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VolumeHandle(pub u64);

/// 宿主渲染器提供的体数据接口
/// loader 只通过这个 trait 访问目标体数据，不拥有它
pub trait Volume: Send {
    fn handle(&self) -> VolumeHandle;

    /// 设置三维整数属性，例如 "dimensions"
    fn set_vec3i(&mut self, name: &str, value: [i32; 3]);

    /// 设置字符串属性，例如 "voxelType"
    fn set_string(&mut self, name: &str, value: &str);

    /// 把一块连续的体素数据拷贝到 origin 开始、大小为 extent 的区域
    /// data 按 x 最快、y 其次、z 最慢的顺序排列
    fn set_region(
        &mut self,
        data: &[u8],
        origin: [i32; 3],
        extent: [i32; 3],
    ) -> Result<(), String>;
}

static NEXT_VOLUME_HANDLE: AtomicU64 = AtomicU64::new(1);

/// 内存中的稠密 u8 体数据
/// 设置 "dimensions" 属性时分配存储，索引: index = z * nx * ny + y * nx + x
#[derive(Debug)]
pub struct DenseVolume {
    handle: VolumeHandle,
    dimensions: [usize; 3],
    voxel_type: Option<String>,
    strings: HashMap<String, String>,
    data: Vec<u8>,
}

impl DenseVolume {
    pub fn new() -> Self {
        Self {
            handle: VolumeHandle(NEXT_VOLUME_HANDLE.fetch_add(1, Ordering::Relaxed)),
            dimensions: [0; 3],
            voxel_type: None,
            strings: HashMap::new(),
            data: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn voxel_type(&self) -> Option<&str> {
        self.voxel_type.as_deref()
    }

    pub fn string_attribute(&self, name: &str) -> Option<&str> {
        self.strings.get(name).map(String::as_str)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        let [nx, ny, nz] = self.dimensions;
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        self.data.get((z * ny + y) * nx + x).copied()
    }
}

impl Default for DenseVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Volume for DenseVolume {
    fn handle(&self) -> VolumeHandle {
        self.handle
    }

    fn set_vec3i(&mut self, name: &str, value: [i32; 3]) {
        if name == "dimensions" {
            self.dimensions = value.map(|v| v.max(0) as usize);
            let total = self.dimensions.iter().product();
            self.data = vec![0; total];
        }
    }

    fn set_string(&mut self, name: &str, value: &str) {
        if name == "voxelType" {
            self.voxel_type = Some(value.to_string());
        }
        self.strings.insert(name.to_string(), value.to_string());
    }

    fn set_region(
        &mut self,
        data: &[u8],
        origin: [i32; 3],
        extent: [i32; 3],
    ) -> Result<(), String> {
        match self.voxel_type.as_deref() {
            Some("uchar") => {}
            other => return Err(format!("不支持的 voxelType: {:?}", other)),
        }

        if origin.iter().any(|&v| v < 0) || extent.iter().any(|&v| v < 0) {
            return Err(format!("区域无效: origin {:?}, extent {:?}", origin, extent));
        }
        let origin = origin.map(|v| v as usize);
        let extent = extent.map(|v| v as usize);

        for axis in 0..3 {
            if origin[axis] + extent[axis] > self.dimensions[axis] {
                return Err(format!(
                    "区域越界: origin {:?} + extent {:?} 超出 dimensions {:?}",
                    origin, extent, self.dimensions
                ));
            }
        }

        let [ex, ey, ez] = extent;
        if data.len() != ex * ey * ez {
            return Err(format!(
                "数据量不匹配: extent {:?} 需要 {} 字节，但提供了 {} 字节",
                extent,
                ex * ey * ez,
                data.len()
            ));
        }

        let [nx, ny, _] = self.dimensions;
        let [ox, oy, oz] = origin;
        // 逐行拷贝，每行 ex 个体素
        for z in 0..ez {
            for y in 0..ey {
                let src = (z * ey + y) * ex;
                let dst = ((oz + z) * ny + (oy + y)) * nx + ox;
                self.data[dst..dst + ex].copy_from_slice(&data[src..src + ex]);
            }
        }
        Ok(())
    }
}
