use std::path::PathBuf;

use crate::grid::BlockId;
use crate::report::LoadReport;

pub type Result<T> = std::result::Result<T, LoadError>;

/// 加载过程中的错误类型
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// 目录名不符合 bob<3 位数字>.bob，无法得到时间步
    #[error("无法从 bob 文件名中提取时间步: {name}")]
    Format { name: String },

    #[error("无法打开 block 文件 {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("读取 block 文件 {path} 失败: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("block 文件 {path} 数据不足: 需要 {expected} 字节，只读到 {actual} 字节")]
    ShortRead {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// 宿主的 region 上传接口返回失败
    #[error("block {block} 上传失败: {message}")]
    Upload { block: BlockId, message: String },

    /// 所有 worker 结束后仍有 block 失败，报告中包含已完成与失败的 block
    #[error("加载不完整: {0}")]
    Incomplete(Box<LoadReport>),
}
