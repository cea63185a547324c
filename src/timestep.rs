use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{LoadError, Result};

fn bob_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^bob([0-9]{3})\.bob$").expect("bob 文件名正则无效"))
}

/// 从输入目录的最后一级名称中解析时间步
/// 名称必须恰好为 bob<3 位数字>.bob，例如 bob042.bob -> 42
pub fn parse_timestep(path: impl AsRef<Path>) -> Result<u32> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let format_error = || LoadError::Format {
        name: path.display().to_string(),
    };

    let captures = bob_name_pattern().captures(name).ok_or_else(format_error)?;
    captures[1].parse::<u32>().map_err(|_| format_error())
}
