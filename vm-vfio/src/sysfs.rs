//! sysfs 访问
//!
//! 驱动重绑定与 IOMMU 组枚举只需要两个原语：向文件写字节、列出目录项。

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::{DeviceError, Result};

/// sysfs 读写后端
pub trait SysfsBackend: Send + Sync {
    /// 向已存在的控制文件写入数据，只尝试一次
    fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// 列出目录下的条目名
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;
}

/// 直接操作宿主机文件系统的后端
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSysfs;

impl SysfsBackend for HostSysfs {
    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| DeviceError::io(path, e))?;
        file.write_all(data).map_err(|e| DeviceError::io(path, e))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| DeviceError::io(path, e))? {
            let entry = entry.map_err(|e| DeviceError::io(path, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        // read_dir 不保证顺序
        names.sort();
        Ok(names)
    }
}
