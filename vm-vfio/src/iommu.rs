//! IOMMU 组枚举
//!
//! IOMMU 组是设备隔离的最小单位，组内所有设备必须一起直通。

use std::path::{Path, PathBuf};

use crate::bdf::parse_bdf;
use crate::config::SysfsPaths;
use crate::sysfs::SysfsBackend;
use crate::vfio::VfioDev;
use crate::{MAX_DEV_ID_SIZE, Result, VFIO_DEV_ID_PREFIX};

/// IOMMU 组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IommuGroup {
    /// 组名，例如 "42"
    pub id: String,
    /// 组的 `devices` 目录
    pub path: PathBuf,
    /// 组内设备的 sysfs 目录项名，按列出顺序
    pub devices: Vec<String>,
}

impl IommuGroup {
    /// 由宿主机路径（如 `/dev/vfio/42`）读取组成员
    pub fn from_host_path(
        sysfs: &dyn SysfsBackend,
        paths: &SysfsPaths,
        host_path: &str,
    ) -> Result<Self> {
        let id = group_name(host_path);
        let path = paths.iommu_group_devices(&id);
        let devices = sysfs.list_dir(&path)?;

        log::debug!(
            target: crate::LOG_TARGET,
            "Read IOMMU group {}: {:?}",
            id,
            devices
        );

        Ok(Self { id, path, devices })
    }

    /// 为组内每个设备构造一个 VfioDev
    ///
    /// 任一目录项解析失败即返回错误，不产生部分结果。
    pub fn vfio_devs(&self, device_id: &str) -> Result<Vec<VfioDev>> {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let bdf = parse_bdf(name)?;
                let id = make_name_id(
                    VFIO_DEV_ID_PREFIX,
                    &format!("{}{}", device_id, i),
                    MAX_DEV_ID_SIZE,
                );
                Ok(VfioDev { id, bdf })
            })
            .collect()
    }
}

/// 宿主机路径的最后一段即组名
///
/// 没有最后一段时（如 `/` 或以 `..` 结尾）返回 `.`，路径仍落在组根目录下。
fn group_name(host_path: &str) -> String {
    Path::new(host_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

/// 生成 `<prefix>-<base>` 形式的 ID，超过 `max_len` 字节时截断
pub fn make_name_id(prefix: &str, base: &str, max_len: usize) -> String {
    let mut name_id = format!("{}-{}", prefix, base);
    if name_id.len() > max_len {
        let mut end = max_len;
        while !name_id.is_char_boundary(end) {
            end -= 1;
        }
        name_id.truncate(end);
    }
    name_id
}
