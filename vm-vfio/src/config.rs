//! 宿主设备描述与 sysfs 路径配置

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{DeviceError, Result, VFIO_PCI_DRIVER};

pub const DEFAULT_PCI_DEVICES_PATH: &str = "/sys/bus/pci/devices";
pub const DEFAULT_PCI_DRIVERS_PATH: &str = "/sys/bus/pci/drivers";
pub const DEFAULT_IOMMU_GROUPS_PATH: &str = "/sys/kernel/iommu_groups";

/// 宿主机设备信息，由调用方持有
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    /// 设备 ID
    pub id: String,
    /// 宿主机路径，VFIO 设备为 `/dev/vfio/<group>`
    pub host_path: String,
    /// 容器内路径
    pub container_path: String,
    /// 设备节点类型（`c`、`b`、`u` 或 `p`）
    pub dev_type: String,
    pub major: i64,
    pub minor: i64,
    /// 是否已热插入虚拟机
    pub hotplugged: bool,
}

/// 调用方与设备实体共享的设备信息
pub type SharedDeviceInfo = Arc<Mutex<DeviceInfo>>;

impl DeviceInfo {
    pub fn new(id: impl Into<String>, host_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host_path: host_path.into(),
            ..Self::default()
        }
    }

    /// 包装为共享信息
    pub fn into_shared(self) -> SharedDeviceInfo {
        Arc::new(Mutex::new(self))
    }
}

/// sysfs 根路径配置
///
/// 所有驱动控制文件和 IOMMU 组路径都由这里渲染。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsPaths {
    pub pci_devices: PathBuf,
    pub pci_drivers: PathBuf,
    pub iommu_groups: PathBuf,
}

impl Default for SysfsPaths {
    fn default() -> Self {
        Self {
            pci_devices: PathBuf::from(DEFAULT_PCI_DEVICES_PATH),
            pci_drivers: PathBuf::from(DEFAULT_PCI_DRIVERS_PATH),
            iommu_groups: PathBuf::from(DEFAULT_IOMMU_GROUPS_PATH),
        }
    }
}

impl SysfsPaths {
    /// 以 `root` 为前缀构造一套路径，布局与真实 sysfs 相同
    pub fn with_root(root: &Path) -> Self {
        Self {
            pci_devices: root.join("bus/pci/devices"),
            pci_drivers: root.join("bus/pci/drivers"),
            iommu_groups: root.join("kernel/iommu_groups"),
        }
    }

    /// 从 JSON 文本解析，缺省字段取默认值
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DeviceError::InvalidConfig(e.to_string()))
    }

    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DeviceError::io(path, e))?;
        Self::from_json(&text)
    }

    /// 设备当前驱动的 unbind 文件
    pub fn unbind_path(&self, bdf: &str) -> PathBuf {
        self.pci_devices.join(bdf).join("driver/unbind")
    }

    /// 指定驱动的 bind 文件
    pub fn bind_path(&self, driver: &str) -> PathBuf {
        self.pci_drivers.join(driver).join("bind")
    }

    pub fn new_id_path(&self) -> PathBuf {
        self.pci_drivers.join(VFIO_PCI_DRIVER).join("new_id")
    }

    pub fn remove_id_path(&self) -> PathBuf {
        self.pci_drivers.join(VFIO_PCI_DRIVER).join("remove_id")
    }

    /// IOMMU 组成员目录
    pub fn iommu_group_devices(&self, group: &str) -> PathBuf {
        self.iommu_groups.join(group).join("devices")
    }
}
