//! VFIO Device Passthrough
//!
//! 管理通过 VFIO 直通给虚拟机的宿主机 PCI 设备，以及在宿主驱动与
//! `vfio-pci` 之间切换设备归属的驱动重绑定流程。
//!
//! 一个 VFIO 直通单元是整个 IOMMU 组：`VfioDevice::attach` 枚举组内全部
//! 设备并作为一个热插拔单元交给 [`DeviceReceiver`]。

use std::fmt;
use std::path::PathBuf;

pub mod bdf;
pub mod config;
pub mod device;
pub mod driver;
pub mod iommu;
pub mod manager;
pub mod sysfs;
pub mod vfio;

#[cfg(test)]
mod testing;

pub use bdf::parse_bdf;
pub use config::{DeviceInfo, SharedDeviceInfo, SysfsPaths};
pub use device::{Device, DeviceDetails, DeviceReceiver, GenericDevice};
pub use driver::{DriverBinder, bind_device_to_host, bind_device_to_vfio};
pub use iommu::{IommuGroup, make_name_id};
pub use manager::DeviceManager;
pub use sysfs::{HostSysfs, SysfsBackend};
pub use vfio::{VfioDev, VfioDevice};

/// 所有日志使用的 target
pub(crate) const LOG_TARGET: &str = "vfio";

/// vfio-pci 驱动名
pub const VFIO_PCI_DRIVER: &str = "vfio-pci";

/// 生成的 VFIO 设备 ID 最大长度
pub const MAX_DEV_ID_SIZE: usize = 31;

/// 生成 VFIO 设备 ID 时使用的前缀
pub const VFIO_DEV_ID_PREFIX: &str = "vfio";

/// 设备类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// VFIO 直通（整个 IOMMU 组）
    Vfio,
    Block,
    VhostUser,
    Generic,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Vfio => "vfio",
            DeviceType::Block => "block",
            DeviceType::VhostUser => "vhost-user",
            DeviceType::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// 设备错误类型
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Incorrect number of tokens found while parsing bdf for device: {0}")]
    MalformedBdf(String),
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Hotplug failed for device {device_id}: {reason}")]
    Hotplug { device_id: String, reason: String },
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Device already exists: {0}")]
    DeviceExists(String),
    #[error("Device still attached: {0}")]
    DeviceAttached(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl DeviceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeviceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_display() {
        assert_eq!(DeviceType::Vfio.to_string(), "vfio");
        assert_eq!(DeviceType::VhostUser.to_string(), "vhost-user");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = DeviceError::io(
            "/sys/bus/pci/drivers/vfio-pci/new_id",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/sys/bus/pci/drivers/vfio-pci/new_id"));
    }
}
