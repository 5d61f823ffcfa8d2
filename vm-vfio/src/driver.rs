//! PCI 驱动重绑定
//!
//! 在宿主驱动与 vfio-pci 之间移动设备，用于 SR-IOV VF 直通前的准备
//! 以及直通结束后的恢复。每次写入只尝试一次，失败立即返回。

use std::sync::Arc;

use crate::config::SysfsPaths;
use crate::sysfs::{HostSysfs, SysfsBackend};
use crate::{LOG_TARGET, Result, VFIO_PCI_DRIVER};

/// 驱动绑定器
pub struct DriverBinder {
    sysfs: Arc<dyn SysfsBackend>,
    paths: SysfsPaths,
}

impl Default for DriverBinder {
    fn default() -> Self {
        Self::new(Arc::new(HostSysfs), SysfsPaths::default())
    }
}

impl DriverBinder {
    pub fn new(sysfs: Arc<dyn SysfsBackend>, paths: SysfsPaths) -> Self {
        Self { sysfs, paths }
    }

    /// 从当前驱动解绑并绑定到 vfio-pci
    ///
    /// `vendor_device_id` 为 `new_id` 接受的格式，例如 `"8086 1520"`。
    pub fn bind_to_vfio(&self, bdf: &str, host_driver: &str, vendor_device_id: &str) -> Result<()> {
        let unbind_path = self.paths.unbind_path(bdf);
        log::info!(
            target: LOG_TARGET,
            "Unbinding device from driver: device-bdf={} driver-path={}",
            bdf,
            unbind_path.display()
        );
        self.sysfs.write(&unbind_path, bdf.as_bytes())?;

        let new_id_path = self.paths.new_id_path();
        log::info!(
            target: LOG_TARGET,
            "Writing vendor-device-id to vfio new-id path: vendor-device-id={} vfio-new-id-path={}",
            vendor_device_id,
            new_id_path.display()
        );
        self.sysfs.write(&new_id_path, vendor_device_id.as_bytes())?;

        let bind_path = self.paths.bind_path(VFIO_PCI_DRIVER);
        log::info!(
            target: LOG_TARGET,
            "Binding device to vfio driver: device-bdf={} driver-path={}",
            bdf,
            bind_path.display()
        );
        // 写 new_id 后内核可能已自动绑定，忽略错误
        if let Err(e) = self.sysfs.write(&bind_path, bdf.as_bytes()) {
            log::warn!(
                target: LOG_TARGET,
                "Ignoring vfio-pci bind failure for {} (previous host driver {}): {}",
                bdf,
                host_driver,
                e
            );
        }

        Ok(())
    }

    /// 从 vfio-pci 解绑并恢复到宿主驱动
    pub fn bind_to_host(&self, bdf: &str, host_driver: &str, vendor_device_id: &str) -> Result<()> {
        let unbind_path = self.paths.unbind_path(bdf);
        log::info!(
            target: LOG_TARGET,
            "Unbinding device from driver: device-bdf={} driver-path={}",
            bdf,
            unbind_path.display()
        );
        self.sysfs.write(&unbind_path, bdf.as_bytes())?;

        // 避免之后新建的同 ID VF 被 vfio-pci 认领
        let remove_id_path = self.paths.remove_id_path();
        log::info!(
            target: LOG_TARGET,
            "Removing vendor-device-id from vfio driver: vendor-device-id={} vfio-remove-id-path={}",
            vendor_device_id,
            remove_id_path.display()
        );
        self.sysfs.write(&remove_id_path, vendor_device_id.as_bytes())?;

        let bind_path = self.paths.bind_path(host_driver);
        log::info!(
            target: LOG_TARGET,
            "Binding back device to host driver: device-bdf={} driver-path={}",
            bdf,
            bind_path.display()
        );
        self.sysfs.write(&bind_path, bdf.as_bytes())
    }
}

/// 在宿主机 sysfs 上将设备绑定到 vfio-pci
pub fn bind_device_to_vfio(bdf: &str, host_driver: &str, vendor_device_id: &str) -> Result<()> {
    DriverBinder::default().bind_to_vfio(bdf, host_driver, vendor_device_id)
}

/// 在宿主机 sysfs 上将设备恢复到宿主驱动
pub fn bind_device_to_host(bdf: &str, host_driver: &str, vendor_device_id: &str) -> Result<()> {
    DriverBinder::default().bind_to_host(bdf, host_driver, vendor_device_id)
}
