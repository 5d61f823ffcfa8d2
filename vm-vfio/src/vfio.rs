//! VFIO 直通设备

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{SharedDeviceInfo, SysfsPaths};
use crate::device::{Device, DeviceDetails, DeviceReceiver};
use crate::iommu::IommuGroup;
use crate::sysfs::{HostSysfs, SysfsBackend};
use crate::{DeviceType, LOG_TARGET, Result};

/// IOMMU 组中的一个成员设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfioDev {
    /// 生成的唯一 ID
    pub id: String,
    /// `bus:slot.func`
    pub bdf: String,
}

/// 交给 hypervisor 的 VFIO 设备，对应一个完整的 IOMMU 组
pub struct VfioDevice {
    id: String,
    device_info: SharedDeviceInfo,
    vfio_devs: Vec<VfioDev>,
    sysfs: Arc<dyn SysfsBackend>,
    paths: SysfsPaths,
}

impl VfioDevice {
    /// 使用宿主机 sysfs 创建设备
    pub fn new(device_info: SharedDeviceInfo) -> Self {
        Self::with_backend(device_info, Arc::new(HostSysfs), SysfsPaths::default())
    }

    pub fn with_backend(
        device_info: SharedDeviceInfo,
        sysfs: Arc<dyn SysfsBackend>,
        paths: SysfsPaths,
    ) -> Self {
        let id = device_info.lock().id.clone();
        Self {
            id,
            device_info,
            vfio_devs: Vec::new(),
            sysfs,
            paths,
        }
    }

    /// 最近一次 attach 枚举到的组成员
    pub fn vfio_devs(&self) -> &[VfioDev] {
        &self.vfio_devs
    }

    pub fn device_info(&self) -> &SharedDeviceInfo {
        &self.device_info
    }

    fn host_path(&self) -> String {
        self.device_info.lock().host_path.clone()
    }

    fn set_hotplugged(&self, hotplugged: bool) {
        self.device_info.lock().hotplugged = hotplugged;
    }
}

impl Device for VfioDevice {
    fn attach(&mut self, receiver: &mut dyn DeviceReceiver) -> Result<()> {
        if self.is_attached() {
            return Ok(());
        }

        self.vfio_devs.clear();
        let host_path = self.host_path();
        let group = IommuGroup::from_host_path(self.sysfs.as_ref(), &self.paths, &host_path)?;
        self.vfio_devs = group.vfio_devs(&self.id)?;

        // 热插拔 VFIO 设备实际上是热插拔整个 IOMMU 组
        if let Err(e) = receiver.hotplug_add_device(&*self, DeviceType::Vfio) {
            log::error!(
                target: LOG_TARGET,
                "Failed to add device {} (device-group={}): {}",
                self.id,
                host_path,
                e
            );
            self.vfio_devs.clear();
            return Err(e);
        }

        log::info!(
            target: LOG_TARGET,
            "Device group attached: device-group={} device-type=vfio-passthrough members={}",
            host_path,
            self.vfio_devs.len()
        );
        self.set_hotplugged(true);
        Ok(())
    }

    fn detach(&mut self, receiver: &mut dyn DeviceReceiver) -> Result<()> {
        if !self.is_attached() {
            return Ok(());
        }

        let host_path = self.host_path();
        if let Err(e) = receiver.hotplug_remove_device(&*self, DeviceType::Vfio) {
            log::error!(
                target: LOG_TARGET,
                "Failed to remove device {} (device-group={}): {}",
                self.id,
                host_path,
                e
            );
            return Err(e);
        }

        log::info!(
            target: LOG_TARGET,
            "Device group detached: device-group={} device-type=vfio-passthrough",
            host_path
        );
        self.set_hotplugged(false);
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.device_info.lock().hotplugged
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Vfio
    }

    fn device_id(&self) -> &str {
        &self.id
    }

    fn device_details(&self) -> DeviceDetails<'_> {
        DeviceDetails::Vfio(&self.vfio_devs)
    }
}
