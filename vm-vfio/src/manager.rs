//! 设备管理器
//!
//! 按设备 ID 登记设备，每个设备由独立的锁保护：同一设备上的
//! attach/detach 串行执行，不同设备互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{SharedDeviceInfo, SysfsPaths};
use crate::device::{Device, DeviceReceiver, GenericDevice};
use crate::sysfs::{HostSysfs, SysfsBackend};
use crate::vfio::VfioDevice;
use crate::{DeviceError, LOG_TARGET, Result};

type DeviceSlot = Arc<Mutex<Box<dyn Device>>>;

pub struct DeviceManager {
    devices: RwLock<HashMap<String, DeviceSlot>>,
    sysfs: Arc<dyn SysfsBackend>,
    paths: SysfsPaths,
}

impl DeviceManager {
    pub fn new(sysfs: Arc<dyn SysfsBackend>, paths: SysfsPaths) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            sysfs,
            paths,
        }
    }

    /// 登记一个 VFIO 设备，返回设备 ID
    pub fn new_vfio_device(&self, device_info: SharedDeviceInfo) -> Result<String> {
        let device = VfioDevice::with_backend(device_info, self.sysfs.clone(), self.paths.clone());
        self.insert(Box::new(device))
    }

    pub fn new_generic_device(&self, device_info: SharedDeviceInfo) -> Result<String> {
        self.insert(Box::new(GenericDevice::new(device_info)))
    }

    fn insert(&self, device: Box<dyn Device>) -> Result<String> {
        let id = device.device_id().to_string();
        let mut devices = self.devices.write();
        if devices.contains_key(&id) {
            return Err(DeviceError::DeviceExists(id));
        }
        log::debug!(target: LOG_TARGET, "Registered {} device {}", device.device_type(), id);
        devices.insert(id.clone(), Arc::new(Mutex::new(device)));
        Ok(id)
    }

    fn slot(&self, id: &str) -> Result<DeviceSlot> {
        self.devices
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DeviceError::DeviceNotFound(id.to_string()))
    }

    pub fn attach_device(&self, id: &str, receiver: &mut dyn DeviceReceiver) -> Result<()> {
        let slot = self.slot(id)?;
        let mut device = slot.lock();
        device.attach(receiver)
    }

    pub fn detach_device(&self, id: &str, receiver: &mut dyn DeviceReceiver) -> Result<()> {
        let slot = self.slot(id)?;
        let mut device = slot.lock();
        device.detach(receiver)
    }

    pub fn is_attached(&self, id: &str) -> Result<bool> {
        Ok(self.slot(id)?.lock().is_attached())
    }

    /// 在设备锁内访问设备
    pub fn with_device<R>(&self, id: &str, f: impl FnOnce(&dyn Device) -> R) -> Result<R> {
        let slot = self.slot(id)?;
        let device = slot.lock();
        Ok(f(&**device))
    }

    /// 注销设备，仍处于 attach 状态时拒绝
    ///
    /// 只在设备锁内检查状态，登记表的写锁在拿到设备锁之后才获取，
    /// 因此等待中的注销不会阻塞其他设备。
    pub fn remove_device(&self, id: &str) -> Result<()> {
        let slot = self.slot(id)?;
        let device = slot.lock();
        if device.is_attached() {
            return Err(DeviceError::DeviceAttached(id.to_string()));
        }

        let mut devices = self.devices.write();
        match devices.get(id) {
            Some(current) if Arc::ptr_eq(current, &slot) => {}
            _ => return Err(DeviceError::DeviceNotFound(id.to_string())),
        }
        devices.remove(id);
        drop(devices);
        drop(device);
        log::debug!(target: LOG_TARGET, "Removed device {}", id);
        Ok(())
    }

    /// 已登记的设备 ID，按字典序
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new(Arc::new(HostSysfs), SysfsPaths::default())
    }
}
