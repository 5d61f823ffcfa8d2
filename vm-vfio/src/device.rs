//! 设备抽象
//!
//! 不同种类的设备实现同一个 [`Device`] trait，由编排层统一驱动其
//! attach/detach 生命周期。

use crate::config::{DeviceInfo, SharedDeviceInfo};
use crate::vfio::VfioDev;
use crate::{DeviceType, Result};

/// 设备热插拔接收者（通常是 hypervisor 集成层）
pub trait DeviceReceiver {
    /// 将设备热插入虚拟机
    fn hotplug_add_device(&mut self, device: &dyn Device, dev_type: DeviceType) -> Result<()>;

    /// 将设备从虚拟机热拔出
    fn hotplug_remove_device(&mut self, device: &dyn Device, dev_type: DeviceType) -> Result<()>;
}

/// 设备的类型化详细信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDetails<'a> {
    /// IOMMU 组内的全部设备
    Vfio(&'a [VfioDev]),
    Generic(DeviceInfo),
}

/// 可被 attach 到虚拟机的设备
///
/// 同一设备上的 attach/detach 需要 `&mut self`，并发调用由调用方串行化，
/// 参见 [`crate::DeviceManager`]。
pub trait Device: Send {
    /// 附加到接收者，已附加时直接返回成功
    fn attach(&mut self, receiver: &mut dyn DeviceReceiver) -> Result<()>;

    /// 从接收者分离，未附加时直接返回成功
    fn detach(&mut self, receiver: &mut dyn DeviceReceiver) -> Result<()>;

    fn is_attached(&self) -> bool;

    fn device_type(&self) -> DeviceType;

    fn device_id(&self) -> &str;

    fn device_details(&self) -> DeviceDetails<'_>;
}

/// 不需要热插拔的普通设备，只维护 attach 标志
pub struct GenericDevice {
    id: String,
    device_info: SharedDeviceInfo,
}

impl GenericDevice {
    pub fn new(device_info: SharedDeviceInfo) -> Self {
        let id = device_info.lock().id.clone();
        Self { id, device_info }
    }
}

impl Device for GenericDevice {
    fn attach(&mut self, _receiver: &mut dyn DeviceReceiver) -> Result<()> {
        let mut info = self.device_info.lock();
        if !info.hotplugged {
            info.hotplugged = true;
            log::debug!(target: crate::LOG_TARGET, "Generic device {} attached", self.id);
        }
        Ok(())
    }

    fn detach(&mut self, _receiver: &mut dyn DeviceReceiver) -> Result<()> {
        let mut info = self.device_info.lock();
        if info.hotplugged {
            info.hotplugged = false;
            log::debug!(target: crate::LOG_TARGET, "Generic device {} detached", self.id);
        }
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.device_info.lock().hotplugged
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Generic
    }

    fn device_id(&self) -> &str {
        &self.id
    }

    fn device_details(&self) -> DeviceDetails<'_> {
        DeviceDetails::Generic(self.device_info.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedReceiver;

    #[test]
    fn test_generic_device_lifecycle() {
        let info = DeviceInfo::new("tty0", "/dev/tty0").into_shared();
        let mut device = GenericDevice::new(info.clone());
        let mut receiver = ScriptedReceiver::default();

        assert_eq!(device.device_id(), "tty0");
        assert_eq!(device.device_type(), DeviceType::Generic);
        assert!(!device.is_attached());

        device.attach(&mut receiver).unwrap();
        assert!(device.is_attached());
        assert!(info.lock().hotplugged);
        assert!(receiver.added.is_empty());

        device.detach(&mut receiver).unwrap();
        assert!(!device.is_attached());
        assert!(receiver.removed.is_empty());
    }

    #[test]
    fn test_generic_device_details() {
        let info = DeviceInfo::new("tty0", "/dev/tty0").into_shared();
        let device = GenericDevice::new(info);

        match device.device_details() {
            DeviceDetails::Generic(info) => assert_eq!(info.host_path, "/dev/tty0"),
            other => panic!("unexpected details: {:?}", other),
        }
    }
}
