//! 单元测试用的 sysfs 后端与热插拔接收者

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::device::{Device, DeviceDetails, DeviceReceiver};
use crate::sysfs::SysfsBackend;
use crate::{DeviceError, DeviceType, Result};

/// 记录所有写操作的内存 sysfs
#[derive(Default)]
pub(crate) struct RecordingSysfs {
    dirs: Mutex<HashMap<PathBuf, Vec<String>>>,
    failing: Mutex<HashSet<PathBuf>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
    listings: Mutex<usize>,
}

impl RecordingSysfs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_dir(&self, path: PathBuf, entries: &[&str]) {
        self.dirs
            .lock()
            .insert(path, entries.iter().map(|e| e.to_string()).collect());
    }

    /// 之后对该路径的写操作返回 EBUSY
    pub(crate) fn fail_on(&self, path: PathBuf) {
        self.failing.lock().insert(path);
    }

    pub(crate) fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().clone()
    }

    pub(crate) fn written_paths(&self) -> Vec<PathBuf> {
        self.writes.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub(crate) fn listings(&self) -> usize {
        *self.listings.lock()
    }
}

impl SysfsBackend for RecordingSysfs {
    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.writes.lock().push((
            path.to_path_buf(),
            String::from_utf8_lossy(data).into_owned(),
        ));
        if self.failing.lock().contains(path) {
            return Err(DeviceError::io(
                path,
                io::Error::new(io::ErrorKind::ResourceBusy, "device or resource busy"),
            ));
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        *self.listings.lock() += 1;
        self.dirs
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| DeviceError::io(path, io::Error::from(io::ErrorKind::NotFound)))
    }
}

/// 记录调用并可按需失败的接收者
#[derive(Default)]
pub(crate) struct ScriptedReceiver {
    pub(crate) fail_add: bool,
    pub(crate) fail_remove: bool,
    pub(crate) added: Vec<(String, DeviceType)>,
    pub(crate) removed: Vec<(String, DeviceType)>,
    /// add 调用时设备暴露的 BDF 列表
    pub(crate) seen_bdfs: Vec<String>,
}

impl DeviceReceiver for ScriptedReceiver {
    fn hotplug_add_device(&mut self, device: &dyn Device, dev_type: DeviceType) -> Result<()> {
        if let DeviceDetails::Vfio(devs) = device.device_details() {
            self.seen_bdfs = devs.iter().map(|d| d.bdf.clone()).collect();
        }
        if self.fail_add {
            return Err(DeviceError::Hotplug {
                device_id: device.device_id().to_string(),
                reason: "hypervisor rejected device".to_string(),
            });
        }
        self.added.push((device.device_id().to_string(), dev_type));
        Ok(())
    }

    fn hotplug_remove_device(&mut self, device: &dyn Device, dev_type: DeviceType) -> Result<()> {
        if self.fail_remove {
            return Err(DeviceError::Hotplug {
                device_id: device.device_id().to_string(),
                reason: "guest did not release device".to_string(),
            });
        }
        self.removed.push((device.device_id().to_string(), dev_type));
        Ok(())
    }
}
