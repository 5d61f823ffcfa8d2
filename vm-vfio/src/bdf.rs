//! PCI BDF 地址解析

use crate::{DeviceError, Result};

/// 从 sysfs 目录项名解析 BDF
///
/// 输入格式为 `[<domain>]:[<bus>][<slot>].[<func>]`，例如 `0000:02:10.0`，
/// 返回去掉 domain 之后的部分（`02:10.0`）。字段宽度不做假设。
pub fn parse_bdf(device_sys_str: &str) -> Result<String> {
    if device_sys_str.split(':').count() != 3 {
        return Err(DeviceError::MalformedBdf(device_sys_str.to_string()));
    }

    match device_sys_str.split_once(':') {
        Some((_, bdf)) => Ok(bdf.to_string()),
        None => Err(DeviceError::MalformedBdf(device_sys_str.to_string())),
    }
}
