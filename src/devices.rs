//! Enumeration of the compute devices visible to this process.
//!
//! GPUs come from the adapters `wgpu` exposes on its primary backends
//! (Vulkan, Metal, DX12). Only discrete and integrated GPUs count: software
//! rasterizers and virtual display adapters are skipped. The host CPU comes
//! from `sysinfo`.

use std::collections::HashSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "CPU"),
            DeviceKind::Gpu => write!(f, "GPU"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDevice {
    pub name: String,
    pub kind: DeviceKind,
    /// Adapter name or CPU brand, when the platform reports one
    pub model: Option<String>,
    /// PCI vendor id, e.g. `0x10de`
    pub vendor: Option<u32>,
}

impl PhysicalDevice {
    fn new(kind: DeviceKind, index: usize, model: Option<String>, vendor: Option<u32>) -> Self {
        PhysicalDevice {
            name: format!("/physical_device:{}:{}", kind, index),
            kind,
            model,
            vendor,
        }
    }

    pub fn vendor_name(&self) -> Option<&'static str> {
        match self.vendor? {
            0x10de => Some("NVIDIA"),
            0x1002 => Some("AMD"),
            0x8086 => Some("Intel"),
            0x106b => Some("Apple"),
            _ => None,
        }
    }
}

impl fmt::Display for PhysicalDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PhysicalDevice(name='{}', device_type='{}'",
            self.name, self.kind
        )?;
        if let Some(vendor) = self.vendor_name() {
            write!(f, ", vendor='{}'", vendor)?;
        }
        write!(f, ")")
    }
}

/// What the device listing needs to know about one graphics adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub device_type: wgpu::DeviceType,
}

impl From<wgpu::AdapterInfo> for AdapterSummary {
    fn from(info: wgpu::AdapterInfo) -> Self {
        AdapterSummary {
            name: info.name,
            vendor: info.vendor,
            device: info.device,
            device_type: info.device_type,
        }
    }
}

pub fn list_physical_devices(kind: DeviceKind) -> Vec<PhysicalDevice> {
    match kind {
        DeviceKind::Cpu => cpu_devices(enumerate_cpu_brands()),
        DeviceKind::Gpu => gpu_devices(enumerate_adapters()),
    }
}

fn enumerate_adapters() -> Vec<AdapterSummary> {
    let instance = wgpu::Instance::default();

    instance
        .enumerate_adapters(wgpu::Backends::PRIMARY)
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            debug!(name = %info.name, backend = ?info.backend, device_type = ?info.device_type, "adapter");
            AdapterSummary::from(info)
        })
        .collect()
}

fn enumerate_cpu_brands() -> Vec<String> {
    let system = sysinfo::System::new_with_specifics(
        sysinfo::RefreshKind::nothing().with_cpu(sysinfo::CpuRefreshKind::everything()),
    );

    system.cpus().iter().map(|cpu| cpu.brand().to_string()).collect()
}

/// Keep the hardware GPUs, one entry per physical device even when several
/// backends expose it, numbered in enumeration order
pub fn gpu_devices<I>(adapters: I) -> Vec<PhysicalDevice>
where
    I: IntoIterator<Item = AdapterSummary>,
{
    let mut seen = HashSet::new();

    adapters
        .into_iter()
        .filter(|adapter| {
            matches!(
                adapter.device_type,
                wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu
            )
        })
        .filter(|adapter| seen.insert((adapter.vendor, adapter.device, adapter.name.clone())))
        .enumerate()
        .map(|(idx, adapter)| {
            PhysicalDevice::new(DeviceKind::Gpu, idx, Some(adapter.name), Some(adapter.vendor))
        })
        .collect()
}

/// One device per distinct CPU brand. The host is always listed, even when
/// the platform reports no brand
pub fn cpu_devices<I>(brands: I) -> Vec<PhysicalDevice>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut devices: Vec<PhysicalDevice> = brands
        .into_iter()
        .filter(|brand| seen.insert(brand.clone()))
        .enumerate()
        .map(|(idx, brand)| {
            let model = Some(brand).filter(|b| !b.is_empty());
            PhysicalDevice::new(DeviceKind::Cpu, idx, model, None)
        })
        .collect();

    if devices.is_empty() {
        devices.push(PhysicalDevice::new(DeviceKind::Cpu, 0, None, None));
    }

    devices
}

/// Render a device list the way a sequence prints: `[a, b]`
pub fn format_devices(devices: &[PhysicalDevice]) -> String {
    let items: Vec<String> = devices.iter().map(ToString::to_string).collect();

    format!("[{}]", items.join(", "))
}
