use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Placeholder reported when the host name does not resolve to an address.
pub const UNAVAILABLE: &str = "Unavailable";

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemIdentity {
    pub os_name: String,
    pub host_name: String,
    pub os_release: String,
    pub os_version: String,
    pub machine_arch: String,
    pub processor_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuSnapshot {
    pub physical_core_count: Option<usize>,
    pub logical_core_count: usize,
    pub per_core_usage_percent: Vec<f64>,
    pub total_usage_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub usage_percent: f64,
}

impl MemorySnapshot {
    /// Builds a snapshot from raw counters, clamping `available` and `used`
    /// to `total`.
    pub fn from_counters(total_bytes: u64, available_bytes: u64, used_bytes: u64) -> Self {
        let available_bytes = available_bytes.min(total_bytes);
        let used_bytes = used_bytes.min(total_bytes);
        Self {
            total_bytes,
            available_bytes,
            used_bytes,
            usage_percent: percent(total_bytes - available_bytes, total_bytes),
        }
    }

    pub fn total_gb(&self) -> f64 {
        bytes_to_gb(self.total_bytes)
    }

    pub fn available_gb(&self) -> f64 {
        bytes_to_gb(self.available_bytes)
    }

    pub fn used_gb(&self) -> f64 {
        bytes_to_gb(self.used_bytes)
    }
}

impl Serialize for MemorySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MemorySnapshot", 7)?;
        s.serialize_field("total_bytes", &self.total_bytes)?;
        s.serialize_field("available_bytes", &self.available_bytes)?;
        s.serialize_field("used_bytes", &self.used_bytes)?;
        s.serialize_field("total_gb", &self.total_gb())?;
        s.serialize_field("available_gb", &self.available_gb())?;
        s.serialize_field("used_gb", &self.used_gb())?;
        s.serialize_field("usage_percent", &self.usage_percent)?;
        s.end()
    }
}

/// Usage of one mounted partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

impl UsageStats {
    pub fn from_space(total_bytes: u64, free_bytes: u64) -> Self {
        let free_bytes = free_bytes.min(total_bytes);
        let used_bytes = total_bytes - free_bytes;
        Self {
            total_bytes,
            used_bytes,
            free_bytes,
            usage_percent: percent(used_bytes, used_bytes + free_bytes),
        }
    }
}

impl Serialize for UsageStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("UsageStats", 7)?;
        s.serialize_field("total_bytes", &self.total_bytes)?;
        s.serialize_field("used_bytes", &self.used_bytes)?;
        s.serialize_field("free_bytes", &self.free_bytes)?;
        s.serialize_field("total_gb", &bytes_to_gb(self.total_bytes))?;
        s.serialize_field("used_gb", &bytes_to_gb(self.used_bytes))?;
        s.serialize_field("free_gb", &bytes_to_gb(self.free_bytes))?;
        s.serialize_field("usage_percent", &self.usage_percent)?;
        s.end()
    }
}

/// Device to usage mapping, kept in enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskSnapshot {
    entries: Vec<(String, UsageStats)>,
}

impl DiskSnapshot {
    /// A device seen twice keeps its first position and takes the new value.
    pub fn insert(&mut self, device: String, usage: UsageStats) {
        if let Some(slot) = self.entries.iter_mut().find(|(d, _)| *d == device) {
            slot.1 = usage;
        } else {
            self.entries.push((device, usage));
        }
    }

    #[cfg(test)]
    pub fn get(&self, device: &str) -> Option<&UsageStats> {
        self.entries
            .iter()
            .find(|(d, _)| d == device)
            .map(|(_, usage)| usage)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UsageStats)> {
        self.entries.iter().map(|(d, usage)| (d.as_str(), usage))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for DiskSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (device, usage) in &self.entries {
            map.serialize_entry(device, usage)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSnapshot {
    pub host_name: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullSnapshot {
    pub system: SystemIdentity,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub disk: DiskSnapshot,
    pub network: NetworkSnapshot,
}

/// The reduced reading redrawn by the live monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveReading {
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GB, 2)
}

/// `part / whole` as a percentage with one decimal; 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to((part as f64 / whole as f64) * 100.0, 1).clamp(0.0, 100.0)
}

pub fn clamp_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    round_to(value, 1).clamp(0.0, 100.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1 << 30;

    #[test]
    fn memory_clamps_available_to_total() {
        let mem = MemorySnapshot::from_counters(8 * GB, 9 * GB, 10 * GB);
        assert_eq!(mem.available_bytes, mem.total_bytes);
        assert_eq!(mem.used_bytes, mem.total_bytes);
        assert_eq!(mem.usage_percent, 0.0);
    }

    #[test]
    fn memory_gb_values_round_to_two_decimals() {
        let mem = MemorySnapshot::from_counters(16 * GB, GB + GB / 3, 10 * GB);
        assert_eq!(mem.total_gb(), 16.0);
        assert_eq!(mem.available_gb(), 1.33);
        assert_eq!(mem.usage_percent, 91.7);
    }

    #[test]
    fn zero_memory_total_reports_zero_percent() {
        let mem = MemorySnapshot::from_counters(0, 0, 0);
        assert_eq!(mem.usage_percent, 0.0);
    }

    #[test]
    fn usage_stats_parts_add_up() {
        let usage = UsageStats::from_space(100 * GB, 25 * GB);
        assert_eq!(usage.used_bytes + usage.free_bytes, usage.total_bytes);
        assert_eq!(usage.usage_percent, 75.0);

        let overfull = UsageStats::from_space(GB, 2 * GB);
        assert_eq!(overfull.free_bytes, GB);
        assert_eq!(overfull.used_bytes, 0);
    }

    #[test]
    fn disk_snapshot_keeps_first_position_for_duplicates() {
        let mut disk = DiskSnapshot::default();
        disk.insert("/dev/sda1".into(), UsageStats::from_space(10, 5));
        disk.insert("/dev/sdb1".into(), UsageStats::from_space(10, 5));
        disk.insert("/dev/sda1".into(), UsageStats::from_space(20, 5));

        let devices: Vec<&str> = disk.iter().map(|(d, _)| d).collect();
        assert_eq!(devices, vec!["/dev/sda1", "/dev/sdb1"]);
        assert_eq!(disk.get("/dev/sda1").unwrap().total_bytes, 20);
    }

    #[test]
    fn disk_serializes_as_ordered_object() {
        let mut disk = DiskSnapshot::default();
        disk.insert("zeta".into(), UsageStats::from_space(GB, GB / 2));
        disk.insert("alpha".into(), UsageStats::from_space(GB, GB / 2));
        let text = serde_json::to_string(&disk).unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        assert!(zeta < alpha);
        assert!(text.contains("\"free_gb\":0.5"));
    }

    #[test]
    fn clamp_percent_handles_nan_and_overflow() {
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(100.04), 100.0);
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(12.345), 12.3);
    }
}
