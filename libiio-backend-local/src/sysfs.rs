// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! sysfs directory walking and attribute file I/O (spec.md §4.5): builds
//! the `libiio-core` object graph from `/sys/bus/iio/devices` (or, in
//! tests, a scratch directory shaped the same way) and services
//! `read_attr`/`write_attr` against the cached sysfs pathnames.

use libiio_common::IioError;
use libiio_core::{
    AttrCategory, AttributeData, ChannelData, ChannelDirection, ChannelModifier, ChannelType, DataFormat,
    DeviceData, DeviceKind,
};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Caps a single attribute read, matching the teacher-grounded kernel
/// convention that a sysfs attribute file never holds more than one page
/// (spec.md §4.5: "read ≤16 KiB").
const MAX_ATTR_SIZE: usize = 16 * 1024;

const SKIP_ENTRIES: &[&str] = &[
    "name", "label", "uevent", "power", "subsystem", "of_node", "scan_elements", "buffer", "events",
    "trigger", "current_trigger",
];

const CHANNEL_TYPES: &[(&str, ChannelType)] = &[
    ("voltage", ChannelType::Voltage),
    ("current", ChannelType::Current),
    ("power", ChannelType::Power),
    ("temp", ChannelType::Temp),
    ("accel", ChannelType::Accel),
    ("anglvel", ChannelType::AnglVel),
    ("magn", ChannelType::Magn),
    ("illuminance", ChannelType::Light),
    ("proximity", ChannelType::Proximity),
];

fn modifier_from_token(token: &str) -> Option<ChannelModifier> {
    match token {
        "x" => Some(ChannelModifier::X),
        "y" => Some(ChannelModifier::Y),
        "z" => Some(ChannelModifier::Z),
        "root" => Some(ChannelModifier::Root),
        _ => None,
    }
}

/// Where to find a device's sysfs tree. Parameterized (rather than hardcoded
/// to `/sys/...`) so tests can point it at a `tempfile` scratch directory
/// shaped the same way.
pub struct SysfsRoot {
    devices_root: PathBuf,
    debug_root: Option<PathBuf>,
}

impl SysfsRoot {
    pub fn new(devices_root: impl Into<PathBuf>) -> Self {
        SysfsRoot { devices_root: devices_root.into(), debug_root: None }
    }

    /// The kernel default locations (spec.md §4.5).
    pub fn system_default() -> Self {
        SysfsRoot::new("/sys/bus/iio/devices").with_debug_root("/sys/kernel/debug/iio")
    }

    pub fn with_debug_root(mut self, debug_root: impl Into<PathBuf>) -> Self {
        self.debug_root = Some(debug_root.into());
        self
    }

    pub fn device_dir(&self, device_id: &str) -> PathBuf {
        self.devices_root.join(device_id)
    }

    fn debug_dir(&self, device_id: &str) -> Option<PathBuf> {
        self.debug_root.as_ref().map(|root| root.join(device_id))
    }

    /// Walks every `iio:deviceN` / `triggerN` / `hwmonN` entry under the
    /// devices root and builds its `DeviceData` (spec.md §3: built once,
    /// immutable thereafter).
    pub fn scan_devices(&self) -> Result<Vec<DeviceData>, IioError> {
        let mut devices = Vec::new();
        let entries = match fs::read_dir(&self.devices_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(devices),
            Err(e) => return Err(IioError::Io(e)),
        };
        for entry in entries {
            let entry = entry.map_err(IioError::Io)?;
            if !entry.file_type().map_err(IioError::Io)?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            devices.push(self.scan_one_device(&entry.path(), id)?);
        }
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    fn scan_one_device(&self, dir: &Path, id: String) -> Result<DeviceData, IioError> {
        let name = read_optional_string(&dir.join("name"))?;
        let label = read_optional_string(&dir.join("label"))?;
        let kind = DeviceKind::from_id(&id);

        let mut device_attrs = Vec::new();
        let mut channel_files: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir).map_err(IioError::Io)? {
            let entry = entry.map_err(IioError::Io)?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if SKIP_ENTRIES.contains(&file_name.as_str()) {
                continue;
            }
            if entry.file_type().map_err(IioError::Io)?.is_dir() {
                continue;
            }
            if file_name.starts_with("in_") || file_name.starts_with("out_") {
                channel_files.push(file_name);
            } else {
                device_attrs.push(AttributeData::new(file_name, AttrCategory::Device));
            }
        }

        let scan_elements_dir = dir.join("scan_elements");
        let channels = build_channels(&channel_files, &scan_elements_dir)?;

        let buffer_attrs = read_attr_names(&dir.join("buffer"), AttrCategory::Buffer)?;
        let debug_attrs = match self.debug_dir(&id) {
            Some(debug_dir) => read_attr_names(&debug_dir, AttrCategory::Debug)?,
            None => Vec::new(),
        };

        libiio_core::model::sort_attributes(&mut device_attrs);
        Ok(DeviceData { id, name, label, kind, device_attrs, debug_attrs, buffer_attrs, channels })
    }
}

/// A channel-attribute filename's decomposition: `in_voltage0_raw` ->
/// direction=in, type=voltage, index=Some(0), modifier=None, attr=raw.
/// `in_accel_x_raw` -> modifier=X, index=None, attr=raw. Channels with no
/// recognizable type prefix are skipped (best-effort, as spec.md §9 allows
/// for the teacher's forward-compatible-parsing stance).
struct ParsedChannelAttr {
    direction: ChannelDirection,
    channel_type: ChannelType,
    index: Option<u32>,
    modifier: ChannelModifier,
    attr_name: String,
}

fn parse_channel_attr(filename: &str) -> Option<ParsedChannelAttr> {
    let (direction, rest) = if let Some(r) = filename.strip_prefix("in_") {
        (ChannelDirection::Input, r)
    } else {
        (ChannelDirection::Output, filename.strip_prefix("out_")?)
    };

    let (type_str, channel_type) =
        CHANNEL_TYPES.iter().find(|(prefix, _)| rest.starts_with(prefix)).map(|(p, t)| (*p, *t))?;
    let mut remainder = &rest[type_str.len()..];

    let mut index = None;
    let digit_len = remainder.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_len > 0 {
        index = remainder[..digit_len].parse().ok();
        remainder = &remainder[digit_len..];
    }

    let remainder = remainder.strip_prefix('_')?;
    let mut modifier = ChannelModifier::None;
    let mut attr_name = remainder;
    if let Some((first, rest_after)) = remainder.split_once('_') {
        if let Some(m) = modifier_from_token(first) {
            modifier = m;
            attr_name = rest_after;
        }
    }
    if attr_name.is_empty() {
        return None;
    }

    Some(ParsedChannelAttr { direction, channel_type, index, modifier, attr_name: attr_name.to_string() })
}

fn build_channels(files: &[String], scan_elements_dir: &Path) -> Result<Vec<ChannelData>, IioError> {
    struct Building {
        direction: ChannelDirection,
        channel_type: ChannelType,
        modifier: ChannelModifier,
        index: Option<u32>,
        attrs: Vec<AttributeData>,
    }

    // Small per-device channel counts (single digits to low tens) make a
    // linear scan-and-merge cheaper than pulling in a `Hash`/`Ord` bound on
    // the model's channel-shape types just for this grouping.
    let mut channels: Vec<Building> = Vec::new();

    for filename in files {
        let Some(parsed) = parse_channel_attr(filename) else { continue };
        let existing = channels.iter_mut().find(|b| {
            b.channel_type == parsed.channel_type
                && b.modifier == parsed.modifier
                && b.index == parsed.index
                && b.direction == parsed.direction
        });
        let building = match existing {
            Some(b) => b,
            None => {
                channels.push(Building {
                    direction: parsed.direction,
                    channel_type: parsed.channel_type,
                    modifier: parsed.modifier,
                    index: parsed.index,
                    attrs: Vec::new(),
                });
                channels.last_mut().unwrap()
            }
        };
        building.attrs.push(AttributeData::new(parsed.attr_name, AttrCategory::Channel).with_filename(filename));
    }

    let mut out = Vec::with_capacity(channels.len());
    for mut building in channels {
        libiio_core::model::sort_attributes(&mut building.attrs);
        let id = channel_sysfs_id(building.direction, building.channel_type, building.modifier, building.index);
        let (scan_element, scan_index, format) = read_scan_element(&scan_elements_dir, &id);
        out.push(ChannelData {
            id,
            name: None,
            direction: building.direction,
            scan_element,
            index: scan_index.or(building.index),
            channel_type: building.channel_type,
            modifier: building.modifier,
            format,
            attrs: building.attrs,
        });
    }
    Ok(out)
}

fn channel_prefix(channel_type: ChannelType) -> &'static str {
    CHANNEL_TYPES.iter().find(|(_, t)| *t == channel_type).map(|(p, _)| *p).unwrap_or("other")
}

fn channel_sysfs_id(
    direction: ChannelDirection,
    channel_type: ChannelType,
    modifier: ChannelModifier,
    index: Option<u32>,
) -> String {
    let dir = match direction {
        ChannelDirection::Input => "in",
        ChannelDirection::Output => "out",
    };
    let type_str = channel_prefix(channel_type);
    let suffix = match (modifier, index) {
        (ChannelModifier::None, Some(i)) => format!("{type_str}{i}"),
        (ChannelModifier::None, None) => type_str.to_string(),
        (m, Some(i)) => format!("{type_str}{i}_{}", modifier_token(m)),
        (m, None) => format!("{type_str}_{}", modifier_token(m)),
    };
    format!("{dir}_{suffix}")
}

fn modifier_token(modifier: ChannelModifier) -> &'static str {
    match modifier {
        ChannelModifier::None => "",
        ChannelModifier::X => "x",
        ChannelModifier::Y => "y",
        ChannelModifier::Z => "z",
        ChannelModifier::Root => "root",
    }
}

/// Reads `scan_elements/<id>_en`, `_index`, `_type` for a channel, if they
/// exist. A channel with no scan_elements entries simply isn't a scan
/// element (spec.md §3: `index = None` for such channels).
fn read_scan_element(dir: &Path, channel_id: &str) -> (bool, Option<u32>, DataFormat) {
    let default_format =
        DataFormat { is_signed: false, is_fully_defined: false, is_be: false, bits: 0, length: 0, repeat: 1, shift: 0 };

    let en_path = dir.join(format!("{channel_id}_en"));
    if !en_path.exists() {
        return (false, None, default_format);
    }
    let scan_element = read_optional_string(&en_path).ok().flatten().map(|s| s.trim() == "1").unwrap_or(false);
    let index = read_optional_string(&dir.join(format!("{channel_id}_index")))
        .ok()
        .flatten()
        .and_then(|s| s.trim().parse().ok());
    let format = read_optional_string(&dir.join(format!("{channel_id}_type")))
        .ok()
        .flatten()
        .and_then(|s| parse_type_string(s.trim()))
        .unwrap_or(default_format);
    (scan_element, index, format)
}

/// Parses the kernel's scan_elements `_type` file format, e.g.
/// `le:s16/16>>0` (endianness:signedness+bits/storage-bits>>shift).
fn parse_type_string(s: &str) -> Option<DataFormat> {
    let (endian, rest) = s.split_once(':')?;
    let is_be = endian == "be";
    let (sign_bits, rest) = rest.split_once('/')?;
    let is_signed = sign_bits.starts_with('s');
    let bits: u32 = sign_bits[1..].parse().ok()?;
    let (length_str, shift_str) = rest.split_once(">>")?;
    let length: u32 = length_str.parse().ok()?;
    let shift: u32 = shift_str.parse().ok()?;
    Some(DataFormat { is_signed, is_fully_defined: true, is_be, bits, length, repeat: 1, shift })
}

fn read_attr_names(dir: &Path, category: AttrCategory) -> Result<Vec<AttributeData>, IioError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut attrs = Vec::new();
    for entry in fs::read_dir(dir).map_err(IioError::Io)? {
        let entry = entry.map_err(IioError::Io)?;
        if entry.file_type().map_err(IioError::Io)?.is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        attrs.push(AttributeData::new(file_name, category));
    }
    libiio_core::model::sort_attributes(&mut attrs);
    Ok(attrs)
}

fn read_optional_string(path: &Path) -> Result<Option<String>, IioError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s.trim_end_matches('\n').to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IioError::Io(e)),
    }
}

/// Attribute read: open, read at most [`MAX_ATTR_SIZE`], close (spec.md
/// §4.5).
pub fn read_attr_file(path: &Path) -> Result<String, IioError> {
    let mut file = fs::File::open(path).map_err(IioError::Io)?;
    let mut buf = vec![0u8; MAX_ATTR_SIZE];
    let mut total = 0;
    loop {
        let n = file.read(&mut buf[total..]).map_err(IioError::Io)?;
        if n == 0 {
            break;
        }
        total += n;
        if total == buf.len() {
            break;
        }
    }
    buf.truncate(total);
    let s = String::from_utf8_lossy(&buf).trim_end_matches('\n').to_string();
    Ok(s)
}

/// Attribute write: open, write, close (spec.md §4.5).
pub fn write_attr_file(path: &Path, value: &str) -> Result<(), IioError> {
    let mut file = fs::OpenOptions::new().write(true).open(path).map_err(IioError::Io)?;
    file.write_all(value.as_bytes()).map_err(IioError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libiio_common::test_utils::create_scratch_dir;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn scans_a_device_with_plain_and_channel_attrs() {
        let guard = create_scratch_dir("iio-sysfs").unwrap();
        let devices_root = guard.join("devices");
        let dev_dir = devices_root.join("iio:device0");
        fs::create_dir_all(&dev_dir).unwrap();
        write(&dev_dir, "name", "accel3d\n");
        write(&dev_dir, "sampling_frequency", "1000\n");
        write(&dev_dir, "in_voltage0_raw", "42\n");
        write(&dev_dir, "in_voltage0_scale", "0.001\n");
        write(&dev_dir, "in_accel_x_raw", "7\n");

        let scan_elements = dev_dir.join("scan_elements");
        fs::create_dir_all(&scan_elements).unwrap();
        write(&scan_elements, "in_voltage0_en", "1\n");
        write(&scan_elements, "in_voltage0_index", "0\n");
        write(&scan_elements, "in_voltage0_type", "le:s16/16>>0\n");

        let root = SysfsRoot::new(&devices_root);
        let devices = root.scan_devices().unwrap();
        assert_eq!(devices.len(), 1);
        let dev = &devices[0];
        assert_eq!(dev.id, "iio:device0");
        assert_eq!(dev.name.as_deref(), Some("accel3d"));
        assert_eq!(dev.device_attrs.len(), 1);
        assert_eq!(dev.device_attrs[0].name, "sampling_frequency");

        assert_eq!(dev.channels.len(), 2);
        let voltage = dev.channels.iter().find(|c| c.id == "in_voltage0").unwrap();
        assert!(voltage.scan_element);
        assert_eq!(voltage.index, Some(0));
        assert_eq!(voltage.format.bits, 16);
        assert_eq!(voltage.attrs.len(), 2);

        let accel = dev.channels.iter().find(|c| c.id == "in_accel_x").unwrap();
        assert!(!accel.scan_element);
        assert_eq!(accel.modifier, ChannelModifier::X);
    }

    #[test]
    fn read_attr_file_reads_and_trims_contents() {
        let guard = create_scratch_dir("iio-attr").unwrap();
        let path = guard.join("sampling_frequency");
        fs::write(&path, "1000\n").unwrap();
        assert_eq!(read_attr_file(&path).unwrap(), "1000");
    }

    #[test]
    fn missing_devices_root_yields_empty_list_not_an_error() {
        let root = SysfsRoot::new("/nonexistent/iio/root/for/tests");
        assert_eq!(root.scan_devices().unwrap().len(), 0);
    }
}
