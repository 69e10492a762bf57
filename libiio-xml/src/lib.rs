// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The context description XML document (spec.md §4.2 `PRINT`/`XML`, §6
//! `iio_genxml`): serializes a [`DeviceData`] graph to XML and parses it
//! back, for the read-only `xml:` backend and for round-tripping a
//! network/local context's description.
//!
//! The schema is the same one upstream `iio_genxml`/`PRINT` produce: a
//! `<context>` element wrapping one `<device>` per device, each with
//! `<channel>` children (themselves wrapping an optional `<scan-element>`
//! and any number of `<attribute>`), plus `<attribute>`,
//! `<debug-attribute>` and `<buffer-attribute>` children at the device
//! level.

use libiio_common::IioError;
use libiio_core::{
    AttrCategory, AttributeData, ChannelData, ChannelDirection, ChannelModifier, ChannelType, DataFormat,
    DeviceData, DeviceKind,
};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Cursor;

/// Serializes a device graph to a context XML document (spec.md §4.2
/// `XML`/`PRINT`, §6 `iio_genxml`).
pub fn to_xml(devices: &[DeviceData], description: &str) -> Result<String, IioError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_decl(&mut writer)?;

    let mut context = BytesStart::new("context");
    context.push_attribute(("name", "iio-rs"));
    context.push_attribute(("description", description));
    writer.write_event(Event::Start(context)).map_err(xml_err)?;

    for device in devices {
        write_device(&mut writer, device)?;
    }

    writer.write_event(Event::End(BytesEnd::new("context"))).map_err(xml_err)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| IioError::Protocol(format!("non-UTF8 generated XML: {e}")))
}

fn write_decl(writer: &mut Writer<Cursor<Vec<u8>>>) -> Result<(), IioError> {
    writer
        .write_event(Event::Decl(quick_xml::events::BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)
}

fn write_device(writer: &mut Writer<Cursor<Vec<u8>>>, device: &DeviceData) -> Result<(), IioError> {
    let mut start = BytesStart::new("device");
    start.push_attribute(("id", device.id.as_str()));
    if let Some(name) = &device.name {
        start.push_attribute(("name", name.as_str()));
    }
    if let Some(label) = &device.label {
        start.push_attribute(("label", label.as_str()));
    }
    writer.write_event(Event::Start(start)).map_err(xml_err)?;

    for channel in &device.channels {
        write_channel(writer, channel)?;
    }
    for attr in &device.device_attrs {
        write_attribute(writer, "attribute", attr)?;
    }
    for attr in &device.debug_attrs {
        write_attribute(writer, "debug-attribute", attr)?;
    }
    for attr in &device.buffer_attrs {
        write_attribute(writer, "buffer-attribute", attr)?;
    }

    writer.write_event(Event::End(BytesEnd::new("device"))).map_err(xml_err)
}

fn write_channel(writer: &mut Writer<Cursor<Vec<u8>>>, channel: &ChannelData) -> Result<(), IioError> {
    let mut start = BytesStart::new("channel");
    start.push_attribute(("id", channel.id.as_str()));
    start.push_attribute(("type", direction_str(channel.direction)));
    if let Some(name) = &channel.name {
        start.push_attribute(("name", name.as_str()));
    }
    start.push_attribute(("channel-type", channel_type_str(channel.channel_type)));
    if channel.modifier != ChannelModifier::None {
        start.push_attribute(("modifier", modifier_str(channel.modifier)));
    }
    writer.write_event(Event::Start(start)).map_err(xml_err)?;

    if channel.scan_element {
        let mut se = BytesStart::new("scan-element");
        let index = channel.index.map(|i| i.to_string()).unwrap_or_else(|| "-1".to_string());
        se.push_attribute(("index", index.as_str()));
        let format = format_string(&channel.format);
        se.push_attribute(("format", format.as_str()));
        writer.write_event(Event::Empty(se)).map_err(xml_err)?;
    }

    for attr in &channel.attrs {
        write_attribute(writer, "attribute", attr)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel"))).map_err(xml_err)
}

fn write_attribute(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, attr: &AttributeData) -> Result<(), IioError> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("name", attr.name.as_str()));
    if attr.filename != attr.name {
        start.push_attribute(("filename", attr.filename.as_str()));
    }
    writer.write_event(Event::Empty(start)).map_err(xml_err)
}

fn direction_str(direction: ChannelDirection) -> &'static str {
    match direction {
        ChannelDirection::Input => "input",
        ChannelDirection::Output => "output",
    }
}

fn direction_from_str(s: &str) -> ChannelDirection {
    if s == "output" {
        ChannelDirection::Output
    } else {
        ChannelDirection::Input
    }
}

const CHANNEL_TYPES: &[(&str, ChannelType)] = &[
    ("voltage", ChannelType::Voltage),
    ("current", ChannelType::Current),
    ("power", ChannelType::Power),
    ("temp", ChannelType::Temp),
    ("accel", ChannelType::Accel),
    ("anglvel", ChannelType::AnglVel),
    ("magn", ChannelType::Magn),
    ("light", ChannelType::Light),
    ("proximity", ChannelType::Proximity),
    ("other", ChannelType::Other),
];

fn channel_type_str(channel_type: ChannelType) -> &'static str {
    CHANNEL_TYPES.iter().find(|(_, t)| *t == channel_type).map(|(s, _)| *s).unwrap_or("other")
}

fn channel_type_from_str(s: &str) -> ChannelType {
    CHANNEL_TYPES.iter().find(|(name, _)| *name == s).map(|(_, t)| *t).unwrap_or(ChannelType::Other)
}

fn modifier_str(modifier: ChannelModifier) -> &'static str {
    match modifier {
        ChannelModifier::None => "none",
        ChannelModifier::X => "x",
        ChannelModifier::Y => "y",
        ChannelModifier::Z => "z",
        ChannelModifier::Root => "root",
    }
}

fn modifier_from_str(s: &str) -> ChannelModifier {
    match s {
        "x" => ChannelModifier::X,
        "y" => ChannelModifier::Y,
        "z" => ChannelModifier::Z,
        "root" => ChannelModifier::Root,
        _ => ChannelModifier::None,
    }
}

/// Renders a `DataFormat` the way the kernel's `scan_elements/*_type` files
/// and upstream's XML both do: `<endian>:<sign><bits>[X<repeat>]/<length>>><shift>`.
/// An undefined sign (`is_fully_defined == false`) is written as `?`.
fn format_string(format: &DataFormat) -> String {
    let endian = if format.is_be { "be" } else { "le" };
    let sign = if !format.is_fully_defined {
        "?"
    } else if format.is_signed {
        "s"
    } else {
        "u"
    };
    let repeat = if format.repeat > 1 { format!("X{}", format.repeat) } else { String::new() };
    format!("{endian}:{sign}{}{repeat}/{}>>{}", format.bits, format.length, format.shift)
}

fn parse_format_string(s: &str) -> Result<DataFormat, IioError> {
    let bad = || IioError::Protocol(format!("malformed scan-element format: {s:?}"));
    let (endian, rest) = s.split_once(':').ok_or_else(bad)?;
    let is_be = endian == "be";
    let (sign_bits, rest) = rest.split_once('/').ok_or_else(bad)?;
    let (is_signed, is_fully_defined, bits_start) = match sign_bits.chars().next() {
        Some('s') => (true, true, 1),
        Some('u') => (false, true, 1),
        Some('?') => (false, false, 1),
        _ => return Err(bad()),
    };
    let bits_repeat = &sign_bits[bits_start..];
    let (bits_str, repeat) = match bits_repeat.split_once('X') {
        Some((b, r)) => (b, r.parse().map_err(|_| bad())?),
        None => (bits_repeat, 1),
    };
    let bits: u32 = bits_str.parse().map_err(|_| bad())?;
    let (length_str, shift_str) = rest.split_once(">>").ok_or_else(bad)?;
    let length: u32 = length_str.parse().map_err(|_| bad())?;
    let shift: u32 = shift_str.parse().map_err(|_| bad())?;
    Ok(DataFormat { is_signed, is_fully_defined, is_be, bits, length, repeat, shift })
}

fn xml_err(e: quick_xml::Error) -> IioError {
    IioError::Protocol(format!("XML generation failed: {e}"))
}

/// Parses a context XML document back into a device graph (spec.md §8
/// testable property: "Context XML round-trip"). Returns the device graph
/// and the `description` attribute from the `<context>` element.
pub fn from_xml(xml: &str) -> Result<(Vec<DeviceData>, String), IioError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text = true;

    let mut devices = Vec::new();
    let mut description = String::new();
    let mut current_device: Option<DeviceData> = None;
    let mut current_channel: Option<ChannelData> = None;

    loop {
        match reader.read_event().map_err(read_err)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "context" => {
                        description = attr_value(&e, "description")?.unwrap_or_default();
                    }
                    "device" => {
                        let id = attr_value(&e, "id")?.ok_or_else(|| missing_attr("device", "id"))?;
                        current_device = Some(DeviceData {
                            kind: DeviceKind::from_id(&id),
                            id,
                            name: attr_value(&e, "name")?,
                            label: attr_value(&e, "label")?,
                            device_attrs: Vec::new(),
                            debug_attrs: Vec::new(),
                            buffer_attrs: Vec::new(),
                            channels: Vec::new(),
                        });
                    }
                    "channel" => {
                        let id = attr_value(&e, "id")?.ok_or_else(|| missing_attr("channel", "id"))?;
                        let direction = direction_from_str(&attr_value(&e, "type")?.unwrap_or_default());
                        let channel_type = channel_type_from_str(&attr_value(&e, "channel-type")?.unwrap_or_default());
                        let modifier = modifier_from_str(&attr_value(&e, "modifier")?.unwrap_or_default());
                        current_channel = Some(ChannelData {
                            id,
                            name: attr_value(&e, "name")?,
                            direction,
                            scan_element: false,
                            index: None,
                            channel_type,
                            modifier,
                            format: DataFormat {
                                is_signed: false,
                                is_fully_defined: false,
                                is_be: false,
                                bits: 0,
                                length: 0,
                                repeat: 1,
                                shift: 0,
                            },
                            attrs: Vec::new(),
                        });
                    }
                    "scan-element" => {
                        let channel = current_channel
                            .as_mut()
                            .ok_or_else(|| IioError::Protocol("scan-element outside channel".into()))?;
                        channel.scan_element = true;
                        let index = attr_value(&e, "index")?.unwrap_or_default();
                        channel.index = index.parse::<i64>().ok().filter(|v| *v >= 0).map(|v| v as u32);
                        if let Some(format) = attr_value(&e, "format")? {
                            channel.format = parse_format_string(&format)?;
                        }
                    }
                    "attribute" | "debug-attribute" | "buffer-attribute" => {
                        let attr_name = attr_value(&e, "name")?.ok_or_else(|| missing_attr(&name, "name"))?;
                        let mut attr = AttributeData::new(attr_name, AttrCategory::Device);
                        if let Some(filename) = attr_value(&e, "filename")? {
                            attr = attr.with_filename(filename);
                        }
                        if let Some(channel) = current_channel.as_mut() {
                            attr.category = AttrCategory::Channel;
                            channel.attrs.push(attr);
                        } else if let Some(device) = current_device.as_mut() {
                            match name.as_str() {
                                "debug-attribute" => {
                                    attr.category = AttrCategory::Debug;
                                    device.debug_attrs.push(attr);
                                }
                                "buffer-attribute" => {
                                    attr.category = AttrCategory::Buffer;
                                    device.buffer_attrs.push(attr);
                                }
                                _ => device.device_attrs.push(attr),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = local_name_bytes(e.name().as_ref());
                match name.as_str() {
                    "channel" => {
                        if let (Some(device), Some(channel)) = (current_device.as_mut(), current_channel.take()) {
                            device.channels.push(channel);
                        }
                    }
                    "device" => {
                        if let Some(device) = current_device.take() {
                            devices.push(device);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    libiio_core::model::sort_devices(&mut devices);
    for device in &mut devices {
        libiio_core::model::sort_attributes(&mut device.device_attrs);
        libiio_core::model::sort_attributes(&mut device.debug_attrs);
        libiio_core::model::sort_attributes(&mut device.buffer_attrs);
        libiio_core::model::sort_channels(&mut device.channels);
        for channel in &mut device.channels {
            libiio_core::model::sort_attributes(&mut channel.attrs);
        }
    }
    Ok((devices, description))
}

fn local_name(e: &BytesStart) -> String {
    local_name_bytes(e.name().as_ref())
}

fn local_name_bytes(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn attr_value(e: &BytesStart, key: &str) -> Result<Option<String>, IioError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| IioError::Protocol(format!("malformed XML attribute: {e}")))?;
        if attr.key.as_ref() == key.as_bytes() {
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let unescaped =
                unescape(&raw).map_err(|e| IioError::Protocol(format!("bad XML entity: {e}")))?.into_owned();
            return Ok(Some(unescaped));
        }
    }
    Ok(None)
}

fn missing_attr(element: &str, attr: &str) -> IioError {
    IioError::Protocol(format!("<{element}> missing required attribute {attr:?}"))
}

fn read_err(e: quick_xml::Error) -> IioError {
    IioError::Protocol(format!("XML parse error: {e}"))
}
