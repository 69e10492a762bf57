// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! Drives [`NetworkBackend`] over a real TCP loopback connection against a
//! hand-rolled v0 IIOD server, exercising the exact path spec.md §8
//! scenario 1 describes: `create_context(None, "ip:...")` opens a TCP
//! connection, the VERSION exchange completes, and the context's device
//! graph matches what the server's `PRINT` reply describes.

use libiio_backend_remote::NetworkBackend;
use libiio_common::IioError;
use libiio_core::backend::{AttrRef, Backend, ContextParams};
use libiio_core::{AttrCategory, AttributeData, ChannelData, ChannelDirection, ChannelModifier, ChannelType, DataFormat, DeviceData, DeviceKind};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

fn sample_devices() -> Vec<DeviceData> {
    vec![DeviceData {
        id: "iio:device0".into(),
        name: Some("accel3d".into()),
        label: None,
        kind: DeviceKind::Device,
        device_attrs: vec![AttributeData::new("sampling_frequency", AttrCategory::Device)],
        debug_attrs: vec![],
        buffer_attrs: vec![],
        channels: vec![ChannelData {
            id: "voltage0".into(),
            name: None,
            direction: ChannelDirection::Input,
            scan_element: true,
            index: Some(0),
            channel_type: ChannelType::Voltage,
            modifier: ChannelModifier::None,
            format: DataFormat {
                is_signed: true,
                is_fully_defined: true,
                is_be: false,
                bits: 16,
                length: 16,
                repeat: 1,
                shift: 0,
            },
            attrs: vec![AttributeData::new("raw", AttrCategory::Channel)],
        }],
    }]
}

/// A minimal single-shot v0 IIOD server: VERSION, then PRINT, then one
/// READ, then it closes. Good enough to exercise the client handshake and
/// attribute path without reimplementing the whole daemon.
fn spawn_fake_iiod(xml: String) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), "VERSION");
        writer.write_all(b"0 25 abc1234\n").unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), "PRINT");
        writer.write_all(format!("{}\n", xml.len()).as_bytes()).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), "READ iio:device0 sampling_frequency");
        let value = b"1000\n";
        writer.write_all(format!("{}\n", value.len()).as_bytes()).unwrap();
        writer.write_all(value).unwrap();
    });
    port
}

#[test]
fn opens_a_tcp_context_negotiates_v0_and_reads_an_attribute() {
    let xml = libiio_xml::to_xml(&sample_devices(), "fake iiod").unwrap();
    let port = spawn_fake_iiod(xml);

    let backend = libiio_backend_remote::network_backend();
    let params = ContextParams::new(format!("ip:127.0.0.1:{port}"));
    let result = backend.open_context(&params).unwrap();

    assert_eq!(result.description, "fake iiod");
    assert_eq!(result.devices.len(), 1);
    assert_eq!(result.devices[0].id, "iio:device0");
    assert_eq!(result.attrs.iter().find(|(k, _)| k == "version-major").map(|(_, v)| v.as_str()), Some("0"));

    let attr = AttrRef {
        device_id: "iio:device0".into(),
        channel_id: None,
        filename: "sampling_frequency".into(),
        category: AttrCategory::Device,
    };
    assert_eq!(backend.read_attr(&attr).unwrap(), "1000");
}

#[test]
fn rejects_a_bare_ip_scheme_with_no_host() {
    let backend: NetworkBackend = libiio_backend_remote::network_backend();
    let err = backend.open_context(&ContextParams::new("ip:")).unwrap_err();
    assert!(matches!(err, IioError::BadArgument(_)));
}
