// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

use libiio_protocol::codec::{v0, v1, Command, IiodCodec, Protocol};
use libiio_protocol::transport::loopback::LoopbackTransport;
use libiio_protocol::transport::Transport;

#[test]
fn version_handshake_selects_v1_for_major_one() {
    let (mut server, mut client) = LoopbackTransport::pair();
    let handle = std::thread::spawn(move || {
        let line = v0::read_line(&mut server, None).unwrap();
        assert_eq!(line, b"VERSION");
        server.write_all(b"1 2 abc1234\n", None).unwrap();
    });

    let codec = IiodCodec::new(Protocol::V0);
    let info = codec.version(&mut client, None).unwrap();
    handle.join().unwrap();

    assert_eq!(info.major, 1);
    assert_eq!(info.minor, 2);
    assert_eq!(info.tag, "abc1234");
    assert_eq!(Protocol::negotiate(info.major), Protocol::V1);
}

#[test]
fn open_then_close_round_trip_over_v0() {
    let (mut server, mut client) = LoopbackTransport::pair();
    let handle = std::thread::spawn(move || {
        let line = v0::read_line(&mut server, None).unwrap();
        assert_eq!(line, b"OPEN dev0 1f 4096 0");
        server.write_all(b"0\n", None).unwrap();

        let line = v0::read_line(&mut server, None).unwrap();
        assert_eq!(line, b"CLOSE dev0");
        server.write_all(b"0\n", None).unwrap();
    });

    let codec = IiodCodec::new(Protocol::V0);
    let open = Command::Open {
        dev: "dev0".into(),
        mask: "1f".into(),
        samples_count: 4096,
        cyclic: false,
    };
    codec.request(&mut client, &open, 0, &[], None).unwrap();
    let close = Command::Close { dev: "dev0".into() };
    codec.request(&mut client, &close, 0, &[], None).unwrap();
    handle.join().unwrap();
}

#[test]
fn v1_frames_are_distinguished_by_client_id() {
    let header = v1::FrameHeader {
        opcode: v1::Opcode::Read as u8,
        dev_index: 2,
        client_id: 7,
        payload_len: 3,
        code: 0,
    };
    let bytes = header.to_bytes();
    let decoded = v1::FrameHeader::from_bytes(&bytes);
    assert_eq!(decoded.client_id, 7);
    assert_eq!(decoded.dev_index, 2);
}
