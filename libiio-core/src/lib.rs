// Copyright 2021-Present iio-rs Contributors
// SPDX-License-Identifier: Apache-2.0

//! The IIO context object model, backend trait/registry, and
//! buffer/block/stream/event engine (spec.md §3, §4.3-§4.4, §4.7-§4.10).
//!
//! This crate is backend-agnostic: it defines the [`backend::Backend`]
//! trait every concrete transport binds into (`libiio-backend-local`,
//! `libiio-backend-remote`), and builds the rest of the public API —
//! object graph, buffers, streams, events, scanning — on top of it.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod event;
pub mod mask;
pub mod model;
pub mod refs;
pub mod scan;
pub mod stream;

pub use backend::{Backend, BackendRegistry, ContextParams, UriScheme};
pub use buffer::{Block, BlockState, Buffer};
pub use context::Context;
pub use event::{Event, EventStream, EventType, RawEvent};
pub use mask::{compute_sample_layout, ChannelsMask, SampleLayout};
pub use model::{
    AttrCategory, AttributeData, ChannelData, ChannelDirection, ChannelModifier, ChannelType, DataFormat,
    DeviceData, DeviceKind,
};
pub use refs::{AttrRef, ChannelRef, DeviceRef};
pub use scan::{ScanAggregator, ScanBackend, ScanFilter};
pub use stream::Stream;
