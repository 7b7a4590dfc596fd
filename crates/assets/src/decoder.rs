//! Compressed-geometry decoding, delegated to an external decoder.
//!
//! The loader describes each compressed primitive with a [`DecodeRequest`] and hands the
//! raw bytes to a [`GeometryDecoder`]. Native Draco support lives behind the `draco`
//! cargo feature; without it the viewer reports compressed primitives as undecodable.

use glam::Vec3;
use modelview_common::config::DEFAULT_DECODER_LOCATION;
use std::sync::Arc;

/// Decoder setup, passed to the loader at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Where the decoder resources live.
    pub location: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            location: DEFAULT_DECODER_LOCATION.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("no geometry decoder available (configured location: {location})")]
    Unavailable { location: String },
    #[error("decoder failed: {0}")]
    Backend(String),
    #[error("decoded stream malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSemantic {
    Position,
    Normal,
    TexCoord(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn size_in_bytes(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

/// One attribute in the decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    pub semantic: AttributeSemantic,
    pub components: u32,
    pub component_type: ComponentType,
}

/// Shape of a compressed primitive. Attributes are ordered by their compressed
/// attribute id, which is also their order in the decoded stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub vertex_count: u32,
    pub index_count: u32,
    pub attributes: Vec<AttributeLayout>,
}

/// Uncompressed geometry of one primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

/// External collaborator decoding compressed mesh payloads.
pub trait GeometryDecoder: Send + Sync {
    fn decode(&self, compressed: &[u8], request: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError>;
}

/// Decoder used when no backend is compiled in. Every request fails.
#[derive(Debug, Clone)]
pub struct UnavailableDecoder {
    location: String,
}

impl UnavailableDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            location: config.location.clone(),
        }
    }
}

impl GeometryDecoder for UnavailableDecoder {
    fn decode(&self, _compressed: &[u8], _request: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
        Err(DecodeError::Unavailable {
            location: self.location.clone(),
        })
    }
}

/// The best decoder this build offers for `config`.
pub fn default_decoder(config: &DecoderConfig) -> Arc<dyn GeometryDecoder> {
    #[cfg(feature = "draco")]
    {
        tracing::debug!(location = %config.location, "using native draco decoder");
        Arc::new(draco::DracoDecoder::new(config))
    }
    #[cfg(not(feature = "draco"))]
    {
        tracing::debug!(location = %config.location, "no native decoder compiled in");
        Arc::new(UnavailableDecoder::new(config))
    }
}

struct Stream<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Stream<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.off + len;
        let slice = self.bytes.get(self.off..end).ok_or_else(|| {
            DecodeError::Malformed(format!("need {end} bytes, stream has {}", self.bytes.len()))
        })?;
        self.off = end;
        Ok(slice)
    }
}

/// Split a decoded byte stream into indices followed by each attribute in order.
///
/// Indices are little-endian `u16` when `index_count` fits in 16 bits, `u32`
/// otherwise. Only float positions and normals are kept.
pub fn parse_decoded_stream(bytes: &[u8], request: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
    let mut stream = Stream { bytes, off: 0 };

    let index_count = request.index_count as usize;
    let mut indices = Vec::with_capacity(index_count);
    if request.index_count <= u16::MAX as u32 {
        for c in stream.take(index_count * 2)?.chunks_exact(2) {
            indices.push(u16::from_le_bytes([c[0], c[1]]) as u32);
        }
    } else {
        for c in stream.take(index_count * 4)?.chunks_exact(4) {
            indices.push(u32::from_le_bytes([c[0], c[1], c[2], c[3]]));
        }
    }

    let vertex_count = request.vertex_count as usize;
    let mut positions = None;
    let mut normals = None;
    for attr in &request.attributes {
        let dim = attr.components as usize;
        let slice = stream.take(dim * vertex_count * attr.component_type.size_in_bytes())?;
        if attr.component_type != ComponentType::F32 || dim < 2 {
            continue;
        }
        let read = |fallback_z: f32| -> Vec<Vec3> {
            slice
                .chunks_exact(4 * dim)
                .map(|c| {
                    let f = |i: usize| f32::from_le_bytes([c[i], c[i + 1], c[i + 2], c[i + 3]]);
                    Vec3::new(f(0), f(4), if dim > 2 { f(8) } else { fallback_z })
                })
                .collect()
        };
        match attr.semantic {
            AttributeSemantic::Position => positions = Some(read(0.0)),
            AttributeSemantic::Normal => normals = Some(read(1.0)),
            AttributeSemantic::TexCoord(_) => {}
        }
    }

    let positions = positions.ok_or_else(|| DecodeError::Malformed("no float POSITION attribute".into()))?;
    if let Some(max) = indices.iter().max() {
        if *max as usize >= positions.len() {
            return Err(DecodeError::Malformed(format!(
                "index {max} out of range for {} vertices",
                positions.len()
            )));
        }
    }
    Ok(DecodedPrimitive {
        normals: normals.unwrap_or_default(),
        positions,
        indices,
    })
}

#[cfg(feature = "draco")]
mod draco {
    use super::{
        ComponentType, DecodeError, DecodeRequest, DecodedPrimitive, DecoderConfig, GeometryDecoder,
        parse_decoded_stream,
    };
    use anyhow::Context;
    use draco_decoder::{AttributeDataType, MeshDecodeConfig, decode_mesh};

    /// Draco decoding through the native library.
    pub struct DracoDecoder {
        location: String,
    }

    impl DracoDecoder {
        pub fn new(config: &DecoderConfig) -> Self {
            Self {
                location: config.location.clone(),
            }
        }
    }

    impl GeometryDecoder for DracoDecoder {
        fn decode(&self, compressed: &[u8], request: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
            let mut cfg = MeshDecodeConfig::new(request.vertex_count, request.index_count);
            for attr in &request.attributes {
                let ty = match attr.component_type {
                    ComponentType::F32 => AttributeDataType::Float32,
                    ComponentType::U32 => AttributeDataType::UInt32,
                    ComponentType::U16 => AttributeDataType::UInt16,
                    ComponentType::I16 => AttributeDataType::Int16,
                    ComponentType::U8 => AttributeDataType::UInt8,
                    ComponentType::I8 => AttributeDataType::Int8,
                };
                cfg.add_attribute(attr.components, ty);
            }
            let decoded = pollster::block_on(decode_mesh(compressed, &cfg))
                .context("draco native decode failed")
                .map_err(|e| DecodeError::Backend(format!("{e:#} (decoder: {})", self.location)))?;
            parse_decoded_stream(&decoded, request)
        }
    }
}
