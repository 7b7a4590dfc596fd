//! glTF import: converts a glTF/GLB document into a [`SceneNode`] hierarchy.
//!
//! Node transforms are kept as-is. Each triangle primitive becomes a child node
//! carrying a [`Mesh`]. Primitives compressed with `KHR_draco_mesh_compression`
//! are handed to the configured [`GeometryDecoder`].

use crate::decoder::{
    AttributeLayout, AttributeSemantic, ComponentType, DecodeRequest, GeometryDecoder,
};
use crate::loader::LoadError;
use glam::{Quat, Vec3};
use gltf::accessor::{DataType, Dimensions};
use gltf::json::validation::{Error as ValidationError, Validate};
use gltf::mesh::{Mode, Semantic};
use modelview_common::Transform;
use modelview_scene::{Mesh, SceneNode};
use std::path::Path;
use std::sync::Arc;

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Import a glTF (JSON or binary) document held in memory.
///
/// `base` resolves relative buffer URIs; without it only embedded buffers load.
pub fn import_gltf(
    bytes: &[u8],
    base: Option<&Path>,
    decoder: &dyn GeometryDecoder,
) -> Result<SceneNode, LoadError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)?;
    validate(document.as_json())?;
    let buffers = gltf::import_buffers(&document, base, blob)?;

    let mut root = SceneNode::new(Transform::default());
    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        tracing::warn!("glTF document has no scenes");
        return Ok(root);
    };
    root.name = Some(scene.name().unwrap_or("scene").to_string());

    let importer = Importer {
        document: &document,
        buffers: &buffers,
        decoder,
    };
    for node in scene.nodes() {
        root.add_child(importer.node(&node)?);
    }
    Ok(root)
}

/// Full glTF validation, minus the two things Draco documents legitimately do:
/// list the extension as required, and leave its accessors without buffer views.
///
/// The importer walks indices unchecked, so a document must pass this first.
fn validate(json: &gltf::json::Root) -> Result<(), gltf::Error> {
    use gltf::json::Path;

    let mut allowed: Vec<(Path, ValidationError)> = json
        .extensions_required
        .iter()
        .enumerate()
        .filter(|(_, ext)| *ext == DRACO_EXTENSION)
        .map(|(i, ext)| {
            let path = Path::new().field("extensionsRequired").index(i).value_str(ext);
            (path, ValidationError::Unsupported)
        })
        .collect();
    let compressed = json
        .meshes
        .iter()
        .flat_map(|mesh| &mesh.primitives)
        .filter(|prim| {
            prim.extensions
                .as_ref()
                .is_some_and(|ext| ext.others.contains_key(DRACO_EXTENSION))
        });
    for prim in compressed {
        for accessor in prim.attributes.values().chain(&prim.indices) {
            let path = Path::new().field("accessors").index(accessor.value()).field("bufferView");
            allowed.push((path, ValidationError::Missing));
        }
    }

    let mut errors = Vec::new();
    json.validate(json, Path::new, &mut |path, err| {
        let path = path();
        if !allowed.iter().any(|(p, e)| *p == path && *e == err) {
            errors.push((path, err));
        }
    });
    if errors.is_empty() {
        Ok(())
    } else {
        Err(gltf::Error::Validation(errors))
    }
}

struct Importer<'a> {
    document: &'a gltf::Document,
    buffers: &'a [gltf::buffer::Data],
    decoder: &'a dyn GeometryDecoder,
}

impl Importer<'_> {
    fn node(&self, node: &gltf::Node<'_>) -> Result<SceneNode, LoadError> {
        let (t, r, s) = node.transform().decomposed();
        let mut out = SceneNode::new(Transform {
            position: Vec3::from(t),
            rotation: Quat::from_array(r),
            scale: Vec3::from(s),
        });
        out.name = node.name().map(str::to_string);

        if let Some(mesh) = node.mesh() {
            for prim in mesh.primitives() {
                if prim.mode() != Mode::Triangles {
                    tracing::debug!(mode = ?prim.mode(), "skipping non-triangle primitive");
                    continue;
                }
                if let Some(m) = self.primitive(&prim)? {
                    let mut child = SceneNode::with_mesh(Transform::default(), Arc::new(m));
                    child.name = mesh.name().map(str::to_string);
                    out.add_child(child);
                }
            }
        }
        for child in node.children() {
            out.add_child(self.node(&child)?);
        }
        Ok(out)
    }

    fn primitive(&self, prim: &gltf::Primitive<'_>) -> Result<Option<Mesh>, LoadError> {
        let material = prim.material();
        let base_color = material.pbr_metallic_roughness().base_color_factor();
        let double_sided = material.double_sided();

        if prim.extension_value(DRACO_EXTENSION).is_some() {
            let (positions, normals, indices) = self.draco_primitive(prim)?;
            if positions.is_empty() {
                tracing::debug!("skipping compressed primitive without vertices");
                return Ok(None);
            }
            return Ok(Some(
                Mesh::new(positions, normals, indices, base_color).with_double_sided(double_sided),
            ));
        }

        let reader = prim.reader(|b| self.buffers.get(b.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            return Ok(None);
        };
        let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
        if positions.is_empty() {
            tracing::debug!("skipping primitive without vertices");
            return Ok(None);
        }
        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|it| it.map(Vec3::from).collect())
            .unwrap_or_default();
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|it| it.into_u32().collect())
            .unwrap_or_default();
        if let Some(max) = indices.iter().max() {
            if *max as usize >= positions.len() {
                return Err(LoadError::Malformed(format!(
                    "index {max} out of range for {} vertices",
                    positions.len()
                )));
            }
        }
        Ok(Some(
            Mesh::new(positions, normals, indices, base_color).with_double_sided(double_sided),
        ))
    }

    fn draco_primitive(
        &self,
        prim: &gltf::Primitive<'_>,
    ) -> Result<(Vec<Vec3>, Vec<Vec3>, Vec<u32>), LoadError> {
        let malformed = |msg: &str| LoadError::Malformed(format!("{DRACO_EXTENSION}: {msg}"));
        let ext = prim
            .extension_value(DRACO_EXTENSION)
            .and_then(|v| v.as_object())
            .ok_or_else(|| malformed("extension is not an object"))?;
        let view_index = ext
            .get("bufferView")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| malformed("bufferView missing"))? as usize;
        let attr_map = ext
            .get("attributes")
            .and_then(|v| v.as_object())
            .ok_or_else(|| malformed("attributes missing"))?;

        let view = self
            .document
            .views()
            .nth(view_index)
            .ok_or_else(|| malformed("bufferView out of range"))?;
        let data = &self
            .buffers
            .get(view.buffer().index())
            .ok_or_else(|| malformed("buffer out of range"))?
            .0;
        let compressed = data
            .get(view.offset()..view.offset() + view.length())
            .ok_or_else(|| malformed("bufferView exceeds buffer"))?;

        let vertex_count = prim
            .get(&Semantic::Positions)
            .ok_or_else(|| malformed("POSITION accessor missing"))?
            .count() as u32;
        let index_count = prim.indices().map(|a| a.count() as u32).unwrap_or(0);

        let mut mapped: Vec<(u64, Semantic, AttributeSemantic)> = Vec::new();
        for (name, id) in attr_map {
            let semantic = match name.as_str() {
                "POSITION" => (Semantic::Positions, AttributeSemantic::Position),
                "NORMAL" => (Semantic::Normals, AttributeSemantic::Normal),
                s if s.starts_with("TEXCOORD_") => {
                    let set: u32 = s["TEXCOORD_".len()..].parse().unwrap_or(0);
                    (Semantic::TexCoords(set), AttributeSemantic::TexCoord(set))
                }
                _ => continue,
            };
            mapped.push((id.as_u64().unwrap_or(0), semantic.0, semantic.1));
        }
        mapped.sort_by_key(|(id, _, _)| *id);

        let mut attributes = Vec::with_capacity(mapped.len());
        for (_, gltf_semantic, semantic) in &mapped {
            let accessor = prim
                .get(gltf_semantic)
                .ok_or_else(|| malformed("accessor for mapped attribute missing"))?;
            attributes.push(AttributeLayout {
                semantic: *semantic,
                components: match accessor.dimensions() {
                    Dimensions::Scalar => 1,
                    Dimensions::Vec2 => 2,
                    Dimensions::Vec4 => 4,
                    _ => 3,
                },
                component_type: match accessor.data_type() {
                    DataType::I8 => ComponentType::I8,
                    DataType::U8 => ComponentType::U8,
                    DataType::I16 => ComponentType::I16,
                    DataType::U16 => ComponentType::U16,
                    DataType::U32 => ComponentType::U32,
                    DataType::F32 => ComponentType::F32,
                },
            });
        }

        let request = DecodeRequest {
            vertex_count,
            index_count,
            attributes,
        };
        tracing::debug!(vertex_count, index_count, bytes = compressed.len(), "decoding compressed primitive");
        let decoded = self.decoder.decode(compressed, &request)?;
        Ok((decoded.positions, decoded.normals, decoded.indices))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small glTF documents written to disk for loader tests.

    use std::path::{Path, PathBuf};

    /// Write `tri.gltf` + `tri.bin`: one triangle spanning (0,0,0)-(4,2,0), translated by +10 on X.
    pub fn write_triangle(dir: &Path) -> PathBuf {
        write_triangle_with(dir, "tri", [0, 1, 2], TRIANGLE_NODES)
    }

    /// The node and mesh of [`write_triangle`]. Accessor 2 is an empty VEC3.
    pub const TRIANGLE_NODES: &str = r#""nodes": [ { "name": "tri", "mesh": 0, "translation": [10.0, 0.0, 0.0] } ],
  "meshes": [ { "name": "tri_mesh", "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ]"#;

    /// Like [`write_triangle`], with custom indices and `nodes`/`meshes` JSON members.
    pub fn write_triangle_with(
        dir: &Path,
        name: &str,
        indices: [u16; 3],
        nodes_and_meshes: &str,
    ) -> PathBuf {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 2.0, 0.0]] {
            for c in p {
                bin.extend(c.to_le_bytes());
            }
        }
        for i in indices {
            bin.extend(i.to_le_bytes());
        }
        bin.extend([0u8; 2]);
        std::fs::write(dir.join(format!("{name}.bin")), &bin).unwrap();

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "name": "tri_scene", "nodes": [0] }} ],
  "buffers": [ {{ "uri": "{name}.bin", "byteLength": 44 }} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [4.0, 2.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 0, "componentType": 5126, "count": 0, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [0.0, 0.0, 0.0] }}
  ],
  {}
}}"#,
            nodes_and_meshes
        );
        let path = dir.join(format!("{name}.gltf"));
        std::fs::write(&path, json).unwrap();
        path
    }

    /// Write `draco.gltf` + `draco.bin`: one Draco-compressed primitive of three vertices.
    pub fn write_draco(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("draco.bin"), [0xd5u8; 16]).unwrap();
        let json = r#"{
  "asset": { "version": "2.0" },
  "extensionsUsed": ["KHR_draco_mesh_compression"],
  "extensionsRequired": ["KHR_draco_mesh_compression"],
  "scenes": [ { "nodes": [0] } ],
  "nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [ {
    "attributes": { "POSITION": 0 },
    "indices": 1,
    "extensions": { "KHR_draco_mesh_compression": { "bufferView": 0, "attributes": { "POSITION": 0 } } }
  } ] } ],
  "buffers": [ { "uri": "draco.bin", "byteLength": 16 } ],
  "bufferViews": [ { "buffer": 0, "byteOffset": 0, "byteLength": 16 } ],
  "accessors": [
    { "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;
        let path = dir.join("draco.gltf");
        std::fs::write(&path, json).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodeError, DecodedPrimitive, DecoderConfig, UnavailableDecoder};
    use glam::Mat4;
    use std::sync::Mutex;

    struct FixedDecoder {
        seen: Mutex<Vec<(usize, DecodeRequest)>>,
    }

    impl GeometryDecoder for FixedDecoder {
        fn decode(&self, compressed: &[u8], request: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
            self.seen.lock().unwrap().push((compressed.len(), request.clone()));
            Ok(DecodedPrimitive {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                normals: Vec::new(),
                indices: vec![0, 1, 2],
            })
        }
    }

    #[test]
    fn imports_plain_triangle() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_triangle(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        let root = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap();

        assert_eq!(root.name.as_deref(), Some("tri_scene"));
        assert_eq!(root.mesh_count(), 1);
        let bounds = root.world_bounds(Mat4::IDENTITY);
        assert_eq!(bounds.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(14.0, 2.0, 0.0));
    }

    #[test]
    fn external_buffers_need_a_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_triangle(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        let err = import_gltf(&bytes, None, &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Gltf(_)));
    }

    #[test]
    fn draco_primitives_go_to_the_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        let decoder = FixedDecoder {
            seen: Mutex::new(Vec::new()),
        };
        let root = import_gltf(&bytes, Some(dir.path()), &decoder).unwrap();

        assert_eq!(root.mesh_count(), 1);
        let seen = decoder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (len, request) = &seen[0];
        assert_eq!(*len, 16);
        assert_eq!(request.vertex_count, 3);
        assert_eq!(request.index_count, 3);
        assert_eq!(request.attributes[0].semantic, AttributeSemantic::Position);
        assert_eq!(request.attributes[0].component_type, ComponentType::F32);
    }

    #[test]
    fn draco_without_decoder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        let err = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode(DecodeError::Unavailable { .. })));
    }

    #[test]
    fn primitives_without_vertices_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = r#""nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [
    { "attributes": { "POSITION": 0 }, "indices": 1 },
    { "attributes": { "POSITION": 2 } }
  ] } ]"#;
        let path = fixtures::write_triangle_with(dir.path(), "empty_prim", [0, 1, 2], nodes);
        let bytes = std::fs::read(&path).unwrap();
        let root = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap();

        assert_eq!(root.mesh_count(), 1);
        let mut vertex_counts = Vec::new();
        root.visit(Mat4::IDENTITY, &mut |node, _| {
            if let Some(mesh) = &node.mesh {
                vertex_counts.push(mesh.vertex_count());
            }
        });
        assert_eq!(vertex_counts, vec![3]);
    }

    struct EmptyDecoder;

    impl GeometryDecoder for EmptyDecoder {
        fn decode(&self, _: &[u8], _: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
            Ok(DecodedPrimitive {
                positions: Vec::new(),
                normals: Vec::new(),
                indices: Vec::new(),
            })
        }
    }

    #[test]
    fn decoded_primitive_without_vertices_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        let root = import_gltf(&bytes, Some(dir.path()), &EmptyDecoder).unwrap();
        assert_eq!(root.mesh_count(), 0);
    }

    #[test]
    fn dangling_mesh_reference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = r#""nodes": [ { "mesh": 4 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ]"#;
        let path = fixtures::write_triangle_with(dir.path(), "dangling", [0, 1, 2], nodes);
        let bytes = std::fs::read(&path).unwrap();
        let err = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Gltf(gltf::Error::Validation(_))));
    }

    #[test]
    fn unknown_required_extension_is_still_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = format!(
            r#""extensionsRequired": ["EXT_made_up"],
  {}"#,
            fixtures::TRIANGLE_NODES
        );
        let path = fixtures::write_triangle_with(dir.path(), "made_up", [0, 1, 2], &nodes);
        let bytes = std::fs::read(&path).unwrap();
        let err = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Gltf(gltf::Error::Validation(_))));
    }

    #[test]
    fn material_double_sided_flag_reaches_the_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = r#""materials": [ { "doubleSided": true } ],
  "nodes": [ { "mesh": 0 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 } ] } ]"#;
        let path = fixtures::write_triangle_with(dir.path(), "two_faced", [0, 1, 2], nodes);
        let bytes = std::fs::read(&path).unwrap();
        let root = import_gltf(&bytes, Some(dir.path()), &UnavailableDecoder::new(&DecoderConfig::default()))
            .unwrap();

        let mut flags = Vec::new();
        root.visit(Mat4::IDENTITY, &mut |node, _| {
            if let Some(mesh) = &node.mesh {
                flags.push(mesh.is_double_sided());
            }
        });
        assert_eq!(flags, vec![true]);
    }
}
