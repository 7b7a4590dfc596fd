use crate::decoder::{DecodeError, DecoderConfig, GeometryDecoder, default_decoder};
use crate::import::import_gltf;
use crate::source::{ModelSource, SourceError, SourceLocation};
use modelview_scene::SceneNode;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Errors from fetching or decoding a model. Never fatal to the viewer.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("malformed asset: {0}")]
    Malformed(String),
    #[error("could not start loader thread: {0}")]
    Spawn(std::io::Error),
    #[error("import aborted: {0}")]
    Aborted(String),
}

/// Lifecycle of a [`LoadRequest`]. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl LoadStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LoadStatus::Succeeded,
            2 => LoadStatus::Failed,
            3 => LoadStatus::Cancelled,
            _ => LoadStatus::Pending,
        }
    }
}

/// Handle to one in-flight load. Cheap to clone; all clones share the status.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    source: ModelSource,
    status: Arc<AtomicU8>,
}

impl LoadRequest {
    fn new(source: ModelSource) -> Self {
        Self {
            source,
            status: Arc::new(AtomicU8::new(LoadStatus::Pending as u8)),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn status(&self) -> LoadStatus {
        LoadStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.status() == LoadStatus::Pending
    }

    /// Cancel a pending request so its callback never fires.
    /// Returns `false` if the request had already resolved.
    pub fn cancel(&self) -> bool {
        let cancelled = self.transition(LoadStatus::Cancelled);
        if cancelled {
            tracing::debug!(source = %self.source, "load request cancelled");
        }
        cancelled
    }

    fn transition(&self, to: LoadStatus) -> bool {
        self.status
            .compare_exchange(
                LoadStatus::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

type Completion = Box<dyn FnOnce(Result<SceneNode, LoadError>) + Send>;

/// Fetches and decodes models off the event-loop thread.
#[derive(Clone)]
pub struct AssetLoader {
    decoder: Arc<dyn GeometryDecoder>,
}

impl AssetLoader {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            decoder: default_decoder(&config),
        }
    }

    pub fn with_decoder(decoder: Arc<dyn GeometryDecoder>) -> Self {
        Self { decoder }
    }

    /// Start loading `source` on a background thread.
    ///
    /// `on_complete` runs exactly once on that thread, unless the request is
    /// cancelled first, in which case it never runs.
    pub fn load<F>(&self, source: ModelSource, on_complete: F) -> LoadRequest
    where
        F: FnOnce(Result<SceneNode, LoadError>) + Send + 'static,
    {
        let request = LoadRequest::new(source);
        tracing::info!(source = %request.source(), "loading model");

        let completion: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(Some(Box::new(on_complete))));
        let worker = {
            let request = request.clone();
            let completion = completion.clone();
            let loader = self.clone();
            move || {
                let result = loader.load_blocking(request.source());
                deliver(&request, &completion, result);
            }
        };

        if let Err(e) = std::thread::Builder::new()
            .name("model-loader".into())
            .spawn(worker)
        {
            deliver(&request, &completion, Err(LoadError::Spawn(e)));
        }
        request
    }

    /// Fetch and decode `source` on the calling thread.
    pub fn load_blocking(&self, source: &ModelSource) -> Result<SceneNode, LoadError> {
        let _span = tracing::info_span!("load_model", source = %source).entered();
        let (bytes, base) = fetch(&source.location()?)?;
        tracing::debug!(bytes = bytes.len(), "model fetched");
        let decoder = self.decoder.as_ref();
        panic::catch_unwind(AssertUnwindSafe(|| import_gltf(&bytes, base.as_deref(), decoder)))
            .unwrap_or_else(|payload| Err(LoadError::Aborted(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic during import".into())
}

/// Settle `request` and run the completion, unless it was cancelled meanwhile.
fn deliver(
    request: &LoadRequest,
    completion: &Mutex<Option<Completion>>,
    result: Result<SceneNode, LoadError>,
) {
    let to = if result.is_ok() {
        LoadStatus::Succeeded
    } else {
        LoadStatus::Failed
    };
    if !request.transition(to) {
        tracing::debug!(source = %request.source(), "dropping result of cancelled load");
        return;
    }
    let callback = completion.lock().ok().and_then(|mut slot| slot.take());
    if let Some(callback) = callback {
        callback(result);
    }
}

/// Read the asset bytes. Returns the directory relative buffer URIs resolve against.
fn fetch(location: &SourceLocation) -> Result<(Vec<u8>, Option<PathBuf>), LoadError> {
    match location {
        SourceLocation::Remote(url) => {
            let fetch_err = |source| LoadError::Fetch {
                url: url.to_string(),
                source,
            };
            let bytes = reqwest::blocking::get(url.clone())
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.bytes())
                .map_err(fetch_err)?;
            Ok((bytes.to_vec(), None))
        }
        SourceLocation::File(path) => {
            let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            let base = path
                .parent()
                .map(|p| if p.as_os_str().is_empty() { PathBuf::from(".") } else { p.to_path_buf() });
            Ok((bytes, base))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodeRequest, DecodedPrimitive, UnavailableDecoder};
    use crate::import::fixtures;
    use glam::{Mat4, Vec3};
    use std::sync::mpsc;
    use std::time::Duration;

    fn loader() -> AssetLoader {
        AssetLoader::new(DecoderConfig::default())
    }

    #[test]
    fn blocking_load_of_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_triangle(dir.path());
        let node = loader()
            .load_blocking(&ModelSource::new(path.to_string_lossy()))
            .unwrap();
        assert_eq!(node.mesh_count(), 1);
        assert_eq!(node.world_bounds(Mat4::IDENTITY).max, Vec3::new(14.0, 2.0, 0.0));
    }

    #[test]
    fn async_load_succeeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_triangle(dir.path());
        let (tx, rx) = mpsc::channel();
        let request = loader().load(ModelSource::new(path.to_string_lossy()), move |result| {
            tx.send(result.map(|n| n.mesh_count())).unwrap();
        });

        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(result.unwrap(), 1);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(request.status(), LoadStatus::Succeeded);
        assert!(!request.cancel());
    }

    #[test]
    fn missing_file_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.glb");
        let (tx, rx) = mpsc::channel();
        let request = loader().load(ModelSource::new(missing.to_string_lossy()), move |result| {
            tx.send(result.is_err()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(10)).unwrap());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(request.status(), LoadStatus::Failed);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = loader()
            .load_blocking(&ModelSource::new("/definitely/not/here/model.glb"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    /// Decoder that blocks until the test releases it.
    struct GatedDecoder {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl GeometryDecoder for GatedDecoder {
        fn decode(&self, _: &[u8], _: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(DecodedPrimitive {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                normals: Vec::new(),
                indices: vec![0, 1, 2],
            })
        }
    }

    #[test]
    fn cancelled_request_never_calls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let (release, gate) = mpsc::channel();
        let loader = AssetLoader::with_decoder(Arc::new(GatedDecoder {
            gate: Mutex::new(gate),
        }));

        let (tx, rx) = mpsc::channel();
        let request = loader.load(ModelSource::new(path.to_string_lossy()), move |result| {
            let _ = tx.send(result.is_ok());
        });
        assert!(request.is_pending());
        assert!(request.cancel());
        release.send(()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
        assert_eq!(request.status(), LoadStatus::Cancelled);
    }

    #[test]
    fn compressed_model_without_decoder_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let loader =
            AssetLoader::with_decoder(Arc::new(UnavailableDecoder::new(&DecoderConfig::default())));
        let err = loader
            .load_blocking(&ModelSource::new(path.to_string_lossy()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode(DecodeError::Unavailable { .. })));
    }

    /// Load `path` asynchronously and collect every callback invocation.
    fn load_and_collect(path: &std::path::Path) -> (Vec<Result<usize, LoadError>>, LoadStatus) {
        let (tx, rx) = mpsc::channel();
        let request = loader().load(ModelSource::new(path.to_string_lossy()), move |result| {
            let _ = tx.send(result.map(|n| n.mesh_count()));
        });
        let mut results = vec![rx.recv_timeout(Duration::from_secs(10)).unwrap()];
        results.extend(rx.recv_timeout(Duration::from_millis(100)));
        (results, request.status())
    }

    #[test]
    fn dangling_mesh_reference_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = r#""nodes": [ { "mesh": 4 } ],
  "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] } ]"#;
        let path = fixtures::write_triangle_with(dir.path(), "dangling", [0, 1, 2], nodes);

        let (results, status) = load_and_collect(&path);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LoadError::Gltf(_))));
        assert_eq!(status, LoadStatus::Failed);
    }

    #[test]
    fn unparseable_document_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        std::fs::write(&path, b"{ \"asset\": { \"version\": ").unwrap();

        let (results, status) = load_and_collect(&path);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LoadError::Gltf(_))));
        assert_eq!(status, LoadStatus::Failed);
    }

    #[test]
    fn out_of_range_index_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_triangle_with(dir.path(), "bad_index", [0, 1, 7], fixtures::TRIANGLE_NODES);

        let (results, status) = load_and_collect(&path);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LoadError::Malformed(_))));
        assert_eq!(status, LoadStatus::Failed);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = std::panic::catch_unwind(|| panic!("index out of bounds")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "index out of bounds");
        let payload = std::panic::catch_unwind(|| panic!("bad {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad 7");
    }

    struct PanickingDecoder;

    impl GeometryDecoder for PanickingDecoder {
        fn decode(&self, _: &[u8], _: &DecodeRequest) -> Result<DecodedPrimitive, DecodeError> {
            panic!("decoder blew up");
        }
    }

    #[test]
    fn panic_during_import_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_draco(dir.path());
        let (tx, rx) = mpsc::channel();
        let request = AssetLoader::with_decoder(Arc::new(PanickingDecoder)).load(
            ModelSource::new(path.to_string_lossy()),
            move |result| {
                let _ = tx.send(result.map(|n| n.mesh_count()));
            },
        );

        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(result, Err(LoadError::Aborted(ref msg)) if msg == "decoder blew up"));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(request.status(), LoadStatus::Failed);
    }
}
