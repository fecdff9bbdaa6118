//! Applying a [`Recipe`] to one upload.
//!
//! For each file the pipeline:
//!
//! 1. Returns early if the recipe is empty (nothing is decoded or written).
//! 2. Resolves the source to a local path, copying it from its store if needed.
//! 3. Decodes a fresh [`ImageHandle`].
//! 4. Applies every step in order, each operation followed by its hook.
//! 5. Flushes the handle exactly once via [`writer::flush`].
//!
//! Any failure stops the run. Nothing is written, and the caller gets one
//! [`ProcessingError`] whose [`kind`](ProcessingError::kind) says which
//! phase failed and whose `source()` is the underlying cause.
//!
//! ## Parallel Processing
//!
//! A [`Pipeline`] holds no per-file state and is `Sync`, so callers can
//! share one across a [rayon](https://docs.rs/rayon) pool.

use crate::config::PipelineConfig;
use crate::imaging::{EncodeParams, ImageHandle, ImagingError, ResizeFilter};
use crate::operation::{HookError, Recipe};
use crate::source::SourceFile;
use crate::writer::{self, Flushed};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Which phase of processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The source could not be resolved to a readable local file.
    UnavailableSource,
    /// The bytes could not be decoded as an image.
    Decode,
    /// An operation or hook failed.
    Operation,
    /// Encoding or writing the output failed.
    Encode,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnavailableSource => "unavailable source",
            ErrorKind::Decode => "decode",
            ErrorKind::Operation => "operation",
            ErrorKind::Encode => "encode",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error type raised by [`Pipeline::process`].
#[derive(Error, Debug)]
#[error("image processing failed ({kind})")]
pub struct ProcessingError {
    kind: ErrorKind,
    step: Option<usize>,
    #[source]
    source: HookError,
}

impl ProcessingError {
    pub fn new(kind: ErrorKind, source: impl Into<HookError>) -> Self {
        Self {
            kind,
            step: None,
            source: source.into(),
        }
    }

    fn at_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Zero-based index of the failing step, for operation failures.
    pub fn step(&self) -> Option<usize> {
        self.step
    }
}

impl From<ImagingError> for ProcessingError {
    fn from(err: ImagingError) -> Self {
        let kind = match err {
            ImagingError::Decode { .. } => ErrorKind::Decode,
            ImagingError::Operation { .. } => ErrorKind::Operation,
            ImagingError::Encode { .. } | ImagingError::Write { .. } => ErrorKind::Encode,
        };
        Self::new(kind, err)
    }
}

/// A recipe plus the resampling and encoding settings used to run it.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    recipe: Recipe,
    encode: EncodeParams,
    filter: ResizeFilter,
}

impl Pipeline {
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            ..Self::default()
        }
    }

    /// Build from a loaded configuration file.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            recipe: config.recipe(),
            encode: config.encode_params(),
            filter: config.resize.filter,
        }
    }

    pub fn with_encode_params(mut self, encode: EncodeParams) -> Self {
        self.encode = encode;
        self
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Run the recipe against `source`.
    ///
    /// Returns `Ok(None)` when the recipe is empty. On success the source is
    /// pointed at the written file.
    pub fn process(
        &self,
        source: &mut dyn SourceFile,
    ) -> Result<Option<Flushed>, ProcessingError> {
        if self.recipe.is_empty() {
            debug!("empty recipe, nothing to do");
            return Ok(None);
        }

        let mut handle = self.load(source)?;

        for (index, step) in self.recipe.steps().iter().enumerate() {
            debug!(step = index, operation = %step.operation, "applying");
            handle
                .apply(&step.operation)
                .map_err(|e| ProcessingError::from(e).at_step(index))?;

            if let Some(hook) = &step.hook {
                handle = hook(handle).map_err(|e| {
                    ProcessingError::new(ErrorKind::Operation, e).at_step(index)
                })?;
            }
        }

        let source_path = handle.source_path().to_path_buf();
        let flushed = writer::flush(handle, &self.encode)?;
        if flushed.path != source_path {
            source.set_current_path(flushed.path.clone());
        }

        info!(
            path = %flushed.path.display(),
            width = flushed.width,
            height = flushed.height,
            operations = flushed.operations,
            "processed"
        );
        Ok(Some(flushed))
    }

    fn load(&self, source: &mut dyn SourceFile) -> Result<ImageHandle, ProcessingError> {
        if !source.is_cached() {
            debug!("source not cached locally, resolving");
        }
        let path = source
            .resolve_local_path()
            .map_err(|e| ProcessingError::new(ErrorKind::UnavailableSource, e))?;
        Ok(ImageHandle::open(&path)?.with_filter(self.filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Gravity;
    use crate::source::{LocalFile, StoredFile};
    use crate::test_helpers::{create_test_jpeg, create_test_jpeg_with_orientation, create_test_png};
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn setup_png(name: &str, w: u32, h: u32) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(name);
        create_test_png(&path, w, h);
        (tmp, path)
    }

    #[test]
    fn empty_recipe_touches_nothing() {
        let (_tmp, path) = setup_png("a.png", 10, 10);
        let before = std::fs::read(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        let result = Pipeline::new(Recipe::new())
            .process(&mut LocalFile::new(&path))
            .unwrap();

        assert!(result.is_none());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn empty_recipe_skips_missing_source() {
        let result = Pipeline::new(Recipe::new()).process(&mut LocalFile::new("/nonexistent.png"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let (_tmp, path) = setup_png("a.png", 100, 80);
        let seen = Arc::new(Mutex::new(Vec::new()));

        fn spy(
            label: &'static str,
            seen: &Arc<Mutex<Vec<(&'static str, u32, u32)>>>,
        ) -> impl Fn(ImageHandle) -> Result<ImageHandle, HookError> + Send + Sync + 'static {
            let seen = Arc::clone(seen);
            move |handle| {
                seen.lock().unwrap().push((label, handle.width(), handle.height()));
                Ok(handle)
            }
        }

        let recipe = Recipe::new()
            .resize_to_limit(50, 50)
            .with_hook(spy("limit", &seen))
            .resize_to_fill(20, 30, Gravity::Center)
            .with_hook(spy("fill", &seen))
            .strip()
            .with_hook(spy("strip", &seen));

        let flushed = Pipeline::new(recipe)
            .process(&mut LocalFile::new(&path))
            .unwrap()
            .unwrap();

        // Each hook sees the result of its own operation
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("limit", 50, 40), ("fill", 20, 30), ("strip", 20, 30)]
        );
        assert_eq!(flushed.operations, 3);
    }

    #[test]
    fn hook_can_replace_handle_state() {
        let (_tmp, path) = setup_png("a.png", 40, 40);
        let recipe = Recipe::new().strip().with_hook(|mut handle: ImageHandle| {
            handle.convert("jpeg")?;
            Ok(handle)
        });

        let mut source = LocalFile::new(&path);
        let flushed = Pipeline::new(recipe).process(&mut source).unwrap().unwrap();
        assert_eq!(flushed.path, path.with_extension("jpeg"));
        assert_eq!(source.path(), flushed.path);
    }

    #[test]
    fn hook_failure_aborts_without_writing() {
        let (_tmp, path) = setup_png("a.png", 40, 40);
        let before = std::fs::read(&path).unwrap();

        let recipe = Recipe::new()
            .resize_to_fit(10, 10)
            .with_hook(|_| Err("watermark service down".into()))
            .convert("webp");

        let err = Pipeline::new(recipe)
            .process(&mut LocalFile::new(&path))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(err.step(), Some(0));
        assert_eq!(err.source().unwrap().to_string(), "watermark service down");
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!path.with_extension("webp").exists());
    }

    #[test]
    fn zero_dimension_is_operation_error() {
        let (_tmp, path) = setup_png("a.png", 40, 40);
        let before = std::fs::read(&path).unwrap();

        let recipe = Recipe::new().strip().resize_to_fill(0, 10, Gravity::North);
        let err = Pipeline::new(recipe)
            .process(&mut LocalFile::new(&path))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(err.step(), Some(1));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn unknown_convert_format_is_operation_error() {
        let (_tmp, path) = setup_png("a.png", 8, 8);
        let err = Pipeline::new(Recipe::new().convert("bmp2"))
            .process(&mut LocalFile::new(&path))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operation);
    }

    #[test]
    fn missing_source_is_unavailable() {
        let err = Pipeline::new(Recipe::new().strip())
            .process(&mut LocalFile::new("/nonexistent/a.png"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnavailableSource);
    }

    #[test]
    fn undecodable_source_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let err = Pipeline::new(Recipe::new().strip())
            .process(&mut LocalFile::new(&path))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(std::fs::read(&path).unwrap(), b"not a jpeg");
    }

    #[test]
    fn unwritable_destination_is_encode_error() {
        // Source resolves, but the handle points into a directory that
        // disappears before flush
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("uploads");
        std::fs::create_dir(&dir).unwrap();
        let path = dir.join("a.jpg");
        create_test_jpeg(&path, 8, 8);

        let recipe = Recipe::new().strip().with_hook(move |handle| {
            std::fs::remove_dir_all(handle.source_path().parent().unwrap())?;
            Ok(handle)
        });
        let err = Pipeline::new(recipe)
            .process(&mut LocalFile::new(&path))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }

    #[test]
    fn stored_source_is_copied_then_processed() {
        let tmp = TempDir::new().unwrap();
        let stored = tmp.path().join("store/a.jpg");
        std::fs::create_dir_all(stored.parent().unwrap()).unwrap();
        create_test_jpeg_with_orientation(&stored, 40, 20, 6);

        let mut source = StoredFile::new(&stored, tmp.path().join("cache"));
        let recipe = Recipe::new().auto_orient().convert("png");
        let flushed = Pipeline::new(recipe).process(&mut source).unwrap().unwrap();

        assert_eq!(flushed.path, tmp.path().join("cache/a.png"));
        assert_eq!((flushed.width, flushed.height), (20, 40));
        assert_eq!(source.cached_path(), Some(flushed.path.as_path()));
        // The store itself is never written
        assert_eq!(source.stored_path(), stored.as_path());
        assert_eq!(image::image_dimensions(source.stored_path()).unwrap(), (40, 20));
    }

    #[test]
    fn stored_source_missing_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let mut source = StoredFile::new(tmp.path().join("gone.jpg"), tmp.path().join("cache"));
        let err = Pipeline::new(Recipe::new().strip())
            .process(&mut source)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnavailableSource);
    }

    #[test]
    fn each_run_decodes_fresh() {
        let (_tmp, path) = setup_png("a.png", 100, 100);
        let pipeline = Pipeline::new(Recipe::new().resize_to_limit(50, 50));

        let first = pipeline.process(&mut LocalFile::new(&path)).unwrap().unwrap();
        let second = pipeline.process(&mut LocalFile::new(&path)).unwrap().unwrap();
        assert_eq!((first.width, first.height), (50, 50));
        assert_eq!((second.width, second.height), (50, 50));
        assert_eq!(second.operations, 1);
    }

    #[test]
    fn error_display_names_kind() {
        let err = ProcessingError::from(ImagingError::Operation {
            operation: "convert",
            reason: "nope".into(),
        });
        assert_eq!(err.to_string(), "image processing failed (operation)");
        assert_eq!(err.source().unwrap().to_string(), "convert failed: nope");
    }

    #[test]
    fn pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
        assert_send_sync::<ProcessingError>();
    }
}
