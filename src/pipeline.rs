// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Classification, distribution, and single-pass organize passes
//!
//! The two-phase workflow stages every photo into one flat directory
//! under a filename that encodes its species, then a separate pass
//! moves staged files into per-species folders. Because the second
//! pass reads nothing but filenames, it can resume after interruption
//! and re-running it is a no-op.

use chrono::{DateTime, Utc};
use image::GenericImageView;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::context::SpeciesContext;
use crate::gemini::VisionModel;
use crate::naming::{decode_staged_name, encode_staged_name, is_supported_image, SENTINEL_LABEL};
use crate::species::SpeciesCache;
use crate::{AviaryError, Result};

/// Name of the flat staging directory created under the input folder.
pub const STAGING_DIR_NAME: &str = "0000-bird-folders";

/// Longest edge of preview thumbnails, in pixels.
const PREVIEW_EDGE: u32 = 256;

/// Events emitted by a running pass, in emission order.
#[derive(Debug)]
pub enum PipelineEvent {
    /// One file was handled. `index` is 1-based.
    Progress {
        index: usize,
        total: usize,
        label: String,
    },
    /// Preview of the photo just classified.
    Preview(PreviewFrame),
    /// The pass aborted. Always the final event of a failed pass.
    Error { message: String },
    /// The pass finished. Always the final event of a successful pass.
    Completed(PassSummary),
}

/// Sending half of a pass's event channel.
pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;

/// Preview payload for one classified photo.
pub struct PreviewFrame {
    pub path: PathBuf,
    pub label: String,
    pub blurred: bool,
    pub location: Option<String>,
    /// Decoded best-effort; `None` when the image cannot be decoded.
    pub thumbnail: Option<image::DynamicImage>,
}

impl PreviewFrame {
    /// Capture a preview for one photo. An undecodable image still
    /// previews its label, just without a thumbnail.
    pub fn capture(path: &Path, label: &str, blurred: bool, location: Option<&str>) -> Self {
        let thumbnail = match image::open(path) {
            Ok(img) => Some(img.thumbnail(PREVIEW_EDGE, PREVIEW_EDGE)),
            Err(e) => {
                debug!("No thumbnail for {:?}: {}", path, e);
                None
            }
        };

        Self {
            path: path.to_path_buf(),
            label: label.to_string(),
            blurred,
            location: location.map(String::from),
            thumbnail,
        }
    }
}

impl fmt::Debug for PreviewFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewFrame")
            .field("path", &self.path)
            .field("label", &self.label)
            .field("blurred", &self.blurred)
            .field("location", &self.location)
            .field(
                "thumbnail",
                &self.thumbnail.as_ref().map(|t| t.dimensions()),
            )
            .finish()
    }
}

/// What one finished pass accomplished.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    /// Classification and organize: images classified.
    /// Distribution: staged files moved into species folders.
    pub images_processed: usize,
    /// Distinct real species handled by the pass.
    pub species_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Enumerate supported images directly inside the input folder, in
/// directory-enumeration order. The order is whatever the filesystem
/// yields; results are never sorted.
fn scan_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Err(AviaryError::Config(format!(
            "Input folder not found: {}",
            input.display()
        )));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    Ok(images)
}

fn stem_and_ext(path: &Path) -> (&str, &str) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
    (stem, ext)
}

/// Classify every image in `input` and copy it into the flat staging
/// directory under its encoded name.
///
/// Classification failures degrade individual photos to the sentinel
/// label, so every input yields exactly one staged file. Originals are
/// copied, never moved, and never deleted. I/O failures abort the pass;
/// files staged so far stay on disk.
pub async fn run_classification(
    input: &Path,
    classifier: &Classifier,
    context: &mut SpeciesContext,
    events: &EventSender,
) -> Result<PassSummary> {
    let started_at = Utc::now();
    let images = scan_images(input)?;
    let total = images.len();

    info!("Classifying {} images in {:?}", total, input);

    let staging = input.join(STAGING_DIR_NAME);
    std::fs::create_dir_all(&staging)?;

    for (i, path) in images.iter().enumerate() {
        let identification = classifier.identify(path, context).await;
        let label = identification
            .label
            .clone()
            .unwrap_or_else(|| SENTINEL_LABEL.to_string());

        let _ = events.send(PipelineEvent::Progress {
            index: i + 1,
            total,
            label: label.clone(),
        });
        let _ = events.send(PipelineEvent::Preview(PreviewFrame::capture(
            path,
            &label,
            identification.blurred,
            classifier.location_hint(),
        )));

        let (stem, ext) = stem_and_ext(path);
        let staged_name = encode_staged_name(stem, &label, identification.blurred, ext);
        std::fs::copy(path, staging.join(&staged_name))?;
        debug!("Staged {:?} as {}", path, staged_name);
    }

    Ok(PassSummary {
        images_processed: total,
        species_count: context.seen().len(),
        started_at,
        finished_at: Utc::now(),
    })
}

/// Move staged files into per-species folders derived from their
/// encoded names, creating folders and info files lazily.
///
/// Files whose decoded label is empty or the sentinel stay in the
/// staging directory. Files already moved into species folders are
/// absent from the flat scan, which is what makes re-runs no-ops.
pub async fn run_distribution(
    staging: &Path,
    model: &dyn VisionModel,
    events: &EventSender,
) -> Result<PassSummary> {
    let started_at = Utc::now();

    if !staging.is_dir() {
        return Err(AviaryError::Config(format!(
            "Staging folder not found: {}",
            staging.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(staging)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    let total = files.len();

    info!("Distributing {} staged files in {:?}", total, staging);

    let cache = SpeciesCache::new(staging);
    let mut moved = 0usize;
    let mut species: Vec<String> = Vec::new();

    for (i, path) in files.iter().enumerate() {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let decoded = match decode_staged_name(&name) {
            Some(decoded) => decoded,
            None => continue,
        };

        let display = if decoded.label.is_empty() {
            SENTINEL_LABEL.to_string()
        } else {
            decoded.label.clone()
        };
        let _ = events.send(PipelineEvent::Progress {
            index: i + 1,
            total,
            label: display,
        });

        if decoded.label.is_empty() || decoded.label == SENTINEL_LABEL {
            debug!("Leaving {} in staging: no species label", name);
            continue;
        }

        let dir = cache.ensure_species_dir(&decoded.label)?;
        cache.ensure_info(&decoded.label, model).await;
        std::fs::rename(path, dir.join(&name))?;
        moved += 1;

        if !species.contains(&decoded.label) {
            species.push(decoded.label.clone());
        }
        debug!("Moved {} into {}/", name, decoded.label);
    }

    info!("Distributed {} files across {} species", moved, species.len());

    Ok(PassSummary {
        images_processed: moved,
        species_count: species.len(),
        started_at,
        finished_at: Utc::now(),
    })
}

/// Classify and file every image in one pass: identified photos go
/// straight into their species folder under the encoded name, photos
/// without a bird are copied into the sentinel folder under their
/// original name.
pub async fn run_organize(
    input: &Path,
    classifier: &Classifier,
    context: &mut SpeciesContext,
    events: &EventSender,
) -> Result<PassSummary> {
    let started_at = Utc::now();
    let images = scan_images(input)?;
    let total = images.len();

    info!("Organizing {} images in {:?}", total, input);

    let staging = input.join(STAGING_DIR_NAME);
    let unidentified = staging.join(SENTINEL_LABEL);
    std::fs::create_dir_all(&unidentified)?;

    let cache = SpeciesCache::new(&staging);

    for (i, path) in images.iter().enumerate() {
        let identification = classifier.identify(path, context).await;
        let label = identification
            .label
            .clone()
            .unwrap_or_else(|| SENTINEL_LABEL.to_string());

        let _ = events.send(PipelineEvent::Progress {
            index: i + 1,
            total,
            label: label.clone(),
        });
        let _ = events.send(PipelineEvent::Preview(PreviewFrame::capture(
            path,
            &label,
            identification.blurred,
            classifier.location_hint(),
        )));

        match identification.label {
            Some(ref species) => {
                let dir = cache.ensure_species_dir(species)?;
                cache.ensure_info(species, classifier.model()).await;

                let (stem, ext) = stem_and_ext(path);
                let staged_name =
                    encode_staged_name(stem, species, identification.blurred, ext);
                std::fs::copy(path, dir.join(&staged_name))?;
                debug!("Filed {:?} under {}/", path, species);
            }
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                std::fs::copy(path, unidentified.join(&name))?;
                debug!("Filed {:?} under {}/", path, SENTINEL_LABEL);
            }
        }
    }

    Ok(PassSummary {
        images_processed: total,
        species_count: context.seen().len(),
        started_at,
        finished_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::ScriptedModel;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<PipelineEvent>) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn classifier_with(model: ScriptedModel) -> (Arc<ScriptedModel>, Classifier) {
        let scripted = Arc::new(model);
        let classifier = Classifier::new(scripted.clone(), Some("India".to_string()));
        (scripted, classifier)
    }

    fn staged_names(staging: &Path) -> Vec<String> {
        std::fs::read_dir(staging)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_input_folder_is_a_config_error() {
        let (tx, _rx) = event_channel();
        let (_, classifier) = classifier_with(ScriptedModel::always("Contains bird: No"));
        let mut context = SpeciesContext::new();

        let err = run_classification(Path::new("/nonexistent/birds"), &classifier, &mut context, &tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AviaryError::Config(_)));
    }

    #[tokio::test]
    async fn test_every_image_stages_exactly_one_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one.jpg", "two.jpeg", "three.png"] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }

        let (tx, mut rx) = event_channel();
        let (scripted, classifier) = classifier_with(ScriptedModel::always("Contains bird: No"));
        let mut context = SpeciesContext::new();

        let summary = run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();
        assert_eq!(summary.images_processed, 3);
        assert_eq!(summary.species_count, 0);
        assert_eq!(scripted.image_calls.load(Ordering::SeqCst), 3);

        let staging = dir.path().join(STAGING_DIR_NAME);
        let mut staged = staged_names(&staging);
        staged.sort();
        assert_eq!(
            staged,
            vec![
                "one Unidentified.jpg",
                "three Unidentified.png",
                "two Unidentified.jpeg"
            ]
        );

        // Copy, never move: the originals are untouched.
        for name in ["one.jpg", "two.jpeg", "three.png"] {
            assert!(dir.path().join(name).exists());
        }

        // A subsequent distribution finds nothing to move and creates
        // no species folders.
        let summary = run_distribution(&staging, &*scripted, &tx).await.unwrap();
        assert_eq!(summary.images_processed, 0);
        assert_eq!(summary.species_count, 0);
        assert_eq!(scripted.text_calls.load(Ordering::SeqCst), 0);
        assert_eq!(staged_names(&staging).len(), 3);

        drain(&mut rx);
    }

    #[tokio::test]
    async fn test_classify_then_distribute_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"A").unwrap();
        std::fs::write(dir.path().join("B.jpg"), b"B").unwrap();

        let mut replies = HashMap::new();
        replies.insert("A".to_string(), ScriptedModel::identified_as("Rock Pigeon"));
        replies.insert("B".to_string(), "Contains bird: No\nBird name: N/A".to_string());

        let (tx, _rx) = event_channel();
        let (scripted, classifier) = classifier_with(ScriptedModel::by_content(replies));
        let mut context = SpeciesContext::new();

        run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();

        let staging = dir.path().join(STAGING_DIR_NAME);
        assert!(staging.join("A Rock Pigeon.jpg").exists());
        assert!(staging.join("B Unidentified.jpg").exists());

        let summary = run_distribution(&staging, &*scripted, &tx).await.unwrap();
        assert_eq!(summary.images_processed, 1);
        assert_eq!(summary.species_count, 1);

        assert!(staging.join("Rock Pigeon").join("A Rock Pigeon.jpg").exists());
        assert!(staging.join("Rock Pigeon").join("info.txt").exists());
        // Sentinel-labeled files are never distributed.
        assert!(staging.join("B Unidentified.jpg").exists());
    }

    #[tokio::test]
    async fn test_distribution_rerun_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join(STAGING_DIR_NAME);
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("A Rock Pigeon.jpg"), b"A").unwrap();
        std::fs::write(staging.join("B Unidentified.jpg"), b"B").unwrap();

        let (tx, _rx) = event_channel();
        let model = ScriptedModel::always("");

        let first = run_distribution(&staging, &model, &tx).await.unwrap();
        assert_eq!(first.images_processed, 1);
        assert_eq!(first.species_count, 1);

        let second = run_distribution(&staging, &model, &tx).await.unwrap();
        assert_eq!(second.images_processed, 0);
        assert_eq!(second.species_count, 0);

        // Same layout, no duplicate info files, no second info call.
        assert!(staging.join("Rock Pigeon").join("A Rock Pigeon.jpg").exists());
        assert!(staging.join("Rock Pigeon").join("info.txt").exists());
        assert!(staging.join("B Unidentified.jpg").exists());
        assert_eq!(model.text_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_info_generated_once_per_species() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("myna{}.jpg", i)), [i]).unwrap();
        }

        let (tx, _rx) = event_channel();
        let (scripted, classifier) =
            classifier_with(ScriptedModel::always(&ScriptedModel::identified_as(
                "Common Myna",
            )));
        let mut context = SpeciesContext::new();

        run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();
        assert_eq!(context.seen(), &["Common Myna".to_string()]);

        let staging = dir.path().join(STAGING_DIR_NAME);
        let summary = run_distribution(&staging, &*scripted, &tx).await.unwrap();
        assert_eq!(summary.images_processed, 5);
        assert_eq!(summary.species_count, 1);
        assert_eq!(scripted.text_calls.load(Ordering::SeqCst), 1);

        let folder = staging.join("Common Myna");
        let photos = std::fs::read_dir(&folder)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != crate::species::INFO_FILE_NAME)
            .count();
        assert_eq!(photos, 5);
    }

    #[tokio::test]
    async fn test_scan_takes_direct_children_on_the_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("B.JPG"), b"B").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"notes").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.jpg"), b"c").unwrap();

        let (tx, _rx) = event_channel();
        let (_, classifier) = classifier_with(ScriptedModel::always("Contains bird: No"));
        let mut context = SpeciesContext::new();

        let summary = run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();
        assert_eq!(summary.images_processed, 2);
        assert!(dir.path().join("nested").join("c.jpg").exists());
    }

    #[tokio::test]
    async fn test_blur_marker_reaches_the_staged_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"A").unwrap();

        let mut replies = HashMap::new();
        replies.insert(
            "A".to_string(),
            "Contains bird: Yes\nBird name: Rock Pigeon\nIs blurred: Yes".to_string(),
        );

        let (tx, _rx) = event_channel();
        let (_, classifier) = classifier_with(ScriptedModel::by_content(replies));
        let mut context = SpeciesContext::new();

        run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();

        let staging = dir.path().join(STAGING_DIR_NAME);
        assert!(staging.join("A Rock Pigeon blurred.jpg").exists());
    }

    #[tokio::test]
    async fn test_event_stream_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"A").unwrap();
        std::fs::write(dir.path().join("B.jpg"), b"B").unwrap();

        let (tx, mut rx) = event_channel();
        let (_, classifier) = classifier_with(ScriptedModel::always("Contains bird: No"));
        let mut context = SpeciesContext::new();

        run_classification(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);

        match &events[0] {
            PipelineEvent::Progress { index, total, label } => {
                assert_eq!(*index, 1);
                assert_eq!(*total, 2);
                assert_eq!(label, SENTINEL_LABEL);
            }
            other => panic!("Expected progress event, got {:?}", other),
        }
        assert!(matches!(&events[1], PipelineEvent::Preview(_)));
        match &events[2] {
            PipelineEvent::Progress { index, total, .. } => {
                assert_eq!(*index, 2);
                assert_eq!(*total, 2);
            }
            other => panic!("Expected progress event, got {:?}", other),
        }
        assert!(matches!(&events[3], PipelineEvent::Preview(_)));
    }

    #[tokio::test]
    async fn test_organize_single_pass_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"A").unwrap();
        std::fs::write(dir.path().join("B.jpg"), b"B").unwrap();

        let mut replies = HashMap::new();
        replies.insert("A".to_string(), ScriptedModel::identified_as("Rock Pigeon"));

        let (tx, _rx) = event_channel();
        let (scripted, classifier) = classifier_with(ScriptedModel::by_content(replies));
        let mut context = SpeciesContext::new();

        let summary = run_organize(dir.path(), &classifier, &mut context, &tx)
            .await
            .unwrap();
        assert_eq!(summary.images_processed, 2);
        assert_eq!(summary.species_count, 1);

        let staging = dir.path().join(STAGING_DIR_NAME);
        assert!(staging.join("Rock Pigeon").join("A Rock Pigeon.jpg").exists());
        assert!(staging.join("Rock Pigeon").join("info.txt").exists());
        // Unidentified photos keep their original filename.
        assert!(staging.join(SENTINEL_LABEL).join("B.jpg").exists());
        assert_eq!(scripted.text_calls.load(Ordering::SeqCst), 1);

        // Copies, not moves.
        assert!(dir.path().join("A.jpg").exists());
        assert!(dir.path().join("B.jpg").exists());
    }
}
