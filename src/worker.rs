// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Background workers for long-running passes
//!
//! Each spawn function starts one pass on a tokio task and returns a
//! handle immediately; the caller polls the event channel while the
//! pass runs. The channel is unbounded, so the worker never blocks on
//! a slow consumer. Every worker ends with exactly one terminal event,
//! `Completed` or `Error`, and there is no mid-flight cancellation.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

use crate::classifier::Classifier;
use crate::context::SpeciesContext;
use crate::gemini::VisionModel;
use crate::pipeline::{self, EventSender, PassSummary, PipelineEvent};
use crate::Result;

/// A running pass: its event stream and its join handle.
pub struct WorkerHandle {
    pub events: mpsc::UnboundedReceiver<PipelineEvent>,
    pub handle: JoinHandle<()>,
}

/// Run the classification pass in the background.
///
/// The worker owns a fresh [`SpeciesContext`] for the duration of the
/// pass; nothing else touches it.
pub fn spawn_classification(input: PathBuf, classifier: Classifier) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut context = SpeciesContext::new();
        let result =
            pipeline::run_classification(&input, &classifier, &mut context, &tx).await;
        finish(&tx, result);
    });

    WorkerHandle { events: rx, handle }
}

/// Run the distribution pass in the background.
pub fn spawn_distribution(staging: PathBuf, model: Arc<dyn VisionModel>) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let result = pipeline::run_distribution(&staging, model.as_ref(), &tx).await;
        finish(&tx, result);
    });

    WorkerHandle { events: rx, handle }
}

/// Run the single-pass organize variant in the background.
pub fn spawn_organize(input: PathBuf, classifier: Classifier) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut context = SpeciesContext::new();
        let result = pipeline::run_organize(&input, &classifier, &mut context, &tx).await;
        finish(&tx, result);
    });

    WorkerHandle { events: rx, handle }
}

/// Convert the pass result into its terminal event. Failed passes
/// leave already-written files on disk; there is no rollback.
fn finish(tx: &EventSender, result: Result<PassSummary>) {
    match result {
        Ok(summary) => {
            let _ = tx.send(PipelineEvent::Completed(summary));
        }
        Err(e) => {
            error!("Pass aborted: {}", e);
            let _ = tx.send(PipelineEvent::Error {
                message: e.to_string(),
            });
        }
    }
}
