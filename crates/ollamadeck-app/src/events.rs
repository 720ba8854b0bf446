//! Events published to the presentation layer.

use ollamadeck_core::{InstalledModel, ModelTag, PullOutcome, RemoteModel, RunningModel};

/// One notification from the orchestration layer.
///
/// Snapshots (`*Updated`) replace the consumer's previous state wholesale.
/// A superseded refresh publishes nothing, so consumers only ever see the
/// newest result for each resource.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Fresh snapshot of locally installed models.
    InstalledUpdated(Vec<InstalledModel>),

    /// Fresh snapshot of currently loaded models.
    RunningUpdated(Vec<RunningModel>),

    /// Fresh snapshot of the remote catalog.
    CatalogUpdated(Vec<RemoteModel>),

    /// Tags for one model family arrived.
    TagsFetched {
        family: String,
        tags: Vec<ModelTag>,
    },

    /// A refresh could not even be attempted (the runner failed to launch
    /// or its output could not be read). Registry problems never surface
    /// here, they degrade to empty snapshots instead.
    RefreshFailed {
        resource: &'static str,
        message: String,
    },

    /// A model removal finished, successfully or not.
    DeleteFinished {
        name: String,
        success: bool,
        message: String,
    },

    /// A model unload finished, successfully or not.
    StopFinished {
        name: String,
        success: bool,
        message: String,
    },

    /// One progress line from the active pull. `percent` is present only
    /// when the line carried one; consumers keep their previous value
    /// otherwise.
    PullProgress {
        tag: String,
        line: String,
        percent: Option<f32>,
    },

    /// The active pull reached a terminal state.
    PullFinished {
        tag: String,
        outcome: PullOutcome,
    },
}
