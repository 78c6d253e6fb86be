//! # trackrec recorder
//!
//! Track recording for trackrec. A [`TrackRecorder`] drives one track from
//! its frame source through a renderer and encoder into a shared media
//! target, one step per call. The [`RecorderFactory`] picks the recorder for
//! a track, and the [`RecordRequestManager`] runs all tracks of a request
//! concurrently and finalizes the media target once.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod event;
pub mod factory;
pub mod manager;
pub mod passthrough;
pub mod recorder;
pub mod video;

pub use audio::AudioTrackRecorder;
pub use config::RecorderConfig;
pub use event::RecordEvent;
pub use factory::{RecorderFactory, TrackRecordParameters};
pub use manager::{RecordRequestManager, RequestInfo};
pub use passthrough::PassthroughRenderer;
pub use recorder::{RecordResult, RecorderState, TrackRecorder, TrackRegistration, TrackStats};
pub use video::VideoTrackRecorder;
