//! The frame around the grid: stylesheet, container, update button and
//! refresh indicator

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};

use crate::config::HostProps;

/// Layout of the element hosting the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    /// `ag-theme-<theme>`
    pub class_name: String,
    pub width: String,
    /// `None` when the grid sizes itself to its content
    pub height: Option<String>,
    /// Whether the manual "Update" button is shown
    pub manual_button: bool,
}

impl ContainerLayout {
    pub fn from_props(props: &HostProps, grid_height: u32) -> Self {
        Self {
            class_name: format!("ag-theme-{}", props.theme),
            width: props.width.to_string(),
            height: (!props.is_auto_height()).then(|| format!("{grid_height}px")),
            manual_button: props.is_manual(),
        }
    }
}

/// Text of the "last refreshed" indicator: local wall-clock `HH:MM:SS`
pub fn refresh_label(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// Presentation surface owned by the component
pub trait ComponentFrame: Send {
    /// Insert a stylesheet into the document. Called at most once.
    fn append_stylesheet(&mut self, css: &str);

    fn set_container(&mut self, layout: &ContainerLayout);

    fn set_refresh_indicator(&mut self, text: &str);
}

/// [`ComponentFrame`] that remembers what it was told
#[derive(Debug, Clone, Default)]
pub struct RecordingFrame {
    pub stylesheets: Vec<String>,
    pub layout: Option<ContainerLayout>,
    pub refresh_indicator: Option<String>,
}

impl ComponentFrame for RecordingFrame {
    fn append_stylesheet(&mut self, css: &str) {
        self.stylesheets.push(css.to_string());
    }

    fn set_container(&mut self, layout: &ContainerLayout) {
        self.layout = Some(layout.clone());
    }

    fn set_refresh_indicator(&mut self, text: &str) {
        self.refresh_indicator = Some(text.to_string());
    }
}

/// [`RecordingFrame`] behind a shared handle; clones see the same record
#[derive(Debug, Clone, Default)]
pub struct SharedFrame(Arc<Mutex<RecordingFrame>>);

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> RecordingFrame {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut RecordingFrame) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ComponentFrame for SharedFrame {
    fn append_stylesheet(&mut self, css: &str) {
        self.with(|frame| frame.append_stylesheet(css));
    }

    fn set_container(&mut self, layout: &ContainerLayout) {
        self.with(|frame| frame.set_container(layout));
    }

    fn set_refresh_indicator(&mut self, text: &str) {
        self.with(|frame| frame.set_refresh_indicator(text));
    }
}
