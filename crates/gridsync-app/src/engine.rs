//! GridComponent - the message loop that keeps a grid view and its host in sync
//!
//! The component owns the view. Everything that can change it (view events
//! turned into trigger fires, debounce timers, live row patches, new host
//! properties, the manual update button) arrives as a [`Message`] on one mpsc
//! channel and is processed in order by [`GridComponent::process_message`].

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gridsync_core::prelude::*;
use gridsync_core::stylesheet;
use gridsync_core::{
    BehaviorReconstructor, BehaviorRegistry, ConfigNode, GradientColorEngine, GradientPalette,
    ReturnPayload, Row, RowTransaction,
};
use gridsync_live::{LiveEvent, LiveTransactionChannel};

use crate::bridge::{self, BridgeState};
use crate::column_types::{self, CellPresentation};
use crate::config::{HostProps, Settings};
use crate::dispatcher::UpdateDispatcher;
use crate::frame::{refresh_label, ComponentFrame, ContainerLayout};
use crate::host::HostChannel;
use crate::message::Message;
use crate::payload::ReturnValueBuilder;
use crate::view::memory::FIRST_DATA_RENDERED;
use crate::view::GridView;

/// One rendered row: `(field, cell)` pairs in the row's field order
pub type PresentedRow = Vec<(String, CellPresentation)>;

/// A grid component instance.
///
/// Construction does the work that happens before the view exists: the
/// stylesheet, the container, the gradient domain and the reconstructed grid
/// options. [`GridComponent::on_grid_ready`] wires the view once it is up.
pub struct GridComponent<V: GridView> {
    /// Last properties supplied by the host
    props: HostProps,

    settings: Settings,

    state: BridgeState,

    view: V,

    grid_ready: bool,

    host: Box<dyn HostChannel>,

    frame: Box<dyn ComponentFrame>,

    /// Grid options with behavior bound and built-in column types merged in
    grid_options: ConfigNode,

    /// Fixed at construction; live patches never re-rank
    gradient: Arc<GradientColorEngine>,

    builder: ReturnValueBuilder,

    dispatcher: UpdateDispatcher,

    live: Option<LiveTransactionChannel>,

    /// Task moving live events onto the message channel
    live_forwarder: Option<JoinHandle<()>>,

    /// Sender half of the message channel. Clone it for input sources.
    pub msg_tx: mpsc::Sender<Message>,

    /// Receiver half of the message channel, drained by [`GridComponent::run`]
    /// or by a runner driving [`GridComponent::process_message`] itself.
    pub msg_rx: mpsc::Receiver<Message>,

    quit: bool,
}

impl<V: GridView> GridComponent<V> {
    /// Create the component for `props` around a view that is not ready yet.
    ///
    /// # Errors
    ///
    /// Fatal errors only: [`Error::RowData`] when the initial rows cannot be
    /// parsed, [`Error::Formatting`] when a conditionally formatted column
    /// has no field.
    pub fn new(
        props: HostProps,
        settings: Settings,
        view: V,
        host: Box<dyn HostChannel>,
        mut frame: Box<dyn ComponentFrame>,
        mut registry: BehaviorRegistry,
    ) -> Result<Self> {
        if !props.custom_css.is_empty() {
            frame.append_stylesheet(&stylesheet::flatten(&props.custom_css));
        }

        let state = BridgeState::initial(&props)?;

        let palette = settings.gradient.palette().unwrap_or_else(|e| {
            warn!("Invalid gradient colors in settings, using defaults: {}", e);
            GradientPalette::default()
        });
        let gradient = Arc::new(GradientColorEngine::from_grid(
            props.column_defs(),
            &state.snapshot.rows,
            palette,
        )?);

        column_types::register_gradient_style(&mut registry, Arc::clone(&gradient));
        let builtins = column_types::builtin_column_types(&registry);
        let reconstructor = BehaviorReconstructor::new(registry, props.allow_unsafe_jscode);
        let grid_options =
            column_types::merge_column_types(reconstructor.reconstruct(props.grid_options.clone()), builtins);

        frame.set_container(&ContainerLayout::from_props(&props, state.grid_height));

        let (msg_tx, msg_rx) = mpsc::channel::<Message>(settings.dispatch.channel_capacity.max(1));
        let dispatcher = UpdateDispatcher::new(props.update_on.triggers.clone(), msg_tx.clone());
        let builder = ReturnValueBuilder::new(props.data_return_mode, props.frame_dtypes.clone());

        info!(
            "Grid component created: {} row(s), {} trigger(s), mode {:?}{}",
            state.snapshot.len(),
            dispatcher.triggers().len(),
            builder.mode(),
            if props.is_manual() { ", manual update" } else { "" }
        );

        Ok(Self {
            props,
            settings,
            state,
            view,
            grid_ready: false,
            host,
            frame,
            grid_options,
            gradient,
            builder,
            dispatcher,
            live: None,
            live_forwarder: None,
            msg_tx,
            msg_rx,
            quit: false,
        })
    }

    /// Wire the view once it exists. Calling it again does nothing.
    ///
    /// Must be called from within a Tokio runtime when a live channel is
    /// configured or any trigger is debounced.
    pub fn on_grid_ready(&mut self) {
        if self.grid_ready {
            return;
        }

        if self.props.is_manual() {
            debug!("Manual update: no triggers attached");
        } else {
            self.dispatcher.attach(&mut self.view);
        }

        let msg_tx = self.msg_tx.clone();
        self.view.add_event_listener(
            FIRST_DATA_RENDERED,
            Box::new(move |_event| {
                if let Err(e) = msg_tx.try_send(Message::FirstDataRendered) {
                    warn!("Dropping first render notice: {}", e);
                }
            }),
        );

        self.view.set_grid_options(self.grid_options.clone());
        self.view.set_row_id_field(self.props.row_id_col.clone());
        self.view.set_row_data(self.state.snapshot.rows.clone());
        for index in self.props.pre_selected_rows() {
            self.view.select_index(index);
        }
        if self.props.enable_enterprise_modules {
            self.view
                .enable_enterprise_modules(self.props.license_key.as_deref());
        }
        if let Some(columns_state) = &self.props.columns_state {
            self.view.apply_column_state(columns_state, true);
        }

        self.start_live();
        self.grid_ready = true;
        info!("Grid ready");
    }

    fn start_live(&mut self) {
        let Some(url) = self
            .props
            .websocket_connection_string
            .as_deref()
            .filter(|url| !url.is_empty())
        else {
            return;
        };

        match LiveTransactionChannel::spawn(url, self.settings.live.policy()) {
            Ok((channel, mut events)) => {
                let msg_tx = self.msg_tx.clone();
                self.live_forwarder = Some(tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if msg_tx.send(Message::Live(event)).await.is_err() {
                            break;
                        }
                    }
                }));
                self.live = Some(channel);
            }
            Err(e) => error!("Live updates disabled: {}", e),
        }
    }

    /// Process one message.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned (malformed rows in a reload). Delivery
    /// failures and similar are logged.
    pub fn process_message(&mut self, msg: Message) -> Result<()> {
        let dispatches = matches!(msg, Message::TriggerFired { .. } | Message::ManualUpdate);
        match msg {
            Message::TriggerFired { key } => {
                match self.dispatcher.trigger(&key) {
                    Some(trigger) => trace!("Trigger {} fired on {}", trigger, key),
                    None => trace!("Trigger fired on {}", key),
                }
                self.dispatch();
            }
            Message::ManualUpdate => {
                debug!("Manual update requested");
                self.dispatch();
            }
            Message::FirstDataRendered => self.fit_columns(),
            Message::Live(LiveEvent::Transaction(transaction)) => {
                self.apply_live_transaction(transaction);
            }
            Message::Live(LiveEvent::StateChanged(state)) => {
                debug!("Live channel: {:?}", state);
            }
            Message::SetProps(props) => self.set_props(*props)?,
            Message::Quit => self.shutdown(),
        }
        // A trigger that met a full queue still owes the host the latest view
        if self.dispatcher.take_overflow() && !dispatches && !self.quit {
            debug!("Dispatching for trigger(s) collapsed on a full queue");
            self.dispatch();
        }
        Ok(())
    }

    /// Process messages until [`Message::Quit`].
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error.
    pub async fn run(&mut self) -> Result<()> {
        while let Some(msg) = self.msg_rx.recv().await {
            self.process_message(msg)?;
            if self.quit {
                break;
            }
        }
        Ok(())
    }

    /// Drain and process everything already queued; returns the count.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal error.
    pub fn drain_pending_messages(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.process_message(msg)?;
            count += 1;
        }
        Ok(count)
    }

    /// Take new host properties and render the result.
    ///
    /// Grid options, triggers and the live channel were fixed when the grid
    /// became ready and are not reapplied.
    ///
    /// # Errors
    ///
    /// [`Error::RowData`] when a reload carries malformed rows; the current
    /// state and view are left as they were.
    pub fn set_props(&mut self, props: HostProps) -> Result<()> {
        let next = bridge::derive_state(&self.state, &props)?;

        self.builder = ReturnValueBuilder::new(props.data_return_mode, props.frame_dtypes.clone());
        self.state = next;
        self.props = props;
        self.frame
            .set_container(&ContainerLayout::from_props(&self.props, self.state.grid_height));

        if self.grid_ready {
            self.render();
        }
        Ok(())
    }

    /// Push the current state into the view
    pub fn render(&mut self) {
        bridge::render(&self.state, &mut self.view, self.props.columns_state.as_ref());
    }

    /// Build the payload from the view as it is now
    pub fn payload(&self) -> ReturnPayload {
        self.builder.build(&self.view)
    }

    fn dispatch(&mut self) {
        if !self.grid_ready {
            debug!("Dispatch before the grid is ready, skipped");
            return;
        }
        let payload = self.payload();
        trace!("Dispatching {} row(s)", payload.row_data.len());
        if let Err(e) = self.host.set_component_value(&payload) {
            warn!("Failed to deliver payload to host: {}", e);
        }
    }

    fn fit_columns(&mut self) {
        if self.props.fit_columns_on_grid_load {
            self.view.size_columns_to_fit();
        } else {
            self.view.auto_size_all_columns();
        }
    }

    fn apply_live_transaction(&mut self, transaction: RowTransaction) {
        if !self.grid_ready {
            warn!("Live transaction before the grid is ready, dropped");
            return;
        }
        let result = self.view.apply_transaction(transaction);
        debug!(
            "Live transaction: {} added, {} updated, {} removed, {} unmatched",
            result.added, result.updated, result.removed, result.unmatched
        );
        self.frame
            .set_refresh_indicator(&refresh_label(Local::now()));
    }

    fn shutdown(&mut self) {
        self.quit = true;
        self.dispatcher.debouncer().cancel_all();
        if let Some(live) = self.live.take() {
            live.close();
        }
        if let Some(forwarder) = self.live_forwarder.take() {
            forwarder.abort();
        }
        info!("Grid component stopped");
    }

    /// Render one cell through the configured column types and formatters
    pub fn present_cell(&self, field: &str, row: &Row) -> CellPresentation {
        column_types::present_cell(&self.grid_options, field, row)
    }

    /// Every displayed row, rendered cell by cell
    pub fn present_displayed_rows(&self) -> Vec<PresentedRow> {
        let mut rows = Vec::new();
        self.view.for_each_node_after_filter_and_sort(&mut |node| {
            if let Some(data) = node.data.as_ref().filter(|_| !node.group) {
                rows.push(
                    data.keys()
                        .map(|field| (field.clone(), self.present_cell(field, data)))
                        .collect(),
                );
            }
        });
        rows
    }

    /// Get a clone of the message sender for input sources.
    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn is_grid_ready(&self) -> bool {
        self.grid_ready
    }

    pub fn props(&self) -> &HostProps {
        &self.props
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn grid_options(&self) -> &ConfigNode {
        &self.grid_options
    }

    pub fn gradient(&self) -> &GradientColorEngine {
        &self.gradient
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    pub fn live_channel(&self) -> Option<&LiveTransactionChannel> {
        self.live.as_ref()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Mutable view access, for user interaction. Events raised through it
    /// reach the attached listeners.
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }
}

impl<V: GridView> Drop for GridComponent<V> {
    fn drop(&mut self) {
        self.dispatcher.debouncer().cancel_all();
        if let Some(forwarder) = self.live_forwarder.take() {
            forwarder.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SharedFrame;
    use crate::host::{ChannelHost, MockHostChannel};
    use crate::view::memory::{FILTER_CHANGED, SELECTION_CHANGED};
    use crate::view::{ColumnFit, InMemoryGrid, RowModel};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn props(value: Value) -> HostProps {
        serde_json::from_value(value).unwrap()
    }

    fn base_props() -> Value {
        json!({
            "row_data": r#"[{"id":"a","v":10},{"id":"b","v":20},{"id":"c","v":30}]"#,
            "gridOptions": {
                "columnDefs": [
                    { "field": "id" },
                    { "field": "v", "type": ["conditionalFormat", "customNumericFormat"], "precision": 0 }
                ]
            },
            "frame_dtypes": { "id": "object", "v": "int64" },
            "update_on": ["selectionChanged"],
            "row_id_col": "id"
        })
    }

    type Harness = (
        GridComponent<InMemoryGrid>,
        mpsc::Receiver<ReturnPayload>,
        SharedFrame,
    );

    fn component(value: Value) -> Harness {
        let (host, payloads) = ChannelHost::channel(16);
        let frame = SharedFrame::new();
        let component = GridComponent::new(
            props(value),
            Settings::default(),
            InMemoryGrid::new(),
            Box::new(host),
            Box::new(frame.clone()),
            BehaviorRegistry::with_builtins(),
        )
        .unwrap();
        (component, payloads, frame)
    }

    fn ready(value: Value) -> Harness {
        let (mut component, payloads, frame) = component(value);
        component.on_grid_ready();
        component.drain_pending_messages().unwrap();
        (component, payloads, frame)
    }

    fn ids(rows: &[Row]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["id"].as_str()).collect()
    }

    #[test]
    fn test_construction_sets_up_frame_once() {
        let mut value = base_props();
        value["custom_css"] = json!({ ".x": { "color": "red" } });
        value["height"] = json!(250);
        let (mut component, _payloads, frame) = component(value.clone());

        let record = frame.snapshot();
        assert_eq!(record.stylesheets, vec![".x {color: red;}".to_string()]);
        assert_eq!(record.layout.unwrap().height.as_deref(), Some("250px"));

        value["height"] = json!(300);
        component.set_props(props(value)).unwrap();
        let record = frame.snapshot();
        assert_eq!(record.stylesheets.len(), 1);
        assert_eq!(record.layout.unwrap().height.as_deref(), Some("300px"));
    }

    #[test]
    fn test_trigger_on_full_queue_still_dispatches() {
        let mut settings = Settings::default();
        settings.dispatch.channel_capacity = 1;
        let (host, mut payloads) = ChannelHost::channel(16);
        let mut component = GridComponent::new(
            props(base_props()),
            settings,
            InMemoryGrid::new(),
            Box::new(host),
            Box::new(SharedFrame::new()),
            BehaviorRegistry::with_builtins(),
        )
        .unwrap();
        component.on_grid_ready();
        component.drain_pending_messages().unwrap();
        while payloads.try_recv().is_ok() {}

        component
            .msg_sender()
            .try_send(Message::Live(LiveEvent::StateChanged(
                gridsync_live::ConnectionState::Connected,
            )))
            .unwrap();
        component.view_mut().select_row(1).unwrap();
        assert_eq!(component.drain_pending_messages().unwrap(), 1);

        let payload = payloads.try_recv().unwrap();
        assert_eq!(ids(&payload.selected_rows), vec!["b"]);
        assert!(payloads.try_recv().is_err());
        assert!(!component.dispatcher().take_overflow());
    }

    #[test]
    fn test_flagged_column_without_field_is_fatal() {
        let (host, _rx) = ChannelHost::channel(1);
        let result = GridComponent::new(
            props(json!({
                "row_data": "[]",
                "gridOptions": { "columnDefs": [{ "type": "conditionalFormat" }] }
            })),
            Settings::default(),
            InMemoryGrid::new(),
            Box::new(host),
            Box::new(SharedFrame::new()),
            BehaviorRegistry::new(),
        );
        assert!(matches!(result, Err(Error::Formatting { .. })));
    }

    #[tokio::test]
    async fn test_grid_ready_wiring() {
        let mut value = base_props();
        value["gridOptions"]["preSelectedRows"] = json!([2]);
        value["columns_state"] = json!([{ "colId": "v", "width": 80 }]);
        value["enable_enterprise_modules"] = json!(true);
        value["license_key"] = json!("KEY");
        value["fit_columns_on_grid_load"] = json!(true);
        let (component, _payloads, _frame) = ready(value);

        let view = component.view();
        assert_eq!(ids(&view.row_data()), vec!["a", "b", "c"]);
        assert_eq!(ids(&view.selected_rows()), vec!["c"]);
        assert_eq!(view.enterprise_license(), Some(Some("KEY")));
        assert_eq!(view.column_state().get("v").unwrap().attributes["width"], json!(80));
        assert_eq!(view.column_fit(), Some(ColumnFit::SizedToFit));
        assert_eq!(view.listener_count(SELECTION_CHANGED), 1);
        assert!(component.is_grid_ready());
    }

    #[tokio::test]
    async fn test_columns_auto_size_by_default() {
        let (component, _payloads, _frame) = ready(base_props());
        assert_eq!(component.view().column_fit(), Some(ColumnFit::AutoSized));
    }

    #[tokio::test]
    async fn test_immediate_trigger_delivers_payload() {
        let (mut component, mut payloads, _frame) = ready(base_props());

        component.view_mut().select_row(1).unwrap();
        assert_eq!(component.drain_pending_messages().unwrap(), 1);

        let payload = payloads.try_recv().unwrap();
        assert_eq!(ids(&payload.row_data), vec!["a", "b", "c"]);
        assert_eq!(ids(&payload.selected_rows), vec!["b"]);
        assert_eq!(payload.selected_items[0]["rowIndex"], json!(1));
        assert_eq!(payload.original_dtypes, json!({ "id": "object", "v": "int64" }));
        assert!(payloads.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_manual_update_attaches_nothing() {
        let mut value = base_props();
        value["manual_update"] = json!(true);
        let (mut component, mut payloads, frame) = ready(value);

        assert!(frame.snapshot().layout.unwrap().manual_button);
        assert_eq!(component.view().listener_count(SELECTION_CHANGED), 0);

        component.view_mut().select_row(0).unwrap();
        component.drain_pending_messages().unwrap();
        assert!(payloads.try_recv().is_err());

        component.process_message(Message::ManualUpdate).unwrap();
        assert_eq!(ids(&payloads.try_recv().unwrap().selected_rows), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_trigger_delivers_once() {
        let mut value = base_props();
        value["update_on"] = json!([["filterChanged", 200]]);
        let (mut component, mut payloads, _frame) = ready(value);

        for _ in 0..3 {
            component.view_mut().raise(FILTER_CHANGED);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        component.drain_pending_messages().unwrap();
        assert!(payloads.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        component.drain_pending_messages().unwrap();
        assert!(payloads.try_recv().is_ok());
        assert!(payloads.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reload_replaces_rows_and_clears_selection() {
        let (mut component, _payloads, _frame) = ready(base_props());
        component.view_mut().select_row(0).unwrap();

        let mut value = base_props();
        value["row_data"] = json!(r#"[{"id":"z","v":1}]"#);
        value["reload_data"] = json!(true);
        value["clear_currently_selected_rows"] = json!(true);
        component
            .process_message(Message::SetProps(Box::new(props(value))))
            .unwrap();

        assert_eq!(ids(&component.view().row_data()), vec!["z"]);
        assert!(component.view().selected_rows().is_empty());
    }

    #[tokio::test]
    async fn test_non_reload_keeps_rows() {
        let (mut component, _payloads, _frame) = ready(base_props());
        let snapshot = Arc::clone(&component.state().snapshot);

        let mut value = base_props();
        value["row_data"] = json!("[]");
        component.set_props(props(value)).unwrap();

        assert!(Arc::ptr_eq(&snapshot, &component.state().snapshot));
        assert_eq!(component.view().row_count(), 3);
    }

    #[tokio::test]
    async fn test_bad_reload_is_fatal_and_keeps_state() {
        let (mut component, _payloads, _frame) = ready(base_props());

        let mut value = base_props();
        value["row_data"] = json!("[{");
        value["reload_data"] = json!(true);
        let err = component
            .process_message(Message::SetProps(Box::new(props(value))))
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(component.state().snapshot.len(), 3);
        assert_eq!(component.view().row_count(), 3);
    }

    #[tokio::test]
    async fn test_live_transaction_patches_and_marks_refresh() {
        let (mut component, _payloads, frame) = ready(base_props());

        let patch: Row = serde_json::from_value(json!({ "id": "b", "v": 99 })).unwrap();
        component
            .process_message(Message::Live(LiveEvent::Transaction(RowTransaction::update(
                vec![patch],
            ))))
            .unwrap();

        assert_eq!(component.view().row("b").unwrap()["v"], json!(99));
        let label = frame.snapshot().refresh_indicator.unwrap();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }

    #[tokio::test]
    async fn test_domain_is_not_recomputed_by_patches() {
        let (mut component, _payloads, _frame) = ready(base_props());
        let patch: Row = serde_json::from_value(json!({ "id": "a", "v": 5 })).unwrap();
        component
            .process_message(Message::Live(LiveEvent::Transaction(RowTransaction::update(
                vec![patch],
            ))))
            .unwrap();

        assert_eq!(component.gradient().domain().values(), &[10.0, 20.0, 30.0]);
        let row = component.view().row("a").unwrap().clone();
        assert_eq!(component.present_cell("v", &row).style, None);
    }

    #[tokio::test]
    async fn test_present_displayed_rows() {
        let (component, _payloads, _frame) = ready(base_props());
        let rows = component.present_displayed_rows();

        assert_eq!(rows.len(), 3);
        let (field, cell) = &rows[0][1];
        assert_eq!(field, "v");
        assert_eq!(cell.text, "10");
        assert_eq!(cell.style, Some(json!({ "backgroundColor": "#aa5500" })));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_logged_not_returned() {
        let mut host = MockHostChannel::new();
        host.expect_set_component_value()
            .times(1)
            .returning(|_| Err(Error::host("gone")));

        let mut component = GridComponent::new(
            props(base_props()),
            Settings::default(),
            InMemoryGrid::new(),
            Box::new(host),
            Box::new(SharedFrame::new()),
            BehaviorRegistry::with_builtins(),
        )
        .unwrap();
        component.on_grid_ready();
        component.drain_pending_messages().unwrap();

        component.view_mut().select_row(0).unwrap();
        assert!(component.drain_pending_messages().is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_before_ready_is_skipped() {
        let mut host = MockHostChannel::new();
        host.expect_set_component_value().never();

        let mut component = GridComponent::new(
            props(base_props()),
            Settings::default(),
            InMemoryGrid::new(),
            Box::new(host),
            Box::new(SharedFrame::new()),
            BehaviorRegistry::with_builtins(),
        )
        .unwrap();
        component.process_message(Message::ManualUpdate).unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_quit() {
        let (mut component, mut payloads, _frame) = ready(base_props());
        let tx = component.msg_sender();
        tx.send(Message::ManualUpdate).await.unwrap();
        tx.send(Message::Quit).await.unwrap();

        component.run().await.unwrap();

        assert!(component.should_quit());
        assert!(payloads.try_recv().is_ok());
    }
}
