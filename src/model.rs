use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::dataset::{Dataset, DatasetStore, Record};
use crate::domain::{HELP_TEXT, Message, TVConfig, TVError};
use crate::export::{ExportOptions, SpreadsheetEncoder, XlsxEncoder, export_view};
use crate::inputter::{InputResult, Inputter};
use crate::loader;
use crate::metrics::{PIXELS_PER_LINE, RowMetrics, lines_for};
use crate::ui::{CMDLINE_HEIGHT, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};
use crate::view::{FilterPredicate, SortDirection, ViewConfig, compute_view};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    PICKER,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub name: String,
    pub width: usize,
    pub sort: Option<SortDirection>,
    pub filter: Option<FilterPredicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    /// Position in the visible row set.
    pub index: usize,
    pub lines: u16,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickerView {
    pub items: Vec<(String, bool)>,
    pub curser: usize,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT),
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    /// Height of the table body in pixels.
    pub fn viewport(&self) -> u64 {
        self.table_height as u64 * u64::from(PIXELS_PER_LINE)
    }
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub loaded: bool,
    pub header: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: Option<usize>,
    pub show_popup: bool,
    pub popup_message: String,
    pub picker: Option<PickerView>,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub cmd_prompt: String,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            loaded: false,
            header: Vec::new(),
            rows: Vec::new(),
            nrows: 0,
            total_rows: 0,
            selected_row: 0,
            selected_column: None,
            show_popup: false,
            popup_message: String::new(),
            picker: None,
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            cmd_prompt: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: TVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: DatasetStore,
    name: String,
    view: ViewConfig,
    rows: Arc<Vec<usize>>, // Visible row set, indices into the dataset records
    metrics: RowMetrics,
    column_widths: HashMap<String, usize>,
    visible_columns: Vec<usize>, // Positions in the column selection that fit on screen
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    offset_column: usize,
    picker_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    last_input: InputResult,
    cmd_field: Option<String>,
    view_before_input: Option<ViewConfig>,
    encoder: Box<dyn SpreadsheetEncoder>,
    export_options: ExportOptions,
    status_message: String,
}

impl Model {
    pub fn init(config: &TVConfig, ui_width: usize, ui_height: usize) -> Result<Self, TVError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store: DatasetStore::default(),
            name: String::new(),
            view: ViewConfig::default(),
            rows: Arc::new(Vec::new()),
            metrics: RowMetrics::default(),
            column_widths: HashMap::new(),
            visible_columns: Vec::new(),
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            offset_column: 0,
            picker_row: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_field: None,
            view_before_input: None,
            encoder: Box::new(XlsxEncoder),
            export_options: ExportOptions::from_config(config),
            status_message: "Started tabx!".to_string(),
        };
        model.update_table_data();
        Ok(model)
    }

    pub fn with_encoder(mut self, encoder: Box<dyn SpreadsheetEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export_options = options;
        self
    }

    pub fn load_data_file(&mut self, path: PathBuf) -> Result<(), TVError> {
        let table = loader::load_file(&path, self.config.separator_byte()?)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        self.load_records(name, table.records, table.fields)
    }

    /// Replace the dataset. On error the current dataset and view stay as they are.
    pub fn load_records(
        &mut self,
        name: String,
        records: Vec<Record>,
        fields: Vec<String>,
    ) -> Result<(), TVError> {
        let start_time = Instant::now();
        let dataset = self.store.load(records, fields)?;

        self.name = name;
        self.view = ViewConfig::for_dataset(&dataset);
        self.column_widths = dataset.max_widths();
        self.curser_row = 0;
        self.offset_row = 0;
        self.curser_column = 0;
        self.offset_column = 0;
        self.picker_row = 0;
        self.recompute();
        self.set_status_message(format!(
            "Loaded {} rows in {}ms ...",
            dataset.len(),
            start_time.elapsed().as_millis()
        ));
        Ok(())
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.store.current()
    }

    pub fn view_config(&self) -> &ViewConfig {
        &self.view
    }

    pub fn visible_rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn row_metrics(&self) -> &RowMetrics {
        &self.metrics
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn current_field(&self) -> Option<String> {
        self.view.selected().get(self.curser_column).cloned()
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    /// Apply a new view config and rebuild everything derived from it.
    fn set_view(&mut self, view: ViewConfig) {
        self.view = view;
        self.recompute();
    }

    // Derived state is rebuilt from scratch, never patched.
    fn recompute(&mut self) {
        let Some(dataset) = self.store.current() else {
            self.update_table_data();
            return;
        };
        let start_time = Instant::now();
        let rows = compute_view(dataset, &self.view);
        self.metrics = RowMetrics::build(dataset, &rows, self.view.selected());
        self.rows = Arc::new(rows);
        debug!(
            "Recomputed view with {} rows in {}ms",
            self.rows.len(),
            start_time.elapsed().as_millis()
        );

        self.curser_row = self.curser_row.min(self.rows.len().saturating_sub(1));
        self.offset_row = self.offset_row.min(self.curser_row);
        self.offset_row =
            self.metrics
                .scroll_to(self.offset_row, self.curser_row, self.uilayout.viewport());
        self.curser_column = self
            .curser_column
            .min(self.view.selected().len().saturating_sub(1));
        self.update_table_data();
    }

    fn column_width(&self, field: &str) -> usize {
        // Two extra characters for the sort marker.
        let widest = self
            .column_widths
            .get(field)
            .copied()
            .unwrap_or(0)
            .max(field.chars().count() + 2);
        std::cmp::min(widest + COLUMN_WIDTH_MARGIN, self.config.max_column_width.max(1))
    }

    /// Selected columns starting at `offset_column` that fit into the table width.
    fn fit_columns(&self, offset_column: usize) -> Vec<(usize, usize)> {
        let mut fitted = Vec::new();
        let mut used = 0;
        let table_width = self.uilayout.table_width;
        for (cidx, field) in self.view.selected().iter().enumerate().skip(offset_column) {
            let width = self.column_width(field);
            if used + width + 1 <= table_width {
                fitted.push((cidx, width));
                used += width + 1;
            } else {
                // Add the last partial visible column
                if used < table_width {
                    fitted.push((cidx, table_width - used));
                }
                break;
            }
        }
        fitted
    }

    fn ensure_column_visible(&mut self) {
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        while self.offset_column < self.curser_column {
            let fitted = self.fit_columns(self.offset_column);
            // The cursor column has to be fully visible, not only the partial last one.
            let fully = fitted.iter().any(|&(cidx, w)| {
                cidx == self.curser_column && w == self.column_width(&self.view.selected()[cidx])
            });
            if fully {
                break;
            }
            self.offset_column += 1;
        }
    }

    fn update_table_data(&mut self) {
        let Some(dataset) = self.store.current().cloned() else {
            self.uidata = UIData::empty();
            self.uidata.layout = self.uilayout.clone();
            self.uidata.status_message = self.status_message.clone();
            return;
        };

        self.ensure_column_visible();
        let fitted = self.fit_columns(self.offset_column);
        self.visible_columns = fitted.iter().map(|&(cidx, _)| cidx).collect();

        let selected = self.view.selected();
        let header: Vec<HeaderView> = fitted
            .iter()
            .map(|&(cidx, width)| {
                let name = &selected[cidx];
                HeaderView {
                    name: name.clone(),
                    width,
                    sort: self
                        .view
                        .sort()
                        .filter(|s| &s.field == name)
                        .map(|s| s.direction),
                    filter: self.view.filter(name).cloned(),
                }
            })
            .collect();

        let range = self
            .metrics
            .visible_range(self.offset_row, self.uilayout.viewport());
        let records = dataset.records();
        let rows: Vec<RowView> = range
            .filter_map(|vidx| {
                let record = records.get(*self.rows.get(vidx)?)?;
                let lines = lines_for(self.metrics.height(vidx)?);
                let cells = fitted
                    .iter()
                    .map(|&(cidx, width)| wrap_cell(record.get(&selected[cidx]), width, lines))
                    .collect();
                Some(RowView {
                    index: vidx,
                    lines,
                    cells,
                })
            })
            .collect();

        trace!(
            "Table: Cr {}, Or {}, Cc {}, Oc {}, rows drawn {}, columns drawn {}",
            self.curser_row,
            self.offset_row,
            self.curser_column,
            self.offset_column,
            rows.len(),
            header.len()
        );

        let selected_column = self
            .visible_columns
            .iter()
            .position(|&c| c == self.curser_column);
        let picker = (self.modus == Modus::PICKER).then(|| PickerView {
            items: dataset
                .fields()
                .iter()
                .map(|f| (f.clone(), self.view.is_selected(f)))
                .collect(),
            curser: self.picker_row,
        });

        self.uidata = UIData {
            name: self.name.clone(),
            loaded: true,
            header,
            rows,
            nrows: self.rows.len(),
            total_rows: dataset.len(),
            selected_row: self.curser_row,
            selected_column,
            show_popup: self.modus == Modus::POPUP,
            popup_message: if self.modus == Modus::POPUP {
                HELP_TEXT.to_string()
            } else {
                String::new()
            },
            picker,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.modus == Modus::CMDINPUT,
            cmd_prompt: self.cmd_prompt(),
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }

    fn cmd_prompt(&self) -> String {
        match &self.cmd_field {
            Some(field) => {
                let predicate = self.view.filter_for(field);
                let case = if predicate.case_sensitive {
                    "case sensitive"
                } else {
                    "ignore case"
                };
                format!("Filter {field} ({}, {case}): ", predicate.match_mode)
            }
            None => String::new(),
        }
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.offset_row =
            self.metrics
                .scroll_to(self.offset_row, self.curser_row, self.uilayout.viewport());
        self.update_table_data();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MovePageDown => self.move_table_selection_down(self.page_size()),
                    Message::MovePageUp => self.move_table_selection_up(self.page_size()),
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::CycleSort => self.cycle_sort_current_column(),
                    Message::Filter => self.enter_filter_input(),
                    Message::CycleMatchMode => self.cycle_match_mode(),
                    Message::ToggleCaseSensitive => self.toggle_case_sensitive(),
                    Message::ColumnPicker => self.enter_column_picker(),
                    Message::Export => self.export(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::PICKER => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_picker(1),
                    Message::MoveUp => self.move_picker(-1),
                    Message::ToggleColumn | Message::Enter => self.toggle_picker_column(),
                    Message::Exit | Message::ColumnPicker => self.exit(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::PICKER | Modus::POPUP => {
                trace!("Leaving {:?} ...", self.modus);
                self.modus = if self.previous_modus == self.modus {
                    Modus::TABLE
                } else {
                    self.previous_modus
                };
                self.previous_modus = Modus::TABLE;
                self.update_table_data();
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.update_table_data();
    }

    fn page_size(&self) -> usize {
        self.metrics
            .visible_range(self.offset_row, self.uilayout.viewport())
            .len()
            .max(1)
    }

    fn scroll_to_cursor(&mut self) {
        self.offset_row =
            self.metrics
                .scroll_to(self.offset_row, self.curser_row, self.uilayout.viewport());
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        if self.rows.is_empty() {
            return;
        }
        self.curser_row = std::cmp::min(self.curser_row + size, self.rows.len() - 1);
        self.scroll_to_cursor();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.scroll_to_cursor();
    }

    fn move_table_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        self.curser_row = self.rows.len().saturating_sub(1);
        self.scroll_to_cursor();
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.view.selected().len() {
            self.curser_column += 1;
            self.update_table_data();
        }
    }

    fn cycle_sort_current_column(&mut self) {
        let Some(field) = self.current_field() else {
            return;
        };
        let view = self.view.cycle_sort(&field);
        let message = match view.sort().map(|s| s.direction) {
            Some(SortDirection::Ascending) => format!("Sorted by {field} ascending"),
            Some(SortDirection::Descending) => format!("Sorted by {field} descending"),
            None => "Sorting disabled".to_string(),
        };
        self.set_view(view);
        self.set_status_message(message);
    }

    fn cycle_match_mode(&mut self) {
        let Some(field) = self.current_field() else {
            return;
        };
        self.set_view(self.view.cycle_match_mode(&field));
        let mode = self.view.filter_for(&field).match_mode;
        self.set_status_message(format!("Filter {field}: {mode}"));
    }

    fn toggle_case_sensitive(&mut self) {
        let Some(field) = self.current_field() else {
            return;
        };
        self.set_view(self.view.toggle_case_sensitive(&field));
        let message = if self.view.filter_for(&field).case_sensitive {
            format!("Filter {field}: case sensitive")
        } else {
            format!("Filter {field}: ignore case")
        };
        self.set_status_message(message);
    }

    fn enter_filter_input(&mut self) {
        let Some(field) = self.current_field() else {
            return;
        };
        trace!("Editing filter of {field} ...");
        self.input.set(&self.view.filter_for(&field).pattern);
        self.last_input = self.input.get();
        self.view_before_input = Some(self.view.clone());
        self.cmd_field = Some(field);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.update_table_data();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let Some(field) = self.cmd_field.clone() else {
            return;
        };
        self.last_input = self.input.read(key);

        // The filter follows every keystroke.
        if self.last_input.canceled {
            if let Some(view) = self.view_before_input.take() {
                self.set_view(view);
            }
        } else {
            self.set_view(self.view.with_filter_pattern(&field, &self.last_input.input));
        }

        if self.last_input.finished {
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::TABLE;
            self.cmd_field = None;
            self.view_before_input = None;
            let message = if self.last_input.canceled {
                "Filter unchanged".to_string()
            } else {
                format!("{} of {} rows match", self.rows.len(), self.total_rows())
            };
            self.input.clear();
            self.last_input = InputResult::default();
            self.set_status_message(message);
            self.update_table_data();
        }
    }

    fn total_rows(&self) -> usize {
        self.store.current().map(|d| d.len()).unwrap_or(0)
    }

    fn enter_column_picker(&mut self) {
        if self.store.current().is_none() {
            return;
        }
        self.previous_modus = self.modus;
        self.modus = Modus::PICKER;
        self.update_table_data();
    }

    fn move_picker(&mut self, step: i32) {
        let nfields = self.store.current().map(|d| d.fields().len()).unwrap_or(0);
        if nfields == 0 {
            return;
        }
        self.picker_row = if step < 0 {
            self.picker_row.saturating_sub(step.unsigned_abs() as usize)
        } else {
            std::cmp::min(self.picker_row + step as usize, nfields - 1)
        };
        self.update_table_data();
    }

    fn toggle_picker_column(&mut self) {
        let Some(field) = self
            .store
            .current()
            .and_then(|d| d.fields().get(self.picker_row).cloned())
        else {
            return;
        };
        self.set_view(self.view.toggle_column(&field));
        let state = if self.view.is_selected(&field) {
            "shown"
        } else {
            "hidden"
        };
        self.set_status_message(format!("Column {field} {state}"));
    }

    fn export(&mut self) {
        let Some(dataset) = self.store.current().cloned() else {
            return;
        };
        if self.rows.is_empty() {
            self.set_status_message("No rows to export");
            return;
        }
        match export_view(
            self.encoder.as_ref(),
            &dataset,
            &self.rows,
            self.view.selected(),
            &self.export_options,
            Utc::now(),
        ) {
            Ok(path) => {
                info!("Export written to {}", path.display());
                self.set_status_message(format!(
                    "Exported {} rows to {}",
                    self.rows.len(),
                    path.display()
                ));
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }
}

/// Fit a cell value into `lines` lines of `width` characters.
fn wrap_cell(value: &str, width: usize, lines: u16) -> String {
    if width == 0 {
        return String::new();
    }
    let flat = value.replace("\r\n", " ↵ ").replace('\n', " ↵ ");
    let chars: Vec<char> = flat.chars().collect();
    let capacity = width * lines as usize;
    let mut out: Vec<String> = chars
        .chunks(width)
        .take(lines as usize)
        .map(|c| c.iter().collect())
        .collect();
    if chars.len() > capacity
        && let Some(last) = out.last_mut()
    {
        last.pop();
        last.push('…');
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportTable, FileName};
    use crate::view::MatchMode;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::sync::Mutex;

    fn cities() -> (Vec<Record>, Vec<String>) {
        let rows = [
            ("Vienna", "AT", "1.9M"),
            ("Graz", "AT", "0.3M"),
            ("Berlin", "DE", "3.6M"),
            ("Bern", "CH", "0.1M"),
        ];
        let records = rows
            .iter()
            .map(|(c, cc, p)| Record::from_iter([("city", *c), ("cc", *cc), ("pop", *p)]))
            .collect();
        (records, vec!["city".into(), "cc".into(), "pop".into()])
    }

    fn model() -> Model {
        let mut m = Model::init(&TVConfig::new("cities.csv"), 80, 24).unwrap();
        let (records, fields) = cities();
        m.load_records("cities.csv".into(), records, fields).unwrap();
        m
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn cities_in_view(m: &Model) -> Vec<String> {
        let ds = m.dataset().unwrap();
        ds.rows(m.visible_rows())
            .map(|r| r.get("city").to_string())
            .collect()
    }

    #[test]
    fn load_selects_all_columns() {
        let m = model();
        assert_eq!(m.view_config().selected(), ["city", "cc", "pop"]);
        assert_eq!(m.visible_rows(), [0, 1, 2, 3]);
        let ui = m.get_uidata();
        assert_eq!(ui.nrows, 4);
        assert_eq!(ui.header.len(), 3);
        assert_eq!(ui.rows.len(), 4);
        assert_eq!(ui.rows[0].lines, 2);
    }

    #[test]
    fn failed_load_keeps_view() {
        let mut m = model();
        m.update(Some(Message::CycleSort)).unwrap();
        let before = m.visible_rows().to_vec();
        assert!(m.load_records("empty".into(), vec![], vec![]).is_err());
        assert_eq!(m.visible_rows(), before);
        assert_eq!(m.get_uidata().name, "cities.csv");
    }

    #[test]
    fn sort_cycles_on_current_column() {
        let mut m = model();
        m.update(Some(Message::CycleSort)).unwrap();
        assert_eq!(cities_in_view(&m), ["Berlin", "Bern", "Graz", "Vienna"]);
        m.update(Some(Message::CycleSort)).unwrap();
        assert_eq!(cities_in_view(&m), ["Vienna", "Graz", "Bern", "Berlin"]);
        m.update(Some(Message::CycleSort)).unwrap();
        assert_eq!(cities_in_view(&m), ["Vienna", "Graz", "Berlin", "Bern"]);

        m.update(Some(Message::MoveRight)).unwrap();
        m.update(Some(Message::CycleSort)).unwrap();
        assert_eq!(
            m.view_config().sort().map(|s| s.field.as_str()),
            Some("cc")
        );
        assert_eq!(m.get_uidata().header[1].sort, Some(SortDirection::Ascending));
    }

    #[test]
    fn filter_follows_typing_and_escape_restores() {
        let mut m = model();
        m.update(Some(Message::Filter)).unwrap();
        assert!(m.raw_keyevents());
        m.update(Some(key(KeyCode::Char('b')))).unwrap();
        assert_eq!(cities_in_view(&m), ["Berlin", "Bern"]);
        m.update(Some(key(KeyCode::Char('e')))).unwrap();
        m.update(Some(key(KeyCode::Char('r')))).unwrap();
        m.update(Some(key(KeyCode::Char('n')))).unwrap();
        assert_eq!(cities_in_view(&m), ["Bern"]);

        m.update(Some(key(KeyCode::Esc))).unwrap();
        assert!(!m.raw_keyevents());
        assert_eq!(m.visible_rows().len(), 4);
        assert!(m.view_config().filter("city").is_none());
    }

    #[test]
    fn filter_modes_from_keys() {
        let mut m = model();
        m.update(Some(Message::CycleMatchMode)).unwrap();
        m.update(Some(Message::Filter)).unwrap();
        for c in "graz".chars() {
            m.update(Some(key(KeyCode::Char(c)))).unwrap();
        }
        m.update(Some(key(KeyCode::Enter))).unwrap();
        assert_eq!(cities_in_view(&m), ["Graz"]);
        assert_eq!(
            m.view_config().filter_for("city"),
            FilterPredicate::new(MatchMode::Exact, false, "graz")
        );

        m.update(Some(Message::ToggleCaseSensitive)).unwrap();
        assert!(m.visible_rows().is_empty());
        assert_eq!(m.get_uidata().nrows, 0);
        assert!(m.get_uidata().rows.is_empty());
    }

    #[test]
    fn clearing_the_pattern_keeps_mode_and_case() {
        let mut m = Model::init(&TVConfig::new("g.csv"), 80, 24).unwrap();
        let records = vec![
            Record::from_iter([("city", "Graz")]),
            Record::from_iter([("city", "Grazer")]),
        ];
        m.load_records("g.csv".into(), records, vec!["city".into()])
            .unwrap();
        m.update(Some(Message::CycleMatchMode)).unwrap();
        m.update(Some(Message::ToggleCaseSensitive)).unwrap();

        m.update(Some(Message::Filter)).unwrap();
        m.update(Some(key(KeyCode::Char('x')))).unwrap();
        m.update(Some(key(KeyCode::Backspace))).unwrap();
        assert_eq!(
            m.view_config().filter_for("city"),
            FilterPredicate::new(MatchMode::Exact, true, "")
        );
        assert_eq!(m.visible_rows(), [0, 1]);

        for c in "graz".chars() {
            m.update(Some(key(KeyCode::Char(c)))).unwrap();
        }
        m.update(Some(key(KeyCode::Enter))).unwrap();
        assert_eq!(
            m.view_config().filter_for("city"),
            FilterPredicate::new(MatchMode::Exact, true, "graz")
        );
        assert!(m.visible_rows().is_empty());
    }

    #[test]
    fn picker_hides_column_and_its_filter() {
        let mut m = model();
        m.update(Some(Message::MoveRight)).unwrap();
        m.update(Some(Message::Filter)).unwrap();
        for c in "de".chars() {
            m.update(Some(key(KeyCode::Char(c)))).unwrap();
        }
        m.update(Some(key(KeyCode::Enter))).unwrap();
        assert_eq!(cities_in_view(&m), ["Berlin"]);

        m.update(Some(Message::ColumnPicker)).unwrap();
        assert!(m.get_uidata().picker.is_some());
        m.update(Some(Message::MoveDown)).unwrap();
        m.update(Some(Message::ToggleColumn)).unwrap();
        assert_eq!(m.view_config().selected(), ["city", "pop"]);
        assert_eq!(m.visible_rows().len(), 4);
        m.update(Some(Message::Exit)).unwrap();
        assert!(m.get_uidata().picker.is_none());
        assert_eq!(m.get_uidata().header.len(), 2);
    }

    #[test]
    fn removing_every_column_is_allowed() {
        let mut m = model();
        m.update(Some(Message::ColumnPicker)).unwrap();
        for _ in 0..3 {
            m.update(Some(Message::ToggleColumn)).unwrap();
            m.update(Some(Message::MoveDown)).unwrap();
        }
        assert!(m.view_config().selected().is_empty());
        m.update(Some(Message::Exit)).unwrap();
        m.update(Some(Message::CycleSort)).unwrap();
        assert!(m.get_uidata().header.is_empty());
        assert_eq!(m.get_uidata().selected_column, None);
    }

    #[test]
    fn tall_rows_scroll_by_pixels() {
        let mut m = Model::init(&TVConfig::new("t.csv"), 80, 9).unwrap();
        let records = (0..10)
            .map(|i| {
                let text = "x".repeat(if i % 2 == 0 { 0 } else { 120 });
                Record::from_iter([("id", i.to_string()), ("text", text)])
            })
            .collect();
        m.load_records("t.csv".into(), records, vec!["id".into(), "text".into()])
            .unwrap();
        // 6 body lines = 120px: a 40px row and a 80px row.
        assert_eq!(m.get_uidata().rows.len(), 2);
        assert_eq!(m.get_uidata().rows[1].lines, 4);

        m.update(Some(Message::MoveDown)).unwrap();
        m.update(Some(Message::MoveDown)).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.selected_row, 2);
        assert!(ui.rows.iter().any(|r| r.index == 2));

        m.update(Some(Message::MoveEnd)).unwrap();
        let ui = m.get_uidata();
        assert_eq!(ui.selected_row, 9);
        assert_eq!(ui.rows.last().map(|r| r.index), Some(9));

        m.update(Some(Message::MoveBeginning)).unwrap();
        assert_eq!(m.get_uidata().rows[0].index, 0);
    }

    #[test]
    fn heights_follow_selection() {
        let mut m = model();
        let long = "y".repeat(60);
        let records = vec![Record::from_iter([("a", "x"), ("b", long.as_str())])];
        m.load_records("w.csv".into(), records, vec!["a".into(), "b".into()])
            .unwrap();
        assert_eq!(m.row_metrics().height(0), Some(60));
        m.update(Some(Message::ColumnPicker)).unwrap();
        m.update(Some(Message::MoveDown)).unwrap();
        m.update(Some(Message::ToggleColumn)).unwrap();
        assert_eq!(m.row_metrics().height(0), Some(40));
    }

    struct Capture(Arc<Mutex<Vec<ExportTable>>>);

    impl SpreadsheetEncoder for Capture {
        fn encode(&self, table: &ExportTable) -> Result<Vec<u8>, TVError> {
            self.0.lock().unwrap().push(table.clone());
            Ok(Vec::new())
        }
    }

    #[test]
    fn export_writes_current_view() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let dir = std::env::temp_dir().join(format!("tabx-model-{}", std::process::id()));
        let mut m = model()
            .with_encoder(Box::new(Capture(Arc::clone(&captured))))
            .with_export_options(
                ExportOptions::default()
                    .with_directory(dir.clone())
                    .with_file_name(FileName::Fixed("out.xlsx".into())),
            );
        m.update(Some(Message::CycleSort)).unwrap();
        m.update(Some(Message::CycleSort)).unwrap();
        m.update(Some(Message::Export)).unwrap();

        let tables = captured.lock().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].header, ["city", "cc", "pop"]);
        assert_eq!(tables[0].rows[0], ["Vienna", "AT", "1.9M"]);
        assert!(m.get_uidata().status_message.starts_with("Exported 4 rows"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn empty_view_is_not_exported() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut m = model().with_encoder(Box::new(Capture(Arc::clone(&captured))));
        m.update(Some(Message::Filter)).unwrap();
        for c in "zzz".chars() {
            m.update(Some(key(KeyCode::Char(c)))).unwrap();
        }
        m.update(Some(key(KeyCode::Enter))).unwrap();
        m.update(Some(Message::Export)).unwrap();
        assert!(captured.lock().unwrap().is_empty());
        assert_eq!(m.get_uidata().status_message, "No rows to export");
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut m = model();
        m.update(Some(Message::Help)).unwrap();
        assert!(m.get_uidata().show_popup);
        m.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(m.get_uidata().selected_row, 0);
        m.update(Some(Message::Exit)).unwrap();
        assert!(!m.get_uidata().show_popup);
        m.update(Some(Message::Quit)).unwrap();
        assert_eq!(m.status, Status::QUITTING);
    }

    #[test]
    fn wrapping_cells() {
        assert_eq!(wrap_cell("abcdef", 3, 2), "abc\ndef");
        assert_eq!(wrap_cell("abcdefg", 3, 2), "abc\nde…");
        assert_eq!(wrap_cell("a\nb", 10, 2), "a ↵ b");
        assert_eq!(wrap_cell("abc", 0, 2), "");
        assert_eq!(wrap_cell("", 3, 2), "");
    }
}
