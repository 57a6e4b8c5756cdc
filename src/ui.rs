use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Table,
    },
};

use crate::model::{HeaderView, Model, RowView, UIData};
use crate::view::{MatchMode, SortDirection};

pub const CMDLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const NO_RESULTS: &str = "No results found";

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(CMDLINE_HEIGHT as u16)])
                .areas(frame.area());
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(table_area);

        if uidata.loaded {
            self.draw_table(uidata, frame, table_area);
            self.draw_scrollbar(uidata, frame, scrollbar_area);
        }
        self.draw_statusline(uidata, frame, status_area);

        if let Some(picker) = &uidata.picker {
            let area = popup_area(frame.area(), 50, 60);
            let items: Vec<ListItem> = picker
                .items
                .iter()
                .map(|(name, selected)| {
                    let mark = if *selected { "[x] " } else { "[ ] " };
                    ListItem::new(format!("{mark}{name}"))
                })
                .collect();
            let list = List::new(items)
                .block(Block::bordered().title(" Columns (space toggles, esc closes) "))
                .highlight_style(Style::new().add_modifier(Modifier::REVERSED));
            let mut state = ListState::default().with_selected(Some(picker.curser));
            frame.render_widget(Clear, area);
            frame.render_stateful_widget(list, area, &mut state);
        }

        if uidata.show_popup {
            let area = popup_area(frame.area(), 60, 70);
            let popup = Paragraph::new(uidata.popup_message.as_str())
                .block(Block::bordered().title(" Help "));
            frame.render_widget(Clear, area);
            frame.render_widget(popup, area);
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.header.iter().map(header_cell))
            .height(TABLE_HEADER_HEIGHT as u16)
            .style(Style::new().bold().fg(Color::Yellow));
        let widths: Vec<Constraint> = uidata
            .header
            .iter()
            .map(|h| Constraint::Length(h.width as u16))
            .collect();
        let rows = uidata
            .rows
            .iter()
            .map(|r| self.table_row(uidata, r));
        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, area);

        if uidata.nrows == 0 {
            let [_, body] = Layout::vertical([
                Constraint::Length(TABLE_HEADER_HEIGHT as u16),
                Constraint::Min(0),
            ])
            .areas(area);
            let message = Paragraph::new(NO_RESULTS).centered().italic();
            frame.render_widget(message, body);
        }
    }

    fn table_row<'a>(&self, uidata: &UIData, row: &'a RowView) -> Row<'a> {
        let selected_row = row.index == uidata.selected_row;
        let cells = row.cells.iter().enumerate().map(|(cidx, value)| {
            let cell = Cell::from(Text::from(value.as_str()));
            if selected_row && uidata.selected_column == Some(cidx) {
                cell.bold().underlined()
            } else {
                cell
            }
        });
        let style = if selected_row {
            Style::new().add_modifier(Modifier::REVERSED)
        } else if row.index % 2 == 1 {
            Style::new().bg(Color::Indexed(236))
        } else {
            Style::new()
        };
        Row::new(cells).height(row.lines).style(style)
    }

    fn draw_scrollbar(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut state = ScrollbarState::new(uidata.nrows).position(uidata.selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = uidata.cmd_prompt.as_str();
            let line = Line::from(vec![
                Span::from(prompt).bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let position = if uidata.nrows == 0 {
            format!("0/0 ({} total)", uidata.total_rows)
        } else {
            format!(
                "{}/{} ({} total)",
                uidata.selected_row + 1,
                uidata.nrows,
                uidata.total_rows
            )
        };
        let left = Line::from(vec![
            Span::from(format!(" {} ", uidata.name)).reversed(),
            Span::from(format!(" {position} ")),
        ]);
        let [left_area, right_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Min(0)]).areas(area);
        frame.render_widget(Paragraph::new(left), left_area);
        frame.render_widget(
            Paragraph::new(uidata.status_message.as_str()).right_aligned(),
            right_area,
        );
    }
}

fn header_cell(header: &HeaderView) -> Cell<'_> {
    let marker = match header.sort {
        Some(SortDirection::Ascending) => " ▲",
        Some(SortDirection::Descending) => " ▼",
        None => "",
    };
    let filter = header
        .filter
        .as_ref()
        .filter(|f| !f.is_empty())
        .map(|f| {
            let mode = match f.match_mode {
                MatchMode::Contains => '~',
                MatchMode::Exact => '=',
                MatchMode::StartsWith => '^',
            };
            let case = if f.case_sensitive { "" } else { "i" };
            format!("{mode}{case} {}", f.pattern)
        })
        .unwrap_or_default();
    Cell::from(Text::from(vec![
        Line::from(format!("{}{marker}", header.name)),
        Line::from(filter).italic(),
    ]))
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
