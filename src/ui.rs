use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState, Wrap,
    },
};

use crate::form::FormView;
use crate::model::{Model, PopupView, UIData};
use crate::sort::SortIndicator;

pub const BORDER_SIZE: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const CHECKBOX_WIDTH: usize = 3;
pub const COLUMN_SPACING: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const CMDLINE_HEIGHT: usize = 1;

const POPUP_MIN_WIDTH: u16 = 40;
const FORM_LABEL_WIDTH: usize = 12;
const HINTS: &str = " /: search  f: filter  m/M: bounds  s: sort  space: select  n: new  ?: help ";

struct Theme {
    header: Style,
    filtered: Style,
    selected_row: Style,
    selected_cell: Style,
    checked: Style,
    error: Style,
    hint: Style,
    focused: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Style::new().bold(),
            filtered: Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            selected_row: Style::new().add_modifier(Modifier::REVERSED),
            selected_cell: Style::new().fg(Color::Black).bg(Color::Cyan),
            checked: Style::new().fg(Color::Green),
            error: Style::new().fg(Color::Red),
            hint: Style::new().fg(Color::DarkGray),
            focused: Style::new().fg(Color::Black).bg(Color::Gray),
        }
    }
}

#[derive(Default)]
pub struct TableUI {
    theme: Theme,
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    area
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, status_area, cmd_area] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
            Constraint::Length(CMDLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        self.draw_statusline(uidata, frame, status_area);
        self.draw_cmdline(uidata, frame, cmd_area);

        if let Some(form) = &uidata.form {
            self.draw_form(form, frame);
        } else if let Some(popup) = &uidata.popup {
            self.draw_popup(popup, frame);
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let counts = format!(
            " Showing {} of {} │ {} selected ",
            uidata.nrows, uidata.total, uidata.selected_count
        );
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", uidata.name)).bold())
            .title(Line::from(counts).right_aligned())
            .title_bottom(Line::from(" ?: help ").centered());

        let mut header_cells = vec![Cell::from(checkbox(uidata.all_checked))];
        header_cells.extend(uidata.table.iter().map(|c| {
            let mut style = if c.filtered { self.theme.filtered } else { self.theme.header };
            if c.indicator != SortIndicator::Unsorted {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(c.name.clone()).style(style)
        }));
        let header = Row::new(header_cells).height(TABLE_HEADER_HEIGHT as u16);

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            let checked = uidata.checked.get(ridx).copied().unwrap_or(false);
            let mut cells = vec![Cell::from(checkbox(checked)).style(if checked {
                self.theme.checked
            } else {
                Style::new()
            })];
            cells.extend(uidata.table.iter().map(|c| {
                let line = Line::from(c.data[ridx].clone());
                Cell::from(if c.numeric { line.alignment(Alignment::Right) } else { line })
            }));
            Row::new(cells)
        });

        let mut widths = vec![Constraint::Length(CHECKBOX_WIDTH as u16)];
        widths.extend(uidata.table.iter().map(|c| Constraint::Length(c.width as u16)));

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(COLUMN_SPACING as u16)
            .row_highlight_style(self.theme.selected_row)
            .cell_highlight_style(self.theme.selected_cell);

        let mut state = TableState::default();
        if nrows > 0 {
            // Column 0 is the checkbox.
            state = state
                .with_selected(Some(uidata.selected_row))
                .with_selected_column(Some(uidata.selected_column + 1));
        }
        frame.render_stateful_widget(table, area, &mut state);

        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::raw(format!(" {}", uidata.status_message))];
        if !uidata.filter_summary.is_empty() {
            let used = uidata.status_message.chars().count() + 1;
            let summary = format!("filter: {} ", uidata.filter_summary);
            let pad = (area.width as usize).saturating_sub(used + summary.chars().count());
            spans.push(Span::raw(" ".repeat(pad)));
            spans.push(Span::styled(summary, self.theme.filtered));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        match uidata.prompt {
            Some(mode) if uidata.form.is_none() => {
                let label = mode.label();
                let label_width = label.chars().count();
                let (visible, cursor) = uidata
                    .cmdinput
                    .window((area.width as usize).saturating_sub(label_width));
                frame.render_widget(Paragraph::new(format!("{label}{visible}")), area);
                frame.set_cursor_position(Position::new(
                    area.x + (label_width + cursor) as u16,
                    area.y,
                ));
            }
            _ => {
                frame.render_widget(Paragraph::new(HINTS).style(self.theme.hint), area);
            }
        }
    }

    fn draw_popup(&self, popup: &PopupView, frame: &mut Frame) {
        let area = frame.area();
        let widest = popup
            .lines
            .iter()
            .map(|l| l.chars().count())
            .chain(std::iter::once(popup.title.chars().count()))
            .max()
            .unwrap_or(0) as u16;
        let width = std::cmp::min(std::cmp::max(widest + 4, POPUP_MIN_WIDTH), area.width);
        let height = std::cmp::min(popup.lines.len() as u16 + 2, area.height);
        let popup_area = centered(area, width, height);

        let block = Block::bordered()
            .title(Line::from(popup.title.clone()).bold().centered())
            .title_bottom(Line::from(" esc: close ").centered());
        let text: Vec<Line> = popup.lines.iter().map(|l| Line::from(format!(" {l}"))).collect();

        frame.render_widget(Clear, popup_area);
        frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), popup_area);
    }

    fn draw_form(&self, form: &FormView, frame: &mut Frame) {
        let area = frame.area();
        let mut lines = Vec::new();
        let mut cursor = None;
        let value_width = (POPUP_MIN_WIDTH as usize + 10).saturating_sub(FORM_LABEL_WIDTH + 4);

        for row in form.rows.iter() {
            let marker = if row.required { "*" } else { " " };
            let label = format!(" {:<w$}{marker} ", row.label, w = FORM_LABEL_WIDTH - 1);
            let value = format!("{:<value_width$}", row.value);
            let style = if row.focused { self.theme.focused } else { Style::new() };
            if let Some(pos) = row.cursor {
                cursor = Some((lines.len(), label.chars().count() + pos));
            }
            lines.push(Line::from(vec![Span::raw(label), Span::styled(value, style)]));
            if let Some(error) = &row.error {
                lines.push(Line::from(Span::styled(
                    format!(" {:w$}{error}", "", w = FORM_LABEL_WIDTH + 1),
                    self.theme.error,
                )));
            }
        }
        lines.push(Line::from(""));
        let footer = if form.submit_enabled {
            Line::from(" tab: next field  ←/→: change choice  enter: save  esc: close")
                .style(self.theme.hint)
        } else {
            Line::from(" Saving ...").style(self.theme.hint)
        };
        lines.push(footer);

        let width = std::cmp::min((FORM_LABEL_WIDTH + value_width + 6) as u16, area.width);
        let height = std::cmp::min(lines.len() as u16 + 2, area.height);
        let form_area = centered(area, width, height);

        frame.render_widget(Clear, form_area);
        frame.render_widget(
            Paragraph::new(lines).block(Block::bordered().title(Line::from(form.title.clone()).bold())),
            form_area,
        );
        if let Some((line, column)) = cursor {
            frame.set_cursor_position(Position::new(
                form_area.x + 1 + column as u16,
                form_area.y + 1 + line as u16,
            ));
        }
    }
}
