use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::theme::Theme;
use crate::util::unicode;

/// What a key press did to the picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Continue,
    Chosen,
    Cancelled,
}

/// Choose one of N items by typing part of its label.
///
/// Filtering is a case-insensitive subsequence match, so `prj` finds
/// `Projects`. The item order is kept among matches.
pub struct Picker<T> {
    title: String,
    items: Vec<T>,
    labels: Vec<String>,
    query: String,
    filtered: Vec<usize>,
    cursor: usize,
}

impl<T> Picker<T> {
    pub fn new(title: impl Into<String>, items: Vec<T>, label: impl Fn(&T) -> String) -> Self {
        let labels = items.iter().map(label).collect();
        let filtered = (0..items.len()).collect();
        Picker {
            title: title.into(),
            items,
            labels,
            query: String::new(),
            filtered,
            cursor: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Labels of the items that match the current query.
    pub fn visible_labels(&self) -> Vec<&str> {
        self.filtered.iter().map(|&i| self.labels[i].as_str()).collect()
    }

    pub fn selected(&self) -> Option<&T> {
        self.filtered.get(self.cursor).map(|&i| &self.items[i])
    }

    /// Consume the picker, yielding the item under the cursor.
    pub fn into_selected(mut self) -> Option<T> {
        let idx = *self.filtered.get(self.cursor)?;
        Some(self.items.swap_remove(idx))
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.refilter();
    }

    pub fn backspace(&mut self) {
        unicode::pop_grapheme(&mut self.query);
        self.refilter();
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.filtered.len() {
            self.cursor += 1;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => PickerOutcome::Cancelled,
            KeyCode::Char('c') if ctrl => PickerOutcome::Cancelled,
            KeyCode::Enter => {
                if self.selected().is_some() {
                    PickerOutcome::Chosen
                } else {
                    PickerOutcome::Continue
                }
            }
            KeyCode::Up => {
                self.move_up();
                PickerOutcome::Continue
            }
            KeyCode::Char('p') if ctrl => {
                self.move_up();
                PickerOutcome::Continue
            }
            KeyCode::Down | KeyCode::Tab => {
                self.move_down();
                PickerOutcome::Continue
            }
            KeyCode::Char('n') if ctrl => {
                self.move_down();
                PickerOutcome::Continue
            }
            KeyCode::Backspace => {
                self.backspace();
                PickerOutcome::Continue
            }
            KeyCode::Char(c) if !ctrl => {
                self.push_char(c);
                PickerOutcome::Continue
            }
            _ => PickerOutcome::Continue,
        }
    }

    fn refilter(&mut self) {
        self.filtered = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, label)| fuzzy_match(&self.query, label))
            .map(|(i, _)| i)
            .collect();
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
    }
}

/// Case-insensitive subsequence match. An empty query matches everything.
pub fn fuzzy_match(query: &str, label: &str) -> bool {
    let mut label_chars = label.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|q| label_chars.any(|c| c == q))
}

/// Draw the picker as a centered popup inside `area`.
pub fn render_picker<T>(frame: &mut Frame, picker: &Picker<T>, theme: &Theme, area: Rect) {
    let bg = Style::default().bg(theme.background);
    let labels = picker.visible_labels();

    let popup_w = ((area.width as usize * 6 / 10).clamp(30, 62) as u16).min(area.width);
    let wanted_h = labels.len().max(1) as u16 + 4;
    let popup_h = wanted_h.min(area.height);
    let popup = Rect {
        x: area.x + (area.width - popup_w) / 2,
        y: area.y + (area.height - popup_h) / 3,
        width: popup_w,
        height: popup_h,
    };
    let inner_w = popup_w.saturating_sub(2) as usize;
    let rows = popup_h.saturating_sub(4) as usize;

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(vec![
        Span::styled(" > ", Style::default().fg(theme.highlight).bg(theme.background)),
        Span::styled(
            unicode::fit_to_width(picker.query(), inner_w.saturating_sub(3)),
            Style::default().fg(theme.text_bright).bg(theme.background),
        ),
    ]));
    lines.push(Line::from(Span::styled(" ".repeat(inner_w), bg)));

    if labels.is_empty() {
        lines.push(Line::from(Span::styled(
            unicode::fit_to_width("   no matches", inner_w),
            Style::default().fg(theme.dim).bg(theme.background),
        )));
    }

    let offset = (picker.cursor() + 1).saturating_sub(rows);
    for (i, label) in labels.iter().enumerate().skip(offset).take(rows) {
        let is_selected = i == picker.cursor();
        let style = if is_selected {
            Style::default()
                .fg(theme.text_bright)
                .bg(theme.selection_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text).bg(theme.background)
        };
        let indicator = if is_selected { " \u{25B6} " } else { "   " };
        lines.push(Line::from(vec![
            Span::styled(indicator, style),
            Span::styled(unicode::fit_to_width(label, inner_w.saturating_sub(3)), style),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border).bg(theme.background))
        .title(Span::styled(
            format!(" {} ", picker.title()),
            Style::default().fg(theme.text_bright).bg(theme.background),
        ))
        .style(bg);

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

/// Run the picker full-screen until the user chooses or cancels.
/// Returns None when cancelled.
pub fn run_picker<T>(mut picker: Picker<T>) -> Result<Option<T>, Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let theme = Theme::default();
    let result = pick_loop(&mut terminal, &mut picker, &theme);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match result? {
        PickerOutcome::Chosen => Ok(picker.into_selected()),
        _ => Ok(None),
    }
}

fn pick_loop<T>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    picker: &mut Picker<T>,
    theme: &Theme,
) -> Result<PickerOutcome, Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|frame| {
            let area = frame.area();
            render_picker(frame, picker, theme, area);
        })?;

        if event::poll(Duration::from_millis(250))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match picker.handle_key(key) {
                PickerOutcome::Continue => {}
                done => return Ok(done),
            }
        }
    }
}
