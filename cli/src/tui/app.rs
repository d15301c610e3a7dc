use anyhow::{anyhow, Result};
use chrono::Local;
use messbook_core::{
    parse_entry, EntryKind, EntryService, FileRecordStore, MonthKey, RecalcHandle, ViewState,
};
use ratatui::widgets::TableState;
use tokio::sync::watch;

pub enum InputMode {
    Normal,
    Adding,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Info(String),
    Error(String),
}

pub struct App {
    recalc: RecalcHandle,
    updates: watch::Receiver<ViewState>,
    pub entries: EntryService<FileRecordStore>,
    /// Month last requested; the published view may still lag behind it.
    pub month: MonthKey,
    pub view: ViewState,
    pub state: TableState,
    pub input: String,
    pub input_mode: InputMode,
    pub cursor_position: usize,
    pub message: Option<Message>,
}

impl App {
    pub fn new(recalc: RecalcHandle, entries: EntryService<FileRecordStore>) -> App {
        let updates = recalc.subscribe();
        let view = updates.borrow().clone();
        App {
            recalc,
            updates,
            entries,
            month: view.month,
            view,
            state: TableState::default(),
            input: String::new(),
            input_mode: InputMode::Normal,
            cursor_position: 0,
            message: None,
        }
    }

    /// Pulls the latest published view, if the worker sent one.
    pub fn sync_view(&mut self) {
        if !self.updates.has_changed().unwrap_or(false) {
            return;
        }
        self.view = self.updates.borrow_and_update().clone();

        let rows = self.member_count();
        match self.state.selected() {
            _ if rows == 0 => self.state.select(None),
            Some(i) if i >= rows => self.state.select(Some(rows - 1)),
            None => self.state.select(Some(0)),
            Some(_) => {}
        }
    }

    fn member_count(&self) -> usize {
        self.view.view.snapshot().map(|s| s.members.len()).unwrap_or(0)
    }

    pub fn next(&mut self) {
        let rows = self.member_count();
        if rows == 0 { return; }

        let i = match self.state.selected() {
            Some(i) if i + 1 < rows => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let rows = self.member_count();
        if rows == 0 { return; }

        let i = match self.state.selected() {
            Some(0) | None => rows - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub async fn next_month(&mut self) {
        let month = self.month.next();
        self.switch_month(month).await;
    }

    pub async fn previous_month(&mut self) {
        let month = self.month.previous();
        self.switch_month(month).await;
    }

    async fn switch_month(&mut self, month: MonthKey) {
        self.month = month;
        let result = self.recalc.set_month(month).await.map(|_| None);
        self.report(result);
    }

    pub async fn refresh(&mut self) {
        let result = self.recalc.refresh().await.map(|_| Some("Refreshing...".to_string()));
        self.report(result);
    }

    pub fn enter_add_mode(&mut self) {
        self.input_mode = InputMode::Adding;
        self.input.clear();
        self.cursor_position = 0;
    }

    pub fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn input_char(&mut self, c: char) {
        let byte_index = self.input.chars().take(self.cursor_position).map(|c| c.len_utf8()).sum();
        self.input.insert(byte_index, c);
        self.cursor_position += 1;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            let byte_index: usize = self.input.chars().take(self.cursor_position - 1).map(|c| c.len_utf8()).sum();
            self.input.remove(byte_index);
            self.cursor_position -= 1;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub async fn submit_command(&mut self) {
        if self.input.trim().is_empty() {
            self.exit_input_mode();
            return;
        }

        let args: Vec<String> = self.input.split_whitespace().map(|s| s.to_string()).collect();
        let result = self.submit_add(&args).await;
        self.report(result);

        self.input.clear();
        self.cursor_position = 0;
        self.exit_input_mode();
    }

    /// `member <name>` adds to the roster; anything else is `<kind> <args..>`
    /// as accepted by `messbook add`. The view updates through the change feed.
    async fn submit_add(&self, args: &[String]) -> Result<Option<String>> {
        let (kind, rest) = args.split_first().ok_or_else(|| anyhow!("Nothing to add"))?;

        if kind.eq_ignore_ascii_case("member") {
            let member = self.entries.add_member(&rest.join(" "), false).await?;
            return Ok(Some(format!("Added member {}", member.name)));
        }

        let kind = EntryKind::parse(kind)?;
        let roster = self.entries.roster().await?;
        let entry = parse_entry(kind, rest, &roster, Local::now().date_naive())?;
        self.entries.record(entry).await?;
        Ok(Some(format!("Recorded {:?}", kind)))
    }

    fn report(&mut self, result: Result<Option<String>>) {
        match result {
            Ok(Some(info)) => self.message = Some(Message::Info(info)),
            Ok(None) => self.message = None,
            Err(e) => {
                tracing::warn!("Dashboard action failed: {e}");
                self.message = Some(Message::Error(e.to_string()));
            }
        }
    }

    pub async fn shutdown(self) {
        self.recalc.shutdown().await;
    }
}
