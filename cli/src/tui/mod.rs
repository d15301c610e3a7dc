pub mod app;
pub mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use messbook_core::{
    AppConfig, ChangeFeed, EntryService, FileRecordStore, FileSnapshotCache, MonthKey, Recalculator,
    StatsAggregator,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::logger;
use crate::tui::app::{App, InputMode};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run(config: AppConfig, month: MonthKey) -> Result<()> {
    let feed = ChangeFeed::new();
    let store = FileRecordStore::new(config.data_dir.clone())?.with_feed(feed.clone());
    logger::init_file_logger(&config.log_level, &store.base_dir().join("logs"))?;
    let cache = FileSnapshotCache::new(config.data_dir.clone())?;

    let aggregator = StatsAggregator::new(Arc::new(store.clone()), Arc::new(cache))
        .with_cache_ttl(config.cache_ttl);
    let recalc = Recalculator::spawn(aggregator, &feed, config.mess_id.clone(), month, config.debounce);
    let entries = EntryService::new(store, config.mess_id.clone());
    tracing::info!(mess = %config.mess_id, %month, "Dashboard started");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(recalc, entries);
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    app.shutdown().await;

    if let Err(err) = res {
        tracing::error!("Dashboard exited with error: {err:?}");
        println!("{:?}", err);
    }

    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.sync_view();
        terminal
            .draw(|f| ui::draw(f, app))
            .map_err(|e| anyhow!(e.to_string()))?;

        // Polling blocks, so keep it off the async scheduler.
        let ready = tokio::task::block_in_place(|| event::poll(POLL_INTERVAL))?;
        if !ready {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Left | KeyCode::Char('h') => app.previous_month().await,
                KeyCode::Right | KeyCode::Char('l') => app.next_month().await,
                KeyCode::Char('r') => app.refresh().await,
                KeyCode::Char('a') => app.enter_add_mode(),
                _ => {}
            },
            InputMode::Adding => match key.code {
                KeyCode::Enter => app.submit_command().await,
                KeyCode::Esc => app.exit_input_mode(),
                KeyCode::Char(c) => app.input_char(c),
                KeyCode::Backspace => app.delete_char(),
                KeyCode::Left => app.move_cursor_left(),
                KeyCode::Right => app.move_cursor_right(),
                _ => {}
            },
        }
    }
}
