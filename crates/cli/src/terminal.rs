//! Full-screen terminal sink and quit-key watcher

use crate::output::{frame_table, frame_title};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ktop_lib::{Frame, RenderError, RenderSink};
use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Draws frames on the alternate screen; the terminal is restored on drop
pub struct TerminalSink {
    out: Stdout,
}

impl TerminalSink {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self { out })
    }
}

impl RenderSink for TerminalSink {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::All))?;

        // Raw mode does not translate \n into a carriage return
        queue!(self.out, Print(frame_title(frame)), Print("\r\n"))?;
        for line in frame_table(frame).lines() {
            queue!(self.out, Print(line), Print("\r\n"))?;
        }
        queue!(self.out, Print("Press q or Esc to quit"))?;

        self.out.flush()?;
        Ok(())
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Blocking keyboard reader that fires the shutdown channel on a quit key
pub struct KeyWatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<io::Result<()>>,
}

impl KeyWatcher {
    pub fn spawn(shutdown: broadcast::Sender<()>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let result = watch_keys(&flag);
            if let Err(e) = &result {
                warn!(error = %e, "Keyboard input failed, stopping session");
            }
            // Any exit other than an explicit stop ends the session
            if !flag.load(Ordering::SeqCst) {
                let _ = shutdown.send(());
            }
            result
        });
        Self { stop, handle }
    }

    /// Stop reading keys and wait for the reader thread
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.await {
            Ok(Ok(())) => debug!("Key watcher stopped"),
            Ok(Err(e)) => debug!(error = %e, "Key watcher ended with an error"),
            Err(e) => warn!(error = %e, "Key watcher task failed"),
        }
    }
}

/// Returns once a quit key is pressed or `stop` is set
fn watch_keys(stop: &AtomicBool) -> io::Result<()> {
    while !stop.load(Ordering::SeqCst) {
        if !event::poll(KEY_POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if is_quit_key(&key) {
                debug!(key = ?key.code, "Quit key pressed");
                return Ok(());
            }
        }
    }
    Ok(())
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    matches!(
        (key.code, key.modifiers),
        (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Esc, _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL)
    )
}
