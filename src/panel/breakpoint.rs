use arboard::Clipboard;

use crate::console::log::ConsoleLogger;

/// One suggested breakpoint inside the query client's fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointInfo {
    pub file: &'static str,
    pub line: u32,
    pub description: &'static str,
    pub code: &'static str,
}

/// Static lookup table of the places worth breaking on when stepping
/// through a query's lifecycle.
pub const BREAKPOINT_SUGGESTIONS: &[BreakpointInfo] = &[
    BreakpointInfo {
        file: "client/cache.rs",
        line: 307,
        description: "fetch task dispatched",
        code: "tokio::spawn(async move {",
    },
    BreakpointInfo {
        file: "client/cache.rs",
        line: 308,
        description: "entry enters the fetching state",
        code: "inner.begin_fetch(&key);",
    },
    BreakpointInfo {
        file: "client/cache.rs",
        line: 317,
        description: "successful result settles into the cache",
        code: "inner.settle_success(&key, data);",
    },
    BreakpointInfo {
        file: "client/cache.rs",
        line: 327,
        description: "failed attempt recorded before backoff",
        code: "inner.record_attempt_failure(&key, reason, attempt);",
    },
    BreakpointInfo {
        file: "client/cache.rs",
        line: 98,
        description: "staleness decision for one entry",
        code: "fn is_stale(&self, entry: &Entry) -> bool {",
    },
    BreakpointInfo {
        file: "observer.rs",
        line: 106,
        description: "one observation pass begins",
        code: "pub fn observe(&mut self) -> DebugQueryResult {",
    },
    BreakpointInfo {
        file: "panel/poller.rs",
        line: 53,
        description: "cache listing projected into snapshot rows",
        code: "fn refresh(&self) {",
    },
    BreakpointInfo {
        file: "panel/poller.rs",
        line: 225,
        description: "change notification received",
        code: "event = events.recv() => match event {",
    },
];

/// Fixed instruction template for one suggestion.
pub fn breakpoint_instructions(bp: &BreakpointInfo) -> String {
    format!(
        "To set this breakpoint in your debugger:\n\
         1. open src/{file}\n\
         2. break at line {line}\n\
         3. code: {code}\n\
         4. what happens here: {description}\n",
        file = bp.file,
        line = bp.line,
        code = bp.code,
        description = bp.description,
    )
}

/// Copies breakpoint instructions to the system clipboard, degrading to a
/// log line when no clipboard is available or the write is denied.
pub struct BreakpointHelper {
    clipboard: Option<Clipboard>,
    clipboard_enabled: bool,
    logger: ConsoleLogger,
}

impl BreakpointHelper {
    pub fn new(logger: ConsoleLogger) -> Self {
        Self {
            clipboard: Clipboard::new().ok(),
            clipboard_enabled: true,
            logger,
        }
    }

    /// Helper without clipboard access; every copy takes the log
    /// fallback. Used where a clipboard is known to be absent.
    pub fn without_clipboard(logger: ConsoleLogger) -> Self {
        Self {
            clipboard: None,
            clipboard_enabled: false,
            logger,
        }
    }

    /// Produces the instruction payload for `bp`, placing it on the
    /// clipboard when possible and logging it otherwise. The payload is
    /// returned either way so callers can inspect what was offered.
    pub fn copy_instructions(&mut self, bp: &BreakpointInfo) -> String {
        let payload = breakpoint_instructions(bp);

        if self.clipboard.is_none() && self.clipboard_enabled {
            self.clipboard = Clipboard::new().ok();
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(payload.clone()) {
                Ok(()) => {
                    self.logger
                        .info(&["Breakpoint instructions copied to clipboard".into()]);
                }
                Err(_) => {
                    self.logger
                        .info(&["Breakpoint instructions:".into(), payload.clone().into()]);
                }
            },
            None => {
                self.logger
                    .info(&["Breakpoint instructions:".into(), payload.clone().into()]);
            }
        }

        payload
    }
}
