use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Actions produced by key input handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Quit the application.
    Quit,
    /// Move focus to the next panel.
    FocusNext,
    /// Move focus to the previous panel.
    FocusPrev,
    /// Cursor up in the focused panel.
    Up,
    /// Cursor down in the focused panel.
    Down,
    /// Navigate to the item under the cursor.
    Activate,
    /// Drop the deepest selected field.
    Back,
    /// Execute the selected workflow.
    Execute,
    /// Refetch every panel.
    Refresh,
    /// Scroll the log up.
    ScrollUp,
    /// Scroll the log down.
    ScrollDown,
    /// Start editing the location token.
    BeginEdit,
    /// Navigate to the edited token.
    Commit(String),
    /// Leave the token editor without navigating.
    Cancel,
    /// No-op (key was handled internally).
    None,
}

/// Key handler with a one-line editor for the location token.
pub struct InputHandler {
    pub buffer: String,
    /// Cursor position in characters.
    pub cursor: usize,
    pub editing: bool,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            editing: false,
        }
    }

    /// Open the editor pre-filled with `token`.
    pub fn begin_edit(&mut self, token: &str) {
        self.buffer = token.to_string();
        self.cursor = self.buffer.chars().count();
        self.editing = true;
    }

    /// Handle a key event, returning an action.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return InputAction::Quit;
        }
        if self.editing {
            return self.handle_edit_key(key);
        }

        match key.code {
            KeyCode::Char('q') => InputAction::Quit,
            KeyCode::Tab => InputAction::FocusNext,
            KeyCode::BackTab => InputAction::FocusPrev,
            KeyCode::Up | KeyCode::Char('k') => InputAction::Up,
            KeyCode::Down | KeyCode::Char('j') => InputAction::Down,
            KeyCode::Enter => InputAction::Activate,
            KeyCode::Backspace => InputAction::Back,
            KeyCode::Char('x') => InputAction::Execute,
            KeyCode::Char('r') => InputAction::Refresh,
            KeyCode::Char(':') => InputAction::BeginEdit,
            KeyCode::PageUp => InputAction::ScrollUp,
            KeyCode::PageDown => InputAction::ScrollDown,
            _ => InputAction::None,
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Enter => {
                self.editing = false;
                self.cursor = 0;
                InputAction::Commit(std::mem::take(&mut self.buffer))
            }
            KeyCode::Esc => {
                self.editing = false;
                self.buffer.clear();
                self.cursor = 0;
                InputAction::Cancel
            }
            KeyCode::Char(c) => {
                let at = self.byte_index();
                self.buffer.insert(at, c);
                self.cursor += 1;
                InputAction::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Delete => {
                if self.cursor < self.buffer.chars().count() {
                    let at = self.byte_index();
                    self.buffer.remove(at);
                }
                InputAction::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InputAction::None
            }
            KeyCode::Right => {
                if self.cursor < self.buffer.chars().count() {
                    self.cursor += 1;
                }
                InputAction::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                InputAction::None
            }
            KeyCode::End => {
                self.cursor = self.buffer.chars().count();
                InputAction::None
            }
            _ => InputAction::None,
        }
    }

    fn byte_index(&self) -> usize {
        self.buffer
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}
