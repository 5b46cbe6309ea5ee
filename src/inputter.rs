use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor behind the command prompt and the form fields.
/// The cursor counts characters, not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
    finished: bool,
    canceled: bool,
    changed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    /// The last key modified the text.
    pub changed: bool,
    pub cursor_pos: usize,
}

impl InputResult {
    /// Part of the input that fits `width` columns while keeping the cursor visible,
    /// with the cursor position relative to it.
    pub fn window(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let skip = (self.cursor_pos + 1).saturating_sub(width);
        let visible = self.input.chars().skip(skip).take(width).collect();
        (visible, self.cursor_pos - skip)
    }
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        self.changed = false;
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.kill_line(),
            (kc, km) => self.key(kc, km),
        }
    }

    /// Appends `s` at the end and moves the cursor behind it.
    pub fn set(&mut self, s: &str) {
        self.current_input.push_str(s);
        self.cursor_pos = self.current_input.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            changed: self.changed,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.changed = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let at = self.byte_pos(self.cursor_pos);
            self.current_input.remove(at);
            self.changed = true;
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.cursor_pos < self.current_input.chars().count() {
            let at = self.byte_pos(self.cursor_pos);
            self.current_input.remove(at);
            self.changed = true;
        }
        self.get()
    }

    fn kill_line(&mut self) -> InputResult {
        self.changed = !self.current_input.is_empty();
        self.current_input.clear();
        self.cursor_pos = 0;
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor_pos < self.current_input.chars().count() {
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.cursor_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.cursor_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.contains(KeyModifiers::CONTROL) || modifier.contains(KeyModifiers::ALT) {
            trace!("Ignoring modified key {code:?} {modifier:?}");
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            let at = self.byte_pos(self.cursor_pos);
            self.current_input.insert(at, chr);
            self.cursor_pos += 1;
            self.changed = true;
        }
        self.get()
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            press(input, KeyCode::Char(c));
        }
    }

    #[test]
    fn edits_multibyte_text_at_the_cursor() {
        let mut input = Inputter::default();
        type_str(&mut input, "Ивн");
        press(&mut input, KeyCode::Left);
        let result = press(&mut input, KeyCode::Char('а'));
        assert_eq!(result.input, "Иван");
        assert_eq!(result.cursor_pos, 3);
        assert!(result.changed);

        let result = press(&mut input, KeyCode::Backspace);
        assert_eq!(result.input, "Ивн");
        let result = press(&mut input, KeyCode::Delete);
        assert_eq!(result.input, "Ив");
    }

    #[test]
    fn cursor_moves_do_not_count_as_changes() {
        let mut input = Inputter::default();
        type_str(&mut input, "ab");
        assert!(!press(&mut input, KeyCode::Home).changed);
        assert!(!press(&mut input, KeyCode::Backspace).changed);
        assert_eq!(press(&mut input, KeyCode::End).cursor_pos, 2);
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "5000");
        let done = press(&mut input, KeyCode::Enter);
        assert!(done.finished && !done.canceled);
        assert_eq!(done.input, "5000");

        let canceled = press(&mut input, KeyCode::Esc);
        assert!(canceled.finished && canceled.canceled);
        assert_eq!(canceled.input, "");
    }

    #[test]
    fn window_keeps_the_cursor_visible() {
        let mut input = Inputter::default();
        input.set("abcdefgh");
        let (visible, cursor) = input.get().window(4);
        assert_eq!(visible, "fgh");
        assert_eq!(cursor, 3);
    }
}
