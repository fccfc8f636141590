use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// Every user command the viewer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    OpenFile,
    CloseTab,
    Quit,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    EditExternal,
    OpenTerminal,
    OpenConfig,
    Reload,
    ReloadConfig,
    NextTab,
    PreviousTab,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::OpenFile,
        Action::CloseTab,
        Action::Quit,
        Action::ZoomIn,
        Action::ZoomOut,
        Action::ZoomReset,
        Action::EditExternal,
        Action::OpenTerminal,
        Action::OpenConfig,
        Action::Reload,
        Action::ReloadConfig,
        Action::NextTab,
        Action::PreviousTab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::OpenFile => "open-file",
            Action::CloseTab => "close-tab",
            Action::Quit => "quit",
            Action::ZoomIn => "zoom-in",
            Action::ZoomOut => "zoom-out",
            Action::ZoomReset => "zoom-reset",
            Action::EditExternal => "edit-external",
            Action::OpenTerminal => "open-terminal",
            Action::OpenConfig => "open-config",
            Action::Reload => "reload",
            Action::ReloadConfig => "reload-config",
            Action::NextTab => "next-tab",
            Action::PreviousTab => "previous-tab",
        }
    }

    pub fn from_str(s: &str) -> Option<Action> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        Action::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized key chord. Key names are lowercase; punctuation is spelled
/// out (`plus`, `minus`, `comma`, `equal`) so both input forms compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accelerator {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: String,
}

impl Accelerator {
    pub fn ctrl(key: &str) -> Self {
        Self {
            ctrl: true,
            shift: false,
            alt: false,
            key: normalize_key(key),
        }
    }

    pub fn ctrl_shift(key: &str) -> Self {
        Self {
            shift: true,
            ..Self::ctrl(key)
        }
    }

    /// Parse `<Ctrl><Shift>r` or `ctrl+shift+r`. Returns `None` for input
    /// with no key or an unknown modifier.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if input.starts_with('<') {
            Self::parse_gtk(input)
        } else {
            Self::parse_plus(input)
        }
    }

    fn parse_gtk(input: &str) -> Option<Self> {
        let mut accel = Self::bare();
        let mut rest = input;
        while let Some(after) = rest.strip_prefix('<') {
            let end = after.find('>')?;
            accel.apply_modifier(&after[..end])?;
            rest = &after[end + 1..];
        }
        accel.set_key(rest)
    }

    fn parse_plus(input: &str) -> Option<Self> {
        // A trailing "+" is the key itself, as in "ctrl++".
        let (mods, key) = match input.strip_suffix("++") {
            Some(mods) => (mods, "+"),
            None => match input.rsplit_once('+') {
                Some((mods, key)) => (mods, key),
                None => ("", input),
            },
        };

        let mut accel = Self::bare();
        for modifier in mods.split('+').filter(|m| !m.is_empty()) {
            accel.apply_modifier(modifier)?;
        }
        accel.set_key(key)
    }

    fn bare() -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            key: String::new(),
        }
    }

    fn apply_modifier(&mut self, modifier: &str) -> Option<()> {
        match modifier.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "primary" => self.ctrl = true,
            "shift" => self.shift = true,
            "alt" | "meta" => self.alt = true,
            _ => return None,
        }
        Some(())
    }

    fn set_key(mut self, key: &str) -> Option<Self> {
        let key = normalize_key(key);
        if key.is_empty() {
            return None;
        }
        self.key = key;
        Some(self)
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("<Ctrl>")?;
        }
        if self.shift {
            f.write_str("<Shift>")?;
        }
        if self.alt {
            f.write_str("<Alt>")?;
        }
        f.write_str(&self.key)
    }
}

fn normalize_key(key: &str) -> String {
    let key = key.trim();
    match key {
        "+" => "plus".to_string(),
        "-" => "minus".to_string(),
        "," => "comma".to_string(),
        "=" => "equal".to_string(),
        _ => key.to_ascii_lowercase(),
    }
}

/// Accelerator to action bindings. Fixed at startup.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<Accelerator, Action>,
}

impl Keymap {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    pub fn bind(&mut self, accel: Accelerator, action: Action) {
        self.bindings.insert(accel, action);
    }

    pub fn lookup(&self, accel: &Accelerator) -> Option<Action> {
        self.bindings.get(accel).copied()
    }

    /// Accelerators bound to `action`, sorted for display.
    pub fn accelerators_for(&self, action: Action) -> Vec<String> {
        let mut accels: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(accel, _)| accel.to_string())
            .collect();
        accels.sort();
        accels
    }
}

impl Default for Keymap {
    fn default() -> Self {
        let mut keymap = Self::empty();
        keymap.bind(Accelerator::ctrl("o"), Action::OpenFile);
        keymap.bind(Accelerator::ctrl("w"), Action::CloseTab);
        keymap.bind(Accelerator::ctrl("q"), Action::Quit);
        keymap.bind(Accelerator::ctrl("plus"), Action::ZoomIn);
        keymap.bind(Accelerator::ctrl("equal"), Action::ZoomIn);
        keymap.bind(Accelerator::ctrl("minus"), Action::ZoomOut);
        keymap.bind(Accelerator::ctrl("0"), Action::ZoomReset);
        keymap.bind(Accelerator::ctrl("e"), Action::EditExternal);
        keymap.bind(Accelerator::ctrl_shift("t"), Action::OpenTerminal);
        keymap.bind(Accelerator::ctrl("comma"), Action::OpenConfig);
        keymap.bind(Accelerator::ctrl("r"), Action::Reload);
        keymap.bind(Accelerator::ctrl_shift("r"), Action::ReloadConfig);
        keymap.bind(Accelerator::ctrl("tab"), Action::NextTab);
        keymap.bind(Accelerator::ctrl_shift("tab"), Action::PreviousTab);
        keymap
    }
}

/// The operations commands route to. Implemented by the app state.
pub trait CommandTarget {
    fn open_file(&mut self);
    fn close_tab(&mut self);
    fn quit(&mut self);
    fn zoom_in(&mut self);
    fn zoom_out(&mut self);
    fn zoom_reset(&mut self);
    fn edit_external(&mut self);
    fn open_terminal(&mut self);
    fn open_config(&mut self);
    fn reload(&mut self);
    fn reload_config(&mut self);
    fn next_tab(&mut self);
    fn previous_tab(&mut self);
}

/// Split a command line into arguments. Single and double quotes group
/// words; a backslash escapes the next character outside single quotes.
/// An unterminated quote runs to the end of the line.
pub fn split_arguments(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        args.push(current);
    }
    args
}

/// Routes input gestures to a [`CommandTarget`].
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    keymap: Keymap,
}

impl Dispatcher {
    pub fn new(keymap: Keymap) -> Self {
        Self { keymap }
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// Accelerator first, then action name.
    pub fn resolve(&self, input: &str) -> Option<Action> {
        if let Some(accel) = Accelerator::parse(input)
            && let Some(action) = self.keymap.lookup(&accel)
        {
            return Some(action);
        }
        Action::from_str(input)
    }

    /// Resolve and run `input`. Unbound input is ignored.
    pub fn dispatch(&self, input: &str, target: &mut dyn CommandTarget) -> Option<Action> {
        let Some(action) = self.resolve(input) else {
            debug!(input, "ignoring unbound input");
            return None;
        };
        Self::invoke(action, target);
        Some(action)
    }

    pub fn invoke(action: Action, target: &mut dyn CommandTarget) {
        debug!(action = %action, "dispatching command");
        match action {
            Action::OpenFile => target.open_file(),
            Action::CloseTab => target.close_tab(),
            Action::Quit => target.quit(),
            Action::ZoomIn => target.zoom_in(),
            Action::ZoomOut => target.zoom_out(),
            Action::ZoomReset => target.zoom_reset(),
            Action::EditExternal => target.edit_external(),
            Action::OpenTerminal => target.open_terminal(),
            Action::OpenConfig => target.open_config(),
            Action::Reload => target.reload(),
            Action::ReloadConfig => target.reload_config(),
            Action::NextTab => target.next_tab(),
            Action::PreviousTab => target.previous_tab(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl CommandTarget for Recorder {
        fn open_file(&mut self) {
            self.calls.push("open_file");
        }
        fn close_tab(&mut self) {
            self.calls.push("close_tab");
        }
        fn quit(&mut self) {
            self.calls.push("quit");
        }
        fn zoom_in(&mut self) {
            self.calls.push("zoom_in");
        }
        fn zoom_out(&mut self) {
            self.calls.push("zoom_out");
        }
        fn zoom_reset(&mut self) {
            self.calls.push("zoom_reset");
        }
        fn edit_external(&mut self) {
            self.calls.push("edit_external");
        }
        fn open_terminal(&mut self) {
            self.calls.push("open_terminal");
        }
        fn open_config(&mut self) {
            self.calls.push("open_config");
        }
        fn reload(&mut self) {
            self.calls.push("reload");
        }
        fn reload_config(&mut self) {
            self.calls.push("reload_config");
        }
        fn next_tab(&mut self) {
            self.calls.push("next_tab");
        }
        fn previous_tab(&mut self) {
            self.calls.push("previous_tab");
        }
    }

    #[test]
    fn test_parse_both_forms() {
        let expected = Accelerator::ctrl_shift("r");
        assert_eq!(Accelerator::parse("<Ctrl><Shift>r"), Some(expected.clone()));
        assert_eq!(Accelerator::parse("ctrl+shift+R"), Some(expected.clone()));
        assert_eq!(Accelerator::parse("<Control><shift>R"), Some(expected));
    }

    #[test]
    fn test_parse_punctuation_keys() {
        assert_eq!(Accelerator::parse("ctrl++"), Some(Accelerator::ctrl("plus")));
        assert_eq!(Accelerator::parse("<Ctrl>plus"), Some(Accelerator::ctrl("plus")));
        assert_eq!(Accelerator::parse("ctrl+-"), Some(Accelerator::ctrl("minus")));
        assert_eq!(Accelerator::parse("ctrl+,"), Some(Accelerator::ctrl("comma")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Accelerator::parse(""), None);
        assert_eq!(Accelerator::parse("<Ctrl>"), None);
        assert_eq!(Accelerator::parse("<Hyper>x"), None);
        assert_eq!(Accelerator::parse("<Ctrl x"), None);
    }

    #[test]
    fn test_default_keymap_covers_every_action() {
        let keymap = Keymap::default();
        for action in Action::ALL {
            assert!(
                !keymap.accelerators_for(action).is_empty(),
                "{action} has no accelerator"
            );
        }
        assert_eq!(
            keymap.accelerators_for(Action::ZoomIn),
            vec!["<Ctrl>equal".to_string(), "<Ctrl>plus".to_string()]
        );
    }

    #[test]
    fn test_action_names_roundtrip() {
        for action in Action::ALL {
            assert_eq!(Action::from_str(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_str("ZOOM_IN"), Some(Action::ZoomIn));
        assert_eq!(Action::from_str("explode"), None);
    }

    #[test]
    fn test_dispatch_routes_to_target() {
        let dispatcher = Dispatcher::default();
        let mut target = Recorder::default();

        assert_eq!(dispatcher.dispatch("<Ctrl>w", &mut target), Some(Action::CloseTab));
        assert_eq!(dispatcher.dispatch("ctrl+shift+tab", &mut target), Some(Action::PreviousTab));
        assert_eq!(dispatcher.dispatch("edit-external", &mut target), Some(Action::EditExternal));
        assert_eq!(dispatcher.dispatch("ctrl+0", &mut target), Some(Action::ZoomReset));
        assert_eq!(dispatcher.dispatch("<Ctrl><Shift>t", &mut target), Some(Action::OpenTerminal));
        assert_eq!(
            target.calls,
            vec!["close_tab", "previous_tab", "edit_external", "zoom_reset", "open_terminal"]
        );
    }

    #[test]
    fn test_split_arguments_honors_quotes() {
        assert_eq!(split_arguments("a.md  b.md"), vec!["a.md", "b.md"]);
        assert_eq!(
            split_arguments(r#""My Notes/todo list.md" other.md"#),
            vec!["My Notes/todo list.md", "other.md"]
        );
        assert_eq!(split_arguments(r"it\'s\ here.md"), vec!["it's here.md"]);
        assert_eq!(split_arguments(r"'no \escape'"), vec![r"no \escape"]);
        assert_eq!(split_arguments(r#""" x"#), vec!["", "x"]);
        assert_eq!(split_arguments("'open ended"), vec!["open ended"]);
        assert!(split_arguments("   ").is_empty());
    }

    #[test]
    fn test_unbound_input_is_ignored() {
        let dispatcher = Dispatcher::default();
        let mut target = Recorder::default();

        assert_eq!(dispatcher.dispatch("<Ctrl>k", &mut target), None);
        assert_eq!(dispatcher.dispatch("not a command", &mut target), None);
        assert_eq!(dispatcher.dispatch("", &mut target), None);
        assert!(target.calls.is_empty());
    }
}
