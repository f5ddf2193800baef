//! Tool name sanitization for host-language identifiers.

use strum::{Display, EnumString};

/// Language whose identifier rules a sanitized name must follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HostLanguage {
    #[default]
    Rust,
    Python,
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

impl HostLanguage {
    pub fn is_keyword(self, name: &str) -> bool {
        match self {
            HostLanguage::Rust => RUST_KEYWORDS.contains(&name),
            HostLanguage::Python => PYTHON_KEYWORDS.contains(&name),
        }
    }
}

/// Turn a remote tool name into a valid identifier for `host`.
///
/// `-` becomes `_`, other characters outside `[A-Za-z0-9_]` are dropped, a
/// leading digit gets a `_` prefix and keywords get a `_` suffix.
pub fn sanitize_function_name(name: &str, host: HostLanguage) -> String {
    let mut sanitized: String = name
        .chars()
        .filter_map(|c| match c {
            '-' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    if host.is_keyword(&sanitized) {
        sanitized.push('_');
    }
    sanitized
}
