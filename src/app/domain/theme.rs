use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex_lite::Regex;

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment pattern"));
static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--([A-Za-z0-9_-]+)\s*:\s*([^;{}]+)").expect("valid property pattern")
});

/// Semantic color slots the viewer stylesheet is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThemeRole {
    Background,
    Foreground,
    Accent,
    Link,
    CodeBackground,
    Border,
}

impl ThemeRole {
    pub const ALL: [ThemeRole; 6] = [
        ThemeRole::Background,
        ThemeRole::Foreground,
        ThemeRole::Accent,
        ThemeRole::Link,
        ThemeRole::CodeBackground,
        ThemeRole::Border,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeRole::Background => "background",
            ThemeRole::Foreground => "foreground",
            ThemeRole::Accent => "accent",
            ThemeRole::Link => "link",
            ThemeRole::CodeBackground => "code-background",
            ThemeRole::Border => "border",
        }
    }

    /// Custom property names (without the leading `--`) accepted for this role,
    /// in priority order.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ThemeRole::Background => &["background", "bg-color"],
            ThemeRole::Foreground => &["foreground", "fg-color"],
            ThemeRole::Accent => &["accent", "accent-color"],
            ThemeRole::Link => &["link", "link-color"],
            ThemeRole::CodeBackground => &["code-background", "code-bg"],
            ThemeRole::Border => &["border", "border-color"],
        }
    }

    /// Built-in fallback color used when the theme does not define the role.
    pub fn fallback(&self) -> &'static str {
        match self {
            ThemeRole::Background => "#1e1e2e",
            ThemeRole::Foreground => "#cdd6f4",
            ThemeRole::Accent => "#89b4fa",
            ThemeRole::Link => "#89b4fa",
            ThemeRole::CodeBackground => "#313244",
            ThemeRole::Border => "#45475a",
        }
    }

    /// The variable name the rendered stylesheet reads.
    pub fn css_var(&self) -> String {
        format!("--mdv-{}", self.as_str())
    }

    pub fn from_str(s: &str) -> Option<ThemeRole> {
        ThemeRole::ALL.into_iter().find(|role| role.as_str() == s)
    }
}

/// Custom properties extracted from an external stylesheet. An empty theme
/// is valid; every role then resolves to its fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Theme {
    properties: BTreeMap<String, String>,
}

impl Theme {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extract every `--name: value` declaration from `css`. Later
    /// declarations win. Values that could escape the declaration are dropped.
    pub fn from_css(css: &str) -> Self {
        let stripped = COMMENT_RE.replace_all(css, "");
        let mut properties = BTreeMap::new();

        for caps in PROPERTY_RE.captures_iter(&stripped) {
            let name = caps[1].to_ascii_lowercase();
            let value = caps[2].trim();
            if value.is_empty()
                || value.contains('<')
                || value.contains("/*")
                || value.contains("*/")
            {
                continue;
            }
            properties.insert(name, value.to_string());
        }

        Self { properties }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Raw custom property lookup, name without the leading `--`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The color the theme defines for `role`, if any.
    pub fn role(&self, role: ThemeRole) -> Option<&str> {
        role.aliases().iter().find_map(|alias| self.property(alias))
    }

    /// The color for `role`, falling back to the built-in palette.
    pub fn color(&self, role: ThemeRole) -> &str {
        self.role(role).unwrap_or_else(|| role.fallback())
    }

    /// Render the theme as a `:root` block: passthrough properties first,
    /// then one resolved variable per role.
    pub fn to_css_variables(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in self.properties() {
            css.push_str(&format!("  --{}: {};\n", name, value));
        }
        for role in ThemeRole::ALL {
            css.push_str(&format!("  {}: {};\n", role.css_var(), self.color(role)));
        }
        css.push('}');
        css
    }
}
