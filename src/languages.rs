//! Supported source extensions and their language tags

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Extension (lowercase, no dot) to language tag
const EXTENSION_LANGUAGES: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("pyi", "python"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("scala", "scala"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("cs", "csharp"),
    ("swift", "swift"),
    ("m", "objective-c"),
    ("rb", "ruby"),
    ("php", "php"),
    ("lua", "lua"),
    ("pl", "perl"),
    ("r", "r"),
    ("dart", "dart"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("erl", "erlang"),
    ("hs", "haskell"),
    ("ml", "ocaml"),
    ("clj", "clojure"),
    ("zig", "zig"),
    ("sol", "solidity"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("ps1", "powershell"),
    ("sql", "sql"),
    ("html", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("xml", "xml"),
    ("md", "markdown"),
    ("graphql", "graphql"),
    ("proto", "protobuf"),
    ("tf", "terraform"),
];

/// Extensionless file names that are still worth analyzing
const WELL_KNOWN_NAMES: &[(&str, &str)] = &[("Dockerfile", "dockerfile"), ("Makefile", "make")];

static LANGUAGE_BY_EXTENSION: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| EXTENSION_LANGUAGES.iter().copied().collect());

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lowercased text after the last `.` of the file name.
///
/// Dotfiles without a further dot (`.gitignore`) have no extension.
pub fn extension_of(path: &str) -> Option<String> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Language tag for a path, if the path is a supported source file
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let name = file_name(path);
    if let Some(&(_, language)) = WELL_KNOWN_NAMES.iter().find(|(known, _)| *known == name) {
        return Some(language);
    }
    extension_of(path).and_then(|ext| LANGUAGE_BY_EXTENSION.get(ext.as_str()).copied())
}

/// Whether the built-in table or the configured extras accept this path
pub fn is_supported_path(path: &str, extra_extensions: &[String]) -> bool {
    if language_for_path(path).is_some() {
        return true;
    }
    match extension_of(path) {
        Some(ext) => extra_extensions
            .iter()
            .any(|extra| extra.trim_start_matches('.').eq_ignore_ascii_case(&ext)),
        None => false,
    }
}
