use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources. Nothing else is scanned.
const SOURCE_DIRS: [&str; 6] = ["pipeline", "model", "src", "cli", "tests", "benches"];

// Which source policy a collector enforces; selects the report wording.
#[derive(Clone, Copy)]
enum Policy {
    UnderscorePrefix,
    ForbiddenComment,
    AllowDeadCode,
}

impl Policy {
    fn describe(self) -> &'static str {
        match self {
            Policy::UnderscorePrefix => "underscore-prefixed variables",
            Policy::ForbiddenComment => "forbidden comment patterns",
            Policy::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn advice(self) -> &'static str {
        match self {
            Policy::UnderscorePrefix => {
                "\n⚠️ Underscore-prefixed variable names are not allowed in this project.\n   Either use the variable (removing the underscore) or remove it completely.\n"
            }
            Policy::ForbiddenComment => {
                "\n⚠️ Comments narrating edits ('FIXED', 'CHANGED', 'UPDATED' and the like) are not allowed in this project.\n   Remove them completely rather than commenting them out.\n"
            }
            Policy::AllowDeadCode => {
                "\n⚠️ #[allow(dead_code)] attributes are STRICTLY FORBIDDEN in this project.\n   Either use the code (removing the attribute) or remove it completely.\n"
            }
        }
    }
}

// Collects every matching line of one file so a single report can list them all.
struct ViolationCollector {
    policy: Policy,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl ViolationCollector {
    fn new(policy: Policy, file_path: &Path) -> Self {
        Self {
            policy,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.policy.describe(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(self.policy.advice());
        Some(error_msg)
    }
}

// Underscore names inside comments or string literals are not bindings.
fn is_comment_or_string_match(line_text: &str) -> bool {
    if line_text.trim_start().starts_with("//") {
        return true;
    }
    line_text
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if matches!(self.policy, Policy::UnderscorePrefix) && is_comment_or_string_match(line_text)
        {
            return Ok(true);
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(policy: Policy, pattern: &str) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(policy, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let checks = [
        (Policy::UnderscorePrefix, r"\b(_[a-zA-Z0-9_]+)\b"),
        (
            Policy::ForbiddenComment,
            r"(//|/\*).*\b(?:FIXED|FIXES|FIX|CORRECTED|CHANGED|CHANGES|MODIFIED|UPDATED|UPDATES)\b",
        ),
        (
            Policy::AllowDeadCode,
            r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        ),
    ];

    for (policy, pattern) in checks {
        if let Err(e) = scan(policy, pattern) {
            // Printed so the report shows up in cargo's output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
