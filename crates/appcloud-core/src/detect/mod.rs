//! Framework detection for `push`.
//!
//! Looks at the top level of an application directory and decides the
//! staging model, default memory reservation and, for bare Sinatra
//! scripts, the startup command. War files are inspected by entry name.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

pub const UNKNOWN_FRAMEWORK: &str = "http://b20nine.com/unknown";
pub const DEFAULT_STACK: &str = "thin start";

pub const RAILS: &str = "rails/1.0";
pub const GRAILS: &str = "grails/1.0";
pub const SPRING: &str = "spring_web/1.0";
pub const ASP: &str = "asp_web/1.0";
pub const NODE: &str = "nodejs/1.0";

/// What detection concluded about an application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub framework: String,
    /// Suggested memory choice, e.g. `256M`.
    pub memory: &'static str,
    /// Startup command override; `None` keeps the default stack.
    pub exec: Option<String>,
    /// War file to upload as-is instead of zipping the directory.
    pub war_file: Option<PathBuf>,
    /// Human-readable summary, e.g. "Rails application detected."
    pub summary: Option<String>,
}

impl Detection {
    /// Defaults used when detection is skipped or nothing matched.
    pub fn unknown() -> Self {
        Self {
            framework: UNKNOWN_FRAMEWORK.to_string(),
            memory: "256M",
            exec: None,
            war_file: None,
            summary: None,
        }
    }

    fn with(framework: &str, memory: &'static str, summary: impl Into<String>) -> Self {
        Self {
            framework: framework.to_string(),
            memory,
            exec: None,
            war_file: None,
            summary: Some(summary.into()),
        }
    }

    /// Startup command to stage with.
    pub fn stack(&self) -> &str {
        self.exec.as_deref().unwrap_or(DEFAULT_STACK)
    }
}

/// Frameworks that usually want a database provisioned with them.
pub fn framework_needs_db(framework: &str) -> bool {
    matches!(framework, RAILS | GRAILS | SPRING | ASP)
}

pub fn detect_framework(dir: &Path) -> anyhow::Result<Detection> {
    let files = top_level_files(dir)?;
    let has = |name: &str| files.iter().any(|f| f == name);
    let with_ext = |ext: &str| -> Vec<&String> {
        files
            .iter()
            .filter(|f| Path::new(f).extension().is_some_and(|e| e == ext))
            .collect()
    };

    let detection = if dir.join("config").join("environment.rb").is_file() {
        Detection::with(RAILS, "256M", "Rails application detected.")
    } else if let Some(war) = with_ext("war").first() {
        let war_path = dir.join(war);
        let mut detection = detect_war(&war_path)?;
        detection.war_file = Some(war_path);
        detection
    } else if has("web.config") {
        Detection::with(ASP, "256M", "ASP.NET application detected.")
    } else if !with_ext("rb").is_empty() {
        let mut detection = Detection::unknown();
        detection.memory = "128M";
        if let Some(script) = find_sinatra_script(dir, &with_ext("rb"))?
            && !has("config.ru")
        {
            detection.summary = Some(format!("Simple Sinatra application detected in {script}."));
            detection.exec = Some(format!("ruby {script}"));
        }
        detection
    } else if !with_ext("js").is_empty() && has("app.js") {
        Detection::with(NODE, "64M", "Node.js application detected.")
    } else {
        Detection::unknown()
    };

    debug!(dir = %dir.display(), framework = %detection.framework, "framework detection");
    Ok(detection)
}

/// Classify a war file by the entries it contains.
pub fn detect_war(path: &Path) -> anyhow::Result<Detection> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open war file: {}", path.display()))?;
    let archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read war file as zip archive: {}", path.display()))?;
    let names: Vec<&str> = archive.file_names().collect();

    let detection = if names.iter().any(|n| n.contains("WEB-INF/grails-app")) {
        Detection::with(GRAILS, "512M", "Grails application detected.")
    } else if names
        .iter()
        .any(|n| n.contains("WEB-INF/classes/org/springframework") || is_spring_core_jar(n))
    {
        Detection::with(SPRING, "512M", "SpringSource application detected.")
    } else {
        Detection::with(SPRING, "256M", "Unknown J2EE Web Application")
    };
    Ok(detection)
}

fn is_spring_core_jar(entry: &str) -> bool {
    entry
        .find("WEB-INF/lib/spring-core")
        .is_some_and(|at| entry[at..].ends_with(".jar"))
}

/// First script (in name order) that requires sinatra at line start.
fn find_sinatra_script(dir: &Path, scripts: &[&String]) -> anyhow::Result<Option<String>> {
    for script in scripts {
        let path = dir.join(script);
        let content = fs::read(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let content = String::from_utf8_lossy(&content);
        if content.lines().any(requires_sinatra) {
            return Ok(Some(script.to_string()));
        }
    }
    Ok(None)
}

fn requires_sinatra(line: &str) -> bool {
    let line = line.trim_start().to_ascii_lowercase();
    line.strip_prefix("require")
        .map(|rest| rest.trim_start().starts_with("'sinatra'"))
        .unwrap_or(false)
}

fn top_level_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
