mod dev;

use livepane_core::{PageSource, detect_truncation, normalize_route_path, validate_edit};
use livepane_web::{PreviewConfig, PreviewInput, SandboxHost};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Extensions treated as page sources when previewing a directory.
const PAGE_EXTENSIONS: &[&str] = &["jsx", "tsx", "js", "ts"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Check {
        file: PathBuf,
        edit: bool,
    },
    Build {
        path: PathBuf,
        out: Option<PathBuf>,
        page: Option<String>,
    },
    Dev {
        path: PathBuf,
        port: u16,
        watch: bool,
    },
}

pub async fn run_from_env() -> Result<(), String> {
    run_from_args(env::args().skip(1).collect()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<(), String> {
    let command = parse_command(args)?;

    match command {
        CliCommand::Check { file, edit } => run_check(&file, edit),
        CliCommand::Build { path, out, page } => run_build(&path, out, page.as_deref()),
        CliCommand::Dev { path, port, watch } => dev::run_server(path, port, watch).await,
    }
}

fn parse_command(args: Vec<String>) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(help_text());
    }

    let cmd = args[0].as_str();
    match cmd {
        "check" => parse_check(args),
        "build" => parse_build(args),
        "dev" => parse_dev(args),
        "help" | "--help" | "-h" => Err(help_text()),
        _ => Err(format!("unknown command: {cmd}\n\n{}", help_text())),
    }
}

fn parse_check(args: Vec<String>) -> Result<CliCommand, String> {
    let mut file: Option<PathBuf> = None;
    let mut edit = false;

    for token in args.iter().skip(1) {
        match token.as_str() {
            "--edit" => edit = true,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if file.is_some() {
                    return Err("only one FILE positional argument is allowed".to_string());
                }
                file = Some(PathBuf::from(token));
            }
        }
    }

    let file = file.ok_or_else(|| "check requires FILE".to_string())?;
    Ok(CliCommand::Check { file, edit })
}

fn parse_build(args: Vec<String>) -> Result<CliCommand, String> {
    let mut path: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut page: Option<String> = None;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(
                    args.get(i)
                        .ok_or_else(|| "--out requires a value".to_string())?,
                ));
            }
            "--page" => {
                i += 1;
                page = Some(
                    args.get(i)
                        .ok_or_else(|| "--page requires a value".to_string())?
                        .to_string(),
                );
            }
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if path.is_some() {
                    return Err("only one PATH positional argument is allowed".to_string());
                }
                path = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    let path = path.ok_or_else(|| "build requires PATH".to_string())?;
    Ok(CliCommand::Build { path, out, page })
}

fn parse_dev(args: Vec<String>) -> Result<CliCommand, String> {
    let mut path: Option<PathBuf> = None;
    let mut port: u16 = 3000;
    let mut watch = true;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--port requires a value".to_string())?;
                port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {value}"))?;
            }
            "--watch" => watch = true,
            "--no-watch" => watch = false,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if path.is_some() {
                    return Err("only one PATH positional argument is allowed".to_string());
                }
                path = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    Ok(CliCommand::Dev {
        path: path.unwrap_or_else(|| PathBuf::from(".")),
        port,
        watch,
    })
}

fn help_text() -> String {
    [
        "livepane CLI",
        "",
        "Commands:",
        "  livepane check FILE [--edit]",
        "  livepane build PATH [--out FILE] [--page ROUTE]",
        "  livepane dev [PATH] [--port 3000] [--watch|--no-watch]",
        "",
        "PATH is a single source file or a directory of page files",
        "(index.tsx -> /, about.tsx -> /about, blog/post.tsx -> /blog/post).",
    ]
    .join("\n")
}

fn run_check(file: &Path, edit: bool) -> Result<(), String> {
    let source =
        fs::read_to_string(file).map_err(|e| format!("failed to read {}: {e}", file.display()))?;

    if edit {
        let validation = validate_edit(&source);
        let messages = validation.messages();
        let report = serde_json::json!({
            "valid": validation.is_valid(),
            "errors": messages,
        });
        println!("{}", to_pretty(&report)?);
        if !validation.is_valid() {
            return Err(format!("{} is not a valid edit", file.display()));
        }
        return Ok(());
    }

    let verdict = detect_truncation(&source);
    println!("{}", to_pretty(&verdict)?);
    if verdict.is_truncated {
        return Err(format!("{} looks truncated", file.display()));
    }
    Ok(())
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

fn run_build(path: &Path, out: Option<PathBuf>, page: Option<&str>) -> Result<(), String> {
    let config = load_config(path)?;
    let mut input = load_input(path)?;
    if let Some(route) = page {
        select_page(&mut input, route)?;
    }

    let mut host = SandboxHost::new(config);
    if let Some(event) = host.load(input) {
        tracing::warn!(event = ?event, "initial page was rejected");
    }
    let document = host
        .document()
        .ok_or_else(|| "no document was built".to_string())?;

    let out = out.unwrap_or_else(|| PathBuf::from("preview.html"));
    fs::write(&out, &document.html)
        .map_err(|e| format!("failed to write {}: {e}", out.display()))?;
    for (route, error) in &document.rejected {
        eprintln!("rejected {route}: {error}");
    }
    println!(
        "wrote {} ({} pages, generation {}, fingerprint {})",
        out.display(),
        document.page_count,
        document.generation,
        document.fingerprint
    );
    Ok(())
}

fn select_page(input: &mut PreviewInput, route: &str) -> Result<(), String> {
    let PreviewInput::Pages {
        pages,
        current_page_id,
    } = input
    else {
        return Err("--page needs a directory of pages".to_string());
    };
    let wanted = normalize_route_path(route);
    let page = pages
        .iter()
        .find(|p| p.path == wanted)
        .ok_or_else(|| {
            let known: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
            format!("no page at {wanted}. available: [{}]", known.join(", "))
        })?;
    *current_page_id = Some(page.id.clone());
    Ok(())
}

/// `livepane.json` sits in the previewed directory, or next to the file.
fn load_config(path: &Path) -> Result<PreviewConfig, String> {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or_else(|| Path::new("."))
    };
    PreviewConfig::load_from_dir(dir).map_err(|e| e.to_string())
}

fn load_input(path: &Path) -> Result<PreviewInput, String> {
    if path.is_dir() {
        let pages = load_pages(path)?;
        if pages.is_empty() {
            return Err(format!("no page sources found in {}", path.display()));
        }
        return Ok(PreviewInput::Pages {
            pages,
            current_page_id: None,
        });
    }
    let source =
        fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(PreviewInput::Single { source })
}

/// Collects page files under `root`, sorted by relative path so duplicate
/// routes resolve deterministically (`about.tsx` and `about/index.tsx`).
fn load_pages(root: &Path) -> Result<Vec<PageSource>, String> {
    fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
        let read_dir =
            fs::read_dir(dir).map_err(|e| format!("failed to read {}: {e}", dir.display()))?;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if path_has_ignored_segment(Path::new(&entry.file_name())) {
                    continue;
                }
                collect_files(&path, out)?;
                continue;
            }
            if is_page_file(&path) {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    let mut pages = Vec::with_capacity(files.len());
    for file in files {
        let rel = file.strip_prefix(root).unwrap_or(&file);
        let source = fs::read_to_string(&file)
            .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
        let id = rel.with_extension("").to_string_lossy().replace('\\', "/");
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("page")
            .to_string();
        pages.push(PageSource::new(id, name, &route_for(rel), source));
    }
    Ok(pages)
}

fn is_page_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| PAGE_EXTENSIONS.contains(&ext))
}

/// `index.tsx` -> `/`, `about.tsx` -> `/about`, `blog/index.tsx` -> `/blog`.
fn route_for(rel: &Path) -> String {
    let mut segments: Vec<String> = rel
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.last().is_some_and(|s| s == "index") {
        segments.pop();
    }
    normalize_route_path(&segments.join("/"))
}

fn path_has_ignored_segment(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(seg) => {
            let s = seg.to_string_lossy();
            matches!(s.as_ref(), ".git" | "target" | "node_modules")
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        std::fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_dev_defaults_and_flags() {
        assert_eq!(
            parse_command(args(&["dev"])),
            Ok(CliCommand::Dev {
                path: PathBuf::from("."),
                port: 3000,
                watch: true
            })
        );
        assert_eq!(
            parse_command(args(&["dev", "site", "--port", "4000", "--no-watch"])),
            Ok(CliCommand::Dev {
                path: PathBuf::from("site"),
                port: 4000,
                watch: false
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command(Vec::new()).is_err());
        assert_eq!(
            parse_command(args(&["dev", "--port", "nope"])),
            Err("invalid port: nope".to_string())
        );
        assert_eq!(
            parse_command(args(&["check", "a.tsx", "--fast"])),
            Err("unknown flag: --fast".to_string())
        );
        assert_eq!(
            parse_command(args(&["build"])),
            Err("build requires PATH".to_string())
        );
        assert!(
            parse_command(args(&["frobnicate"]))
                .err()
                .is_some_and(|e| e.starts_with("unknown command: frobnicate"))
        );
    }

    #[test]
    fn test_parse_build_options() {
        assert_eq!(
            parse_command(args(&["build", "site", "--out", "x.html", "--page", "/about"])),
            Ok(CliCommand::Build {
                path: PathBuf::from("site"),
                out: Some(PathBuf::from("x.html")),
                page: Some("/about".to_string())
            })
        );
    }

    #[test]
    fn test_route_for() {
        assert_eq!(route_for(Path::new("index.tsx")), "/");
        assert_eq!(route_for(Path::new("about.jsx")), "/about");
        assert_eq!(route_for(Path::new("blog/index.tsx")), "/blog");
        assert_eq!(route_for(Path::new("blog/first-post.tsx")), "/blog/first-post");
    }

    #[test]
    fn test_load_pages_maps_files_to_routes() {
        let root = unique_temp_dir("livepane-pages");
        fs::create_dir_all(root.join("blog")).expect("mkdir blog");
        fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir node_modules");
        fs::write(root.join("index.tsx"), "function Home() { return null; }").expect("write");
        fs::write(root.join("about.jsx"), "function About() { return null; }").expect("write");
        fs::write(root.join("blog/post.tsx"), "function Post() { return null; }").expect("write");
        fs::write(root.join("notes.md"), "# not a page").expect("write");
        fs::write(root.join("node_modules/pkg/index.js"), "x").expect("write");

        let pages = load_pages(&root).expect("load pages");
        let routes: Vec<(&str, &str)> = pages
            .iter()
            .map(|p| (p.id.as_str(), p.path.as_str()))
            .collect();
        assert_eq!(
            routes,
            vec![("about", "/about"), ("blog/post", "/blog/post"), ("index", "/")]
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_select_page_sets_current_page() {
        let root = unique_temp_dir("livepane-select");
        fs::write(root.join("index.tsx"), "function Home() { return null; }").expect("write");
        fs::write(root.join("pricing.tsx"), "function Pricing() { return null; }").expect("write");

        let mut input = load_input(&root).expect("load input");
        select_page(&mut input, "pricing/").expect("page exists");
        let PreviewInput::Pages {
            current_page_id, ..
        } = &input
        else {
            panic!("expected pages input");
        };
        assert_eq!(current_page_id.as_deref(), Some("pricing"));
        assert!(select_page(&mut input, "/missing").is_err());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_check_rejects_truncated_file() {
        let root = unique_temp_dir("livepane-check");
        let file = root.join("cut.tsx");
        fs::write(&file, "function App() { return (<div>{{{").expect("write");
        assert!(run_check(&file, false).is_err());
        fs::write(&file, "function App() { return <div/>; }").expect("write");
        assert!(run_check(&file, false).is_ok());
        assert!(run_check(&file, true).is_ok());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_build_writes_document() {
        let root = unique_temp_dir("livepane-build");
        let file = root.join("App.tsx");
        fs::write(&file, "export default function App() { return <h1>Hi</h1>; }").expect("write");
        let out = root.join("out.html");
        run_build(&file, Some(out.clone()), None).expect("build");
        let html = fs::read_to_string(&out).expect("read output");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("window.__LIVEPANE__"));

        let _ = fs::remove_dir_all(&root);
    }
}
